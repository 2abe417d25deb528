//! Cross-table document listing.
//!
//! Single-pass aggregation: count the full union, read one page of
//! (docType, DocEntry, DocDate) keys in display order, batch-fetch the
//! full header rows per table, then stitch them back into key order.
//! A key whose row vanished between the keys query and the batch fetch
//! is skipped silently; `total` keeps the count observed at step one.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::db::{DbError, QueryExecutor, QueryOutcome, DEFAULT_QUERY_TIMEOUT};
use crate::sap_query_generator::{
    Dialect, DocumentFilter, DocumentSqlGenerator, DocumentTableMap, QueryGeneratorError,
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported docType: {0}")]
    UnsupportedDocType(String),

    #[error("DocEntry column not found for {0}")]
    DocEntryColumnMissing(String),

    #[error("invalid DocEntry value for {0}")]
    InvalidDocEntry(String),

    #[error("count query returned no result")]
    MissingCount,

    #[error("keys query returned a malformed row")]
    MalformedKeyRow,

    #[error(transparent)]
    Generator(#[from] QueryGeneratorError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// One fully-populated result page.
#[derive(Debug, Serialize)]
pub struct DocumentPage {
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    pub total: i64,
    /// Stitched rows in display order; always present, possibly empty.
    pub items: Vec<serde_json::Map<String, Value>>,
}

/// Identity of one document within the page: type plus header id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DocumentKey {
    doc_type: String,
    doc_entry: i64,
}

impl DocumentKey {
    fn map_key(&self) -> String {
        composite_key(&self.doc_type, self.doc_entry)
    }
}

fn composite_key(doc_type: &str, doc_entry: i64) -> String {
    format!("{}:{}", doc_type, doc_entry)
}

pub struct DocumentService {
    executor: Arc<dyn QueryExecutor>,
    generator: Box<dyn DocumentSqlGenerator>,
    tables: DocumentTableMap,
}

impl DocumentService {
    pub fn new(executor: Arc<dyn QueryExecutor>, dialect: Dialect, tables: DocumentTableMap) -> Self {
        Self {
            executor,
            generator: dialect.generator(tables.clone()),
            tables,
        }
    }

    pub async fn fetch_page(&self, filter: &DocumentFilter) -> Result<DocumentPage, DocumentError> {
        // 1. Count the full union, no pagination.
        let count_stmt = self.generator.count_documents(filter);
        let outcome = self
            .executor
            .execute(&count_stmt, DEFAULT_QUERY_TIMEOUT)
            .await?;
        let total = extract_count(&outcome)?;

        // 2. Read this page's keys; their order is the display order.
        let keys_stmt = self.generator.page_keys(filter);
        let outcome = self
            .executor
            .execute(&keys_stmt, DEFAULT_QUERY_TIMEOUT)
            .await?;
        let keys = extract_keys(&outcome)?;

        // 3. Group ids by type and drop duplicates. A DocEntry should
        // be unique per header table, so this is belt-and-braces.
        let mut entries_by_type: Vec<(String, Vec<i64>)> = Vec::new();
        for key in &keys {
            match entries_by_type
                .iter_mut()
                .find(|(doc_type, _)| doc_type == &key.doc_type)
            {
                Some((_, entries)) => {
                    if !entries.contains(&key.doc_entry) {
                        entries.push(key.doc_entry);
                    }
                }
                None => entries_by_type.push((key.doc_type.clone(), vec![key.doc_entry])),
            }
        }

        // 4. Batch-fetch full rows per header table and index them by
        // composite key.
        let mut rows_by_key: HashMap<String, serde_json::Map<String, Value>> =
            HashMap::with_capacity(keys.len());
        for (doc_type, entries) in &entries_by_type {
            let table = self
                .tables
                .get(doc_type)
                .ok_or_else(|| DocumentError::UnsupportedDocType(doc_type.clone()))?;

            let stmt = self.generator.batch_select(table.header, entries)?;
            let outcome = self.executor.execute(&stmt, DEFAULT_QUERY_TIMEOUT).await?;
            index_rows(outcome, doc_type, &mut rows_by_key)?;
        }

        // 5. Stitch in key order. Keys without a row (deleted between
        // steps 2 and 4) are dropped; the page may come up short while
        // `total` still reflects the original count.
        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(row) = rows_by_key.get(&key.map_key()) {
                items.push(row.clone());
            } else {
                log::debug!("document {} disappeared between keys and fetch", key.map_key());
            }
        }

        Ok(DocumentPage {
            page: filter.page,
            page_size: filter.page_size,
            total,
            items,
        })
    }
}

fn extract_count(outcome: &QueryOutcome) -> Result<i64, DocumentError> {
    let first_row = outcome
        .result_sets
        .first()
        .and_then(|rs| rs.rows.first())
        .ok_or(DocumentError::MissingCount)?;
    let first_value = first_row.values().next().ok_or(DocumentError::MissingCount)?;
    numeric_value(first_value).ok_or(DocumentError::MissingCount)
}

/// Keys rows are read positionally: the query selects exactly
/// (docType, DocEntry, DocDate), and column-name casing differs per
/// dialect for unquoted aliases.
fn extract_keys(outcome: &QueryOutcome) -> Result<Vec<DocumentKey>, DocumentError> {
    let Some(rs) = outcome.result_sets.first() else {
        return Ok(Vec::new());
    };
    if rs.columns.len() < 2 {
        if rs.rows.is_empty() {
            return Ok(Vec::new());
        }
        return Err(DocumentError::MalformedKeyRow);
    }

    let mut keys = Vec::with_capacity(rs.rows.len());
    for row in &rs.rows {
        let doc_type = row
            .get(&rs.columns[0])
            .and_then(Value::as_str)
            .ok_or(DocumentError::MalformedKeyRow)?
            .to_string();
        let doc_entry = row
            .get(&rs.columns[1])
            .and_then(numeric_value)
            .ok_or_else(|| DocumentError::InvalidDocEntry(doc_type.clone()))?;
        keys.push(DocumentKey {
            doc_type,
            doc_entry,
        });
    }
    Ok(keys)
}

fn index_rows(
    outcome: QueryOutcome,
    doc_type: &str,
    rows_by_key: &mut HashMap<String, serde_json::Map<String, Value>>,
) -> Result<(), DocumentError> {
    let Some(rs) = outcome.result_sets.into_iter().next() else {
        return Ok(());
    };

    let doc_entry_column = rs
        .columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case("DocEntry"))
        .cloned()
        .ok_or_else(|| DocumentError::DocEntryColumnMissing(doc_type.to_string()))?;

    for mut row in rs.rows {
        let key = row
            .get(&doc_entry_column)
            .and_then(|v| doc_entry_key(doc_type, v))
            .ok_or_else(|| DocumentError::InvalidDocEntry(doc_type.to_string()))?;
        row.insert("docType".to_string(), Value::String(doc_type.to_string()));
        rows_by_key.insert(key, row);
    }

    Ok(())
}

/// Build the composite key from whatever representation the driver
/// chose for DocEntry: integer, float, or text. Text tries a numeric
/// parse first so `"42"` and `42` land on the same key.
fn doc_entry_key(doc_type: &str, value: &Value) -> Option<String> {
    match value {
        Value::Number(_) => numeric_value(value).map(|n| composite_key(doc_type, n)),
        Value::String(s) if !s.is_empty() => match s.parse::<i64>() {
            Ok(n) => Some(composite_key(doc_type, n)),
            Err(_) => Some(format!("{}:{}", doc_type, s)),
        },
        _ => None,
    }
}

fn numeric_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_entry_key_supports_driver_representations() {
        assert_eq!(
            doc_entry_key("Orders", &json!(42)),
            Some("Orders:42".to_string())
        );
        assert_eq!(
            doc_entry_key("Orders", &json!(42.0)),
            Some("Orders:42".to_string())
        );
        assert_eq!(
            doc_entry_key("Orders", &json!("42")),
            Some("Orders:42".to_string())
        );
        // Non-numeric text still forms a key rather than losing the row.
        assert_eq!(
            doc_entry_key("Orders", &json!("A-42")),
            Some("Orders:A-42".to_string())
        );
        assert_eq!(doc_entry_key("Orders", &json!("")), None);
        assert_eq!(doc_entry_key("Orders", &Value::Null), None);
    }
}
