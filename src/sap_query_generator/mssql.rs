//! MSSQL document query generation.
//!
//! Named parameters are bound once and referenced from every union
//! branch; the executor maps each distinct name onto a single TDS
//! parameter slot before execution.

use super::{
    Dialect, DocumentFilter, DocumentSqlGenerator, DocumentTableMap, QueryGeneratorError,
    SqlParams, SqlStatement, SqlValue,
};

pub struct MssqlGenerator {
    tables: DocumentTableMap,
}

impl MssqlGenerator {
    pub fn new(tables: DocumentTableMap) -> Self {
        Self { tables }
    }

    fn union_sql(&self) -> String {
        let parts: Vec<String> = self
            .tables
            .entries()
            .iter()
            .map(|entry| {
                format!(
                    r#"SELECT '{doc_type}' AS docType, H.DocEntry, H.DocDate
FROM {header} H
WHERE H.DocDate >= @dateFrom AND H.DocDate <= @dateTo
  AND (@cardCode IS NULL OR H.CardCode = @cardCode)
  AND (@docStatus IS NULL OR H.DocStatus = @docStatus)
  AND (@warehouseCode IS NULL OR EXISTS (
        SELECT 1 FROM {lines} L
        WHERE L.DocEntry = H.DocEntry AND L.WhsCode = @warehouseCode
      ))"#,
                    doc_type = entry.doc_type,
                    header = entry.header,
                    lines = entry.lines,
                )
            })
            .collect();
        parts.join("\nUNION ALL\n")
    }

    fn base_args(filter: &DocumentFilter) -> Vec<(String, SqlValue)> {
        vec![
            ("dateFrom".to_string(), SqlValue::Date(filter.date_from)),
            ("dateTo".to_string(), SqlValue::Date(filter.date_to)),
            (
                "cardCode".to_string(),
                SqlValue::opt_text(filter.card_code.as_deref()),
            ),
            (
                "docStatus".to_string(),
                SqlValue::opt_text(filter.doc_status.as_deref()),
            ),
            (
                "warehouseCode".to_string(),
                SqlValue::opt_text(filter.warehouse_code.as_deref()),
            ),
        ]
    }
}

impl DocumentSqlGenerator for MssqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn count_documents(&self, filter: &DocumentFilter) -> SqlStatement {
        SqlStatement {
            sql: format!("SELECT COUNT(1) FROM ({}) AS k", self.union_sql()),
            params: SqlParams::Named(Self::base_args(filter)),
        }
    }

    fn page_keys(&self, filter: &DocumentFilter) -> SqlStatement {
        let mut args = Self::base_args(filter);
        args.push(("offset".to_string(), SqlValue::Int(filter.offset() as i64)));
        args.push((
            "pageSize".to_string(),
            SqlValue::Int(filter.page_size as i64),
        ));

        SqlStatement {
            sql: format!(
                "SELECT docType, DocEntry, DocDate FROM ({}) AS k ORDER BY {} \
                 OFFSET @offset ROWS FETCH NEXT @pageSize ROWS ONLY",
                self.union_sql(),
                filter.order_clause(),
            ),
            params: SqlParams::Named(args),
        }
    }

    fn batch_select(
        &self,
        table: &str,
        entries: &[i64],
    ) -> Result<SqlStatement, QueryGeneratorError> {
        if entries.is_empty() {
            return Err(QueryGeneratorError::EmptyDocEntryList(table.to_string()));
        }

        let mut placeholders = Vec::with_capacity(entries.len());
        let mut args = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let name = format!("docEntry{}", i);
            placeholders.push(format!("@{}", name));
            args.push((name, SqlValue::Int(*entry)));
        }

        Ok(SqlStatement {
            sql: format!(
                "SELECT * FROM {} WHERE DocEntry IN ({})",
                table,
                placeholders.join(", ")
            ),
            params: SqlParams::Named(args),
        })
    }
}
