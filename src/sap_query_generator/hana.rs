//! HANA document query generation.
//!
//! HANA binds positional `?` placeholders, so the filter values are
//! repeated once per union branch, in branch order. Pagination uses
//! `LIMIT ? OFFSET ?` appended after the base arguments.

use super::{
    Dialect, DocumentFilter, DocumentSqlGenerator, DocumentTableMap, QueryGeneratorError,
    SqlParams, SqlStatement, SqlValue,
};

pub struct HanaGenerator {
    tables: DocumentTableMap,
}

impl HanaGenerator {
    pub fn new(tables: DocumentTableMap) -> Self {
        Self { tables }
    }

    /// Union SQL plus one full copy of the filter values per branch.
    fn union_sql(&self, filter: &DocumentFilter) -> (String, Vec<SqlValue>) {
        let card_code = SqlValue::opt_text(filter.card_code.as_deref());
        let doc_status = SqlValue::opt_text(filter.doc_status.as_deref());
        let warehouse_code = SqlValue::opt_text(filter.warehouse_code.as_deref());

        let mut parts = Vec::with_capacity(self.tables.len());
        let mut args = Vec::with_capacity(self.tables.len() * 8);

        for entry in self.tables.entries() {
            parts.push(format!(
                r#"SELECT '{doc_type}' AS docType, H.DocEntry, H.DocDate
FROM {header} H
WHERE H.DocDate >= ? AND H.DocDate <= ?
  AND (? IS NULL OR H.CardCode = ?)
  AND (? IS NULL OR H.DocStatus = ?)
  AND (? IS NULL OR EXISTS (
        SELECT 1 FROM {lines} L
        WHERE L.DocEntry = H.DocEntry AND L.WhsCode = ?
      ))"#,
                doc_type = entry.doc_type,
                header = entry.header,
                lines = entry.lines,
            ));
            args.extend([
                SqlValue::Date(filter.date_from),
                SqlValue::Date(filter.date_to),
                card_code.clone(),
                card_code.clone(),
                doc_status.clone(),
                doc_status.clone(),
                warehouse_code.clone(),
                warehouse_code.clone(),
            ]);
        }

        (parts.join("\nUNION ALL\n"), args)
    }
}

impl DocumentSqlGenerator for HanaGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Hana
    }

    fn count_documents(&self, filter: &DocumentFilter) -> SqlStatement {
        let (union_sql, args) = self.union_sql(filter);
        SqlStatement {
            sql: format!("SELECT COUNT(1) FROM ({}) AS k", union_sql),
            params: SqlParams::Positional(args),
        }
    }

    fn page_keys(&self, filter: &DocumentFilter) -> SqlStatement {
        let (union_sql, mut args) = self.union_sql(filter);
        args.push(SqlValue::Int(filter.page_size as i64));
        args.push(SqlValue::Int(filter.offset() as i64));

        SqlStatement {
            sql: format!(
                "SELECT docType, DocEntry, DocDate FROM ({}) AS k ORDER BY {} LIMIT ? OFFSET ?",
                union_sql,
                filter.order_clause(),
            ),
            params: SqlParams::Positional(args),
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

        let placeholders = vec!["?"; entries.len()].join(", ");
        let args = entries.iter().map(|e| SqlValue::Int(*e)).collect();

        Ok(SqlStatement {
            sql: format!("SELECT * FROM {} WHERE DocEntry IN ({})", table, placeholders),
            params: SqlParams::Positional(args),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sap_query_generator::{SortDir, SortField};
    use chrono::NaiveDate;

    fn generator() -> HanaGenerator {
        HanaGenerator::new(DocumentTableMap::standard())
    }

    fn filter() -> DocumentFilter {
        DocumentFilter {
            card_code: Some("C20000".to_string()),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            warehouse_code: Some("01".to_string()),
            doc_status: None,
            sort_by: SortField::DocEntry,
            sort_dir: SortDir::Asc,
            page: 1,
            page_size: 10,
        }
    }

    #[test]
    fn args_are_repeated_per_branch() {
        let stmt = generator().count_documents(&filter());
        let SqlParams::Positional(args) = stmt.params else {
            panic!("expected positional params");
        };
        // Eight values for each of the five union branches.
        assert_eq!(args.len(), 40);
        assert_eq!(args[0], SqlValue::Date(filter().date_from));
        // Branch boundaries carry identical copies.
        assert_eq!(args[2], args[10]);
        assert_eq!(stmt.sql.matches('?').count(), 40);
    }

    #[test]
    fn keys_query_paginates_with_limit_offset() {
        let stmt = generator().page_keys(&filter());
        assert!(stmt
            .sql
            .ends_with("ORDER BY DocEntry ASC, DocDate ASC LIMIT ? OFFSET ?"));
        let SqlParams::Positional(args) = stmt.params else {
            panic!("expected positional params");
        };
        assert_eq!(args.len(), 42);
        // LIMIT value comes before OFFSET.
        assert_eq!(args[40], SqlValue::Int(10));
        assert_eq!(args[41], SqlValue::Int(0));
    }

    #[test]
    fn batch_select_uses_question_marks() {
        let stmt = generator().batch_select("OINV", &[1, 2, 3]).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM OINV WHERE DocEntry IN (?, ?, ?)");
        let SqlParams::Positional(args) = stmt.params else {
            panic!("expected positional params");
        };
        assert_eq!(args, vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]);
    }

    #[test]
    fn batch_select_rejects_empty_id_list() {
        assert!(matches!(
            generator().batch_select("OINV", &[]),
            Err(QueryGeneratorError::EmptyDocEntryList(t)) if t == "OINV"
        ));
    }
}
