//! Dialect-specific SQL generation for Business One document queries.
//!
//! Pure text/argument construction, no I/O. The two dialects differ in
//! parameter binding style and pagination syntax:
//!
//! - MSSQL binds named parameters once and references them from every
//!   union branch; pagination is `OFFSET .. ROWS FETCH NEXT .. ROWS ONLY`.
//! - HANA binds positional `?` placeholders, so every union branch gets
//!   its own copy of the filter values in branch order; pagination is
//!   `LIMIT .. OFFSET ..`.
//!
//! The asymmetry mirrors how the two drivers actually bind parameters
//! and must not be collapsed into a single shared-parameter model.

use chrono::NaiveDate;
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;

pub mod errors;
pub mod hana;
pub mod mssql;
pub mod tables;

pub use errors::QueryGeneratorError;
pub use tables::{DocTable, DocumentTableMap};

/// Target SQL dialect, selected once at startup from configuration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mssql,
    Hana,
}

impl Dialect {
    /// Parse a dialect name; the empty string defaults to MSSQL.
    pub fn parse(raw: &str) -> Result<Self, QueryGeneratorError> {
        match raw.trim().to_lowercase().as_str() {
            "" | "mssql" => Ok(Dialect::Mssql),
            "hana" => Ok(Dialect::Hana),
            other => Err(QueryGeneratorError::UnsupportedDialect(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Mssql => "mssql",
            Dialect::Hana => "hana",
        }
    }

    /// Build the generator strategy for this dialect.
    pub fn generator(&self, tables: DocumentTableMap) -> Box<dyn DocumentSqlGenerator> {
        match self {
            Dialect::Mssql => Box::new(mssql::MssqlGenerator::new(tables)),
            Dialect::Hana => Box::new(hana::HanaGenerator::new(tables)),
        }
    }
}

/// A scalar value bound as a statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl SqlValue {
    /// NULL for absent or empty optional filters, so the SQL-side
    /// `(:p IS NULL OR col = :p)` guard disables the condition.
    pub fn opt_text(value: Option<&str>) -> SqlValue {
        match value {
            Some(s) if !s.is_empty() => SqlValue::Text(s.to_string()),
            _ => SqlValue::Null,
        }
    }

    /// Convert a JSON request parameter into a bindable scalar.
    ///
    /// JSON decoders surface every number the caller typed without a
    /// fraction as an integer, but a float like `3.0` still binds more
    /// usefully as INT against Business One key columns.
    pub fn from_json(value: &serde_json::Value) -> Result<SqlValue, String> {
        match value {
            serde_json::Value::Null => Ok(SqlValue::Null),
            serde_json::Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
                        Ok(SqlValue::Int(f as i64))
                    } else {
                        Ok(SqlValue::Float(f))
                    }
                } else {
                    Err(format!("unsupported numeric param: {}", n))
                }
            }
            serde_json::Value::String(s) => Ok(SqlValue::Text(s.clone())),
            other => Err(format!(
                "unsupported param type (must be a scalar): {}",
                other
            )),
        }
    }
}

// Serialized as a bare scalar so a Vec<SqlValue> forms one HANA
// parameter row for hdbconnect's serde-based binding.
impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Int(i) => serializer.serialize_i64(*i),
            SqlValue::Float(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Statement arguments in the binding style of the target driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParams {
    /// Each name bound exactly once; placeholders may repeat in the SQL.
    Named(Vec<(String, SqlValue)>),
    /// One value per `?`, in placeholder order.
    Positional(Vec<SqlValue>),
}

impl SqlParams {
    pub fn len(&self) -> usize {
        match self {
            SqlParams::Named(args) => args.len(),
            SqlParams::Positional(args) => args.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A ready-to-execute statement: SQL text plus its bound arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: SqlParams,
}

/// Sort column for the document listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    DocDate,
    DocEntry,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::DocDate => "DocDate",
            SortField::DocEntry => "DocEntry",
        }
    }

    /// The secondary sort column that makes pagination deterministic.
    pub fn tie_breaker(&self) -> &'static str {
        match self {
            SortField::DocDate => "DocEntry",
            SortField::DocEntry => "DocDate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Logical intent of a document listing query. Validated at the HTTP
/// boundary; by construction `page >= 1` and `1 <= page_size <= 200`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFilter {
    pub card_code: Option<String>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub warehouse_code: Option<String>,
    pub doc_status: Option<String>,
    pub sort_by: SortField,
    pub sort_dir: SortDir,
    pub page: u32,
    pub page_size: u32,
}

impl DocumentFilter {
    /// Widened to u64: page is only bounded below, so the product can
    /// exceed u32 for far-out pages.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// `ORDER BY <sort> <dir>, <tiebreak> <dir>` — both columns in the
    /// same direction, guaranteeing a total order for stable paging.
    pub fn order_clause(&self) -> String {
        format!(
            "{} {}, {} {}",
            self.sort_by.column(),
            self.sort_dir.keyword(),
            self.sort_by.tie_breaker(),
            self.sort_dir.keyword()
        )
    }
}

/// Strategy seam between the document aggregator and the two dialects.
pub trait DocumentSqlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Count query over the full union, all filters applied, no paging.
    fn count_documents(&self, filter: &DocumentFilter) -> SqlStatement;

    /// Paginated keys query returning (docType, DocEntry, DocDate) in
    /// final display order.
    fn page_keys(&self, filter: &DocumentFilter) -> SqlStatement;

    /// `SELECT * FROM <table> WHERE DocEntry IN (...)` with one bound
    /// argument per id. An empty id list is a caller error.
    fn batch_select(
        &self,
        table: &str,
        entries: &[i64],
    ) -> Result<SqlStatement, QueryGeneratorError>;
}
