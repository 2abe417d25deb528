//! HANA broker and executor on top of hdbconnect behind a bb8 manager.
//!
//! HANA only serves the pooled document-listing path; the ad-hoc proxy
//! is MSSQL-scoped because its callers supply MSSQL credentials.

use std::time::Duration;

use async_trait::async_trait;
use hdbconnect_async::{ConnectParams, Connection, HdbError, HdbValue};
use serde_json::Value;

use super::{value, DbError, QueryExecutor, QueryOutcome, ResultSet};
use crate::config::DatabaseConfig;
use crate::sap_query_generator::{Dialect, SqlParams, SqlStatement, SqlValue};

pub struct HanaConnectionManager {
    params: ConnectParams,
}

#[async_trait]
impl bb8::ManageConnection for HanaConnectionManager {
    type Connection = Connection;
    type Error = HdbError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::new(self.params.clone()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.query("SELECT 1 FROM DUMMY").await.map(|_| ())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Long-lived pooled HANA handle for the document listing.
pub struct HanaPool {
    pool: bb8::Pool<HanaConnectionManager>,
}

impl HanaPool {
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, DbError> {
        let params = ConnectParams::builder()
            .hostname(&cfg.server)
            .port(cfg.port)
            .dbname(&cfg.database)
            .dbuser(&cfg.user)
            .password(&cfg.password)
            .build()
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let pool = bb8::Pool::builder()
            .max_size(10)
            .build(HanaConnectionManager { params })
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        // Verify the connection before the server starts serving.
        pool.get()
            .await
            .map_err(|e| DbError::Ping(e.to_string()))?
            .query("SELECT 1 FROM DUMMY")
            .await
            .map_err(|e| DbError::Ping(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for HanaPool {
    fn dialect(&self) -> Dialect {
        Dialect::Hana
    }

    async fn execute(
        &self,
        statement: &SqlStatement,
        timeout: Duration,
    ) -> Result<QueryOutcome, DbError> {
        let SqlParams::Positional(args) = &statement.params else {
            return Err(DbError::ExpectedPositionalParams);
        };

        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        match tokio::time::timeout(timeout, run_statement(&conn, &statement.sql, args)).await {
            Ok(result) => result,
            // Dropping the future abandons the in-flight command.
            Err(_) => Err(DbError::Timeout(timeout.as_millis())),
        }
    }
}

async fn run_statement(
    conn: &Connection,
    sql: &str,
    args: &[SqlValue],
) -> Result<QueryOutcome, DbError> {
    let result_set = if args.is_empty() {
        conn.query(sql)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?
    } else {
        let mut prepared = conn
            .prepare(sql)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        let row: Vec<SqlValue> = args.to_vec();
        prepared
            .execute(&row)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?
            .into_result_set()
            .map_err(|e| DbError::Execution(e.to_string()))?
    };

    // A prepared SELECT yields exactly one result set on this driver.
    let result_set = normalize_result_set(result_set).await?;
    let rows_total = result_set.rows.len();
    Ok(QueryOutcome {
        result_sets: vec![result_set],
        rows_total,
    })
}

async fn normalize_result_set(
    mut rs: hdbconnect_async::ResultSet,
) -> Result<ResultSet, DbError> {
    let columns: Vec<String> = rs
        .metadata()
        .iter()
        .map(|field| field.displayname().to_string())
        .collect();

    let mut rows = Vec::new();
    while let Some(row) = rs
        .next_row()
        .await
        .map_err(|e| DbError::Execution(e.to_string()))?
    {
        let mut map = serde_json::Map::with_capacity(columns.len());
        for (i, hdb_value) in row.into_iter().enumerate() {
            if let Some(name) = columns.get(i) {
                map.insert(name.clone(), hdb_value_to_json(hdb_value)?);
            }
        }
        rows.push(map);
    }

    Ok(ResultSet { columns, rows })
}

fn hdb_value_to_json(value: HdbValue<'static>) -> Result<Value, DbError> {
    Ok(match value {
        HdbValue::NULL => Value::Null,
        HdbValue::BOOLEAN(b) => Value::Bool(b),
        HdbValue::TINYINT(v) => Value::from(v),
        HdbValue::SMALLINT(v) => Value::from(v),
        HdbValue::INT(v) => Value::from(v),
        HdbValue::BIGINT(v) => Value::from(v),
        HdbValue::REAL(v) => value::f64_to_json(v as f64),
        HdbValue::DOUBLE(v) => value::f64_to_json(v),
        HdbValue::STRING(s) => Value::String(s),
        HdbValue::BINARY(b) => value::bytes_to_json(&b),
        v @ (HdbValue::LONGDATE(_) | HdbValue::SECONDDATE(_)) => {
            let text: String = v
                .try_into()
                .map_err(|e: HdbError| DbError::Normalize(e.to_string()))?;
            timestamp_text_to_json(text)
        }
        v @ (HdbValue::DAYDATE(_) | HdbValue::SECONDTIME(_)) => {
            let text: String = v
                .try_into()
                .map_err(|e: HdbError| DbError::Normalize(e.to_string()))?;
            Value::String(text)
        }
        v @ HdbValue::DECIMAL(_) => {
            let text: String = v
                .try_into()
                .map_err(|e: HdbError| DbError::Normalize(e.to_string()))?;
            match text.parse::<f64>() {
                Ok(f) => value::f64_to_json(f),
                Err(_) => Value::String(text),
            }
        }
        other => Value::String(other.to_string()),
    })
}

/// The driver renders timestamps as ISO text; re-render through chrono
/// so MSSQL and HANA expose the identical nanosecond UTC format.
fn timestamp_text_to_json(text: String) -> Value {
    let parsed = chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f"));
    match parsed {
        Ok(ndt) => value::naive_datetime_to_json(ndt),
        Err(_) => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_text_normalizes_to_utc_nanos() {
        assert_eq!(
            timestamp_text_to_json("2024-03-01T08:15:30.5".to_string()),
            Value::String("2024-03-01T08:15:30.500000000Z".to_string())
        );
        assert_eq!(
            timestamp_text_to_json("2024-03-01 08:15:30".to_string()),
            Value::String("2024-03-01T08:15:30.000000000Z".to_string())
        );
        // Unparseable text is surfaced untouched instead of dropped.
        assert_eq!(
            timestamp_text_to_json("not a timestamp".to_string()),
            Value::String("not a timestamp".to_string())
        );
    }
}
