//! MSSQL broker and executor on top of tiberius + bb8.
//!
//! Tiberius binds parameters positionally (`@P1..@Pn`), so named
//! statements are rewritten before execution: each distinct name keeps
//! a single bound argument and every occurrence of its placeholder is
//! mapped onto the same `@Pi` slot.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tiberius::{AuthMethod, ColumnData, Config, EncryptionLevel, ToSql};

use super::{value, DbError, QueryExecutor, QueryOutcome, ResultSet, PING_TIMEOUT};
use crate::config::DatabaseConfig;
use crate::sap_query_generator::{Dialect, SqlParams, SqlStatement, SqlValue};

type TdsPool = bb8::Pool<bb8_tiberius::ConnectionManager>;
type TdsClient = tiberius::Client<tokio_util::compat::Compat<tokio::net::TcpStream>>;

/// Caller-supplied credentials for one ad-hoc proxy call. Never
/// persisted; lifetime is the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSpec {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl ConnectionSpec {
    pub fn is_complete(&self) -> bool {
        !self.server.is_empty() && !self.database.is_empty() && !self.user.is_empty()
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
            SqlValue::Int(i) => ColumnData::I64(Some(*i)),
            SqlValue::Float(f) => ColumnData::F64(Some(*f)),
            SqlValue::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            SqlValue::Date(d) => d.to_sql(),
        }
    }
}

/// Long-lived pooled handle for the document listing. Created once at
/// startup; requests share it and never reconfigure it.
pub struct MssqlPool {
    pool: TdsPool,
}

impl MssqlPool {
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, DbError> {
        let mut config = Config::new();
        config.host(&cfg.server);
        config.port(cfg.port);
        config.database(&cfg.database);
        config.authentication(AuthMethod::sql_server(&cfg.user, &cfg.password));
        config.encryption(EncryptionLevel::NotSupported);
        config.trust_cert();

        let manager = bb8_tiberius::ConnectionManager::new(config);
        let pool = bb8::Pool::builder()
            .max_size(10)
            .build(manager)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        // Verify the connection before the server starts serving.
        let handle = Self { pool };
        ping(&handle.pool).await?;
        Ok(handle)
    }
}

#[async_trait]
impl QueryExecutor for MssqlPool {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn execute(
        &self,
        statement: &SqlStatement,
        timeout: Duration,
    ) -> Result<QueryOutcome, DbError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        run_with_timeout(&mut conn, statement, timeout).await
    }
}

/// Per-call handle for the ad-hoc proxy, built from caller credentials.
/// Conservative limits (max 10 connections, 5-minute lifetime) even
/// though the handle serves one call; a bounded liveness ping runs
/// before the caller's query, and dropping the handle closes it on
/// every exit path.
pub struct EphemeralMssql {
    pool: TdsPool,
}

impl EphemeralMssql {
    pub async fn open(spec: &ConnectionSpec) -> Result<Self, DbError> {
        if !spec.is_complete() {
            return Err(DbError::MissingConnectionFields);
        }

        let (host, port) = split_host_port(&spec.server)?;
        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.database(&spec.database);
        config.authentication(AuthMethod::sql_server(&spec.user, &spec.password));
        config.encryption(EncryptionLevel::NotSupported);
        config.trust_cert();

        let manager = bb8_tiberius::ConnectionManager::new(config);
        let pool = bb8::Pool::builder()
            .max_size(10)
            .max_lifetime(Some(Duration::from_secs(300)))
            .connection_timeout(PING_TIMEOUT)
            .build(manager)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        ping(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for EphemeralMssql {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn execute(
        &self,
        statement: &SqlStatement,
        timeout: Duration,
    ) -> Result<QueryOutcome, DbError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        run_with_timeout(&mut conn, statement, timeout).await
    }
}

async fn ping(pool: &TdsPool) -> Result<(), DbError> {
    let check = async {
        let mut conn = pool.get().await.map_err(|e| DbError::Ping(e.to_string()))?;
        conn.simple_query("SELECT 1")
            .await
            .map_err(|e| DbError::Ping(e.to_string()))?
            .into_results()
            .await
            .map_err(|e| DbError::Ping(e.to_string()))?;
        Ok(())
    };
    match tokio::time::timeout(PING_TIMEOUT, check).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Ping(format!(
            "no response within {} ms",
            PING_TIMEOUT.as_millis()
        ))),
    }
}

async fn run_with_timeout(
    client: &mut TdsClient,
    statement: &SqlStatement,
    timeout: Duration,
) -> Result<QueryOutcome, DbError> {
    match tokio::time::timeout(timeout, run_statement(client, statement)).await {
        Ok(result) => result,
        // Dropping the future abandons the in-flight command; the call
        // is attempt-once and never retried here.
        Err(_) => Err(DbError::Timeout(timeout.as_millis())),
    }
}

async fn run_statement(
    client: &mut TdsClient,
    statement: &SqlStatement,
) -> Result<QueryOutcome, DbError> {
    let SqlParams::Named(args) = &statement.params else {
        return Err(DbError::ExpectedNamedParams);
    };

    let names: Vec<&str> = args.iter().map(|(name, _)| name.as_str()).collect();
    let sql = inline_named_placeholders(&statement.sql, &names);
    let params: Vec<&dyn ToSql> = args.iter().map(|(_, v)| v as &dyn ToSql).collect();

    let stream = client
        .query(sql, &params)
        .await
        .map_err(|e| DbError::Execution(e.to_string()))?;
    let sets = stream
        .into_results()
        .await
        .map_err(|e| DbError::Execution(e.to_string()))?;

    Ok(normalize_result_sets(sets))
}

/// Rewrite `@name` placeholders to the `@Pi` slot of their single bound
/// argument. Single-quoted literals are left untouched; identifiers not
/// present in `names` pass through for the server to complain about.
fn inline_named_placeholders(sql: &str, names: &[&str]) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if in_literal {
            out.push(c);
            if c == '\'' {
                in_literal = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_literal = true;
                out.push(c);
            }
            '@' => {
                let mut ident = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match names.iter().position(|n| *n == ident) {
                    Some(pos) => {
                        out.push_str("@P");
                        out.push_str(&(pos + 1).to_string());
                    }
                    None => {
                        out.push('@');
                        out.push_str(&ident);
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn normalize_result_sets(sets: Vec<Vec<tiberius::Row>>) -> QueryOutcome {
    let mut result_sets = Vec::with_capacity(sets.len());
    let mut rows_total = 0;

    for set in sets {
        let columns: Vec<String> = set
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(set.len());
        for row in set {
            rows_total += 1;
            rows.push(row_to_json(&row, &columns));
        }
        result_sets.push(ResultSet { columns, rows });
    }

    QueryOutcome {
        result_sets,
        rows_total,
    }
}

fn row_to_json(row: &tiberius::Row, columns: &[String]) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::with_capacity(columns.len());
    for (i, (_, data)) in row.cells().enumerate() {
        let value = match data {
            // Temporal types go through the typed chrono getters so one
            // fixed textual format leaves this module.
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<chrono::NaiveDateTime, _>(i)
                .ok()
                .flatten()
                .map(value::naive_datetime_to_json)
                .unwrap_or(Value::Null),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
                .ok()
                .flatten()
                .map(value::datetime_to_json)
                .unwrap_or(Value::Null),
            ColumnData::Date(Some(_)) => row
                .try_get::<chrono::NaiveDate, _>(i)
                .ok()
                .flatten()
                .map(value::date_to_json)
                .unwrap_or(Value::Null),
            ColumnData::Time(Some(_)) => row
                .try_get::<chrono::NaiveTime, _>(i)
                .ok()
                .flatten()
                .map(value::time_to_json)
                .unwrap_or(Value::Null),
            other => column_data_to_json(other),
        };
        if let Some(name) = columns.get(i) {
            map.insert(name.clone(), value);
        }
    }
    map
}

fn column_data_to_json(data: &ColumnData<'_>) -> Value {
    match data {
        ColumnData::Bit(Some(b)) => Value::Bool(*b),
        ColumnData::U8(Some(v)) => Value::from(*v),
        ColumnData::I16(Some(v)) => Value::from(*v),
        ColumnData::I32(Some(v)) => Value::from(*v),
        ColumnData::I64(Some(v)) => Value::from(*v),
        ColumnData::F32(Some(v)) => value::f64_to_json(*v as f64),
        ColumnData::F64(Some(v)) => value::f64_to_json(*v),
        ColumnData::Numeric(Some(n)) => {
            value::f64_to_json(n.value() as f64 / 10f64.powi(n.scale() as i32))
        }
        ColumnData::String(Some(s)) => Value::String(s.to_string()),
        ColumnData::Guid(Some(g)) => Value::String(g.to_string()),
        ColumnData::Binary(Some(b)) => value::bytes_to_json(b),
        ColumnData::Xml(Some(xml)) => Value::String(xml.to_string()),
        // NULLs of any type, plus temporal variants already handled.
        _ => Value::Null,
    }
}

fn split_host_port(server: &str) -> Result<(&str, u16), DbError> {
    match server.split_once(':') {
        None => Ok((server, 1433)),
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                DbError::Connection(format!("invalid port in db.server: {}", server))
            })?;
            Ok((host, port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_placeholders_share_one_slot() {
        let sql = "SELECT * FROM t WHERE a = @cardCode OR b = @cardCode AND c = @dateFrom";
        let rewritten = inline_named_placeholders(sql, &["cardCode", "dateFrom"]);
        assert_eq!(
            rewritten,
            "SELECT * FROM t WHERE a = @P1 OR b = @P1 AND c = @P2"
        );
    }

    #[test]
    fn placeholders_inside_literals_are_untouched() {
        let sql = "SELECT '@cardCode' AS label, @cardCode AS v FROM t";
        let rewritten = inline_named_placeholders(sql, &["cardCode"]);
        assert_eq!(rewritten, "SELECT '@cardCode' AS label, @P1 AS v FROM t");
    }

    #[test]
    fn unknown_names_pass_through() {
        let sql = "SELECT @unknown FROM t";
        assert_eq!(inline_named_placeholders(sql, &["known"]), sql);
    }

    #[test]
    fn prefix_names_do_not_collide() {
        let sql = "SELECT @id, @id2 FROM t";
        let rewritten = inline_named_placeholders(sql, &["id", "id2"]);
        assert_eq!(rewritten, "SELECT @P1, @P2 FROM t");
    }

    #[test]
    fn server_host_port_split() {
        assert_eq!(split_host_port("sap01").unwrap(), ("sap01", 1433));
        assert_eq!(
            split_host_port("sap01:14330").unwrap(),
            ("sap01", 14330)
        );
        assert!(split_host_port("sap01:x").is_err());
    }

    #[test]
    fn incomplete_spec_is_rejected() {
        let spec = ConnectionSpec {
            server: "sap01".to_string(),
            database: String::new(),
            user: "b1reader".to_string(),
            password: String::new(),
        };
        assert!(!spec.is_complete());
    }
}
