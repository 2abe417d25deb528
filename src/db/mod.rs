//! Connection brokerage and query execution.
//!
//! Two broker variants exist: a long-lived pooled handle created at
//! startup for the document listing, and an ephemeral per-call MSSQL
//! handle the ad-hoc proxy builds from caller-supplied credentials and
//! drops when the call completes. Both sit behind the [`QueryExecutor`]
//! seam so the aggregator never cares which driver it talks to.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::sap_query_generator::{Dialect, SqlStatement};

pub mod errors;
pub mod hana;
pub mod mssql;
pub mod value;

pub use errors::DbError;
pub use hana::HanaPool;
pub use mssql::{EphemeralMssql, MssqlPool};

/// Applied when the caller requests nothing, or something out of range.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on caller-requested timeouts, in milliseconds.
pub const MAX_QUERY_TIMEOUT_MS: i64 = 120_000;

/// Ceiling for the liveness ping an ephemeral handle runs before use.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller timeouts are honored only inside (0, 120000] ms; anything
/// else silently falls back to the default rather than erroring.
pub fn effective_timeout(requested_ms: Option<i64>) -> Duration {
    match requested_ms {
        Some(ms) if ms > 0 && ms <= MAX_QUERY_TIMEOUT_MS => Duration::from_millis(ms as u64),
        _ => DEFAULT_QUERY_TIMEOUT,
    }
}

/// One result set: ordered column names plus ordered, normalized rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

/// Everything a statement produced: all result sets in execution order
/// and the grand total row count across them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub result_sets: Vec<ResultSet>,
    pub rows_total: usize,
}

/// Executes a built statement against one database handle. Calls are
/// attempt-once: a timeout abandons the in-flight command, and any
/// driver error discards result sets already read.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn execute(
        &self,
        statement: &SqlStatement,
        timeout: Duration,
    ) -> Result<QueryOutcome, DbError>;
}
