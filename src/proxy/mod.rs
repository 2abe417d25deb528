//! Ad-hoc read-only SQL proxy.
//!
//! Each call carries its own MSSQL credentials; a fresh connection
//! handle is opened, pinged, used for exactly one validated query, and
//! closed when the call returns on any path. Nothing about the target
//! database is configured server-side.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db::mssql::{ConnectionSpec, EphemeralMssql};
use crate::db::{effective_timeout, DbError, QueryExecutor, ResultSet};
use crate::query_guard::{self, QueryRejected};
use crate::sap_query_generator::{SqlParams, SqlStatement, SqlValue};

pub const MULTI_RESULT_SET_WARNING: &str =
    "query returned multiple result sets; only the first result set is returned in 'rows'";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Rejected(#[from] QueryRejected),

    #[error("invalid param {name:?}: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// One ad-hoc query call as posted by the caller.
#[derive(Debug, Deserialize)]
pub struct AdHocQueryRequest {
    #[serde(rename = "dbName", default)]
    pub db_name: String,
    #[serde(default)]
    pub db: ConnectionSpec,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub params: Option<HashMap<String, Value>>,
    #[serde(rename = "timeoutMs", default)]
    pub timeout_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AdHocQueryResponse {
    #[serde(rename = "dbName")]
    pub db_name: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u128,
    #[serde(rename = "resultSets")]
    pub result_sets: Vec<ResultSet>,
    #[serde(rename = "rowsTotal")]
    pub rows_total: usize,
    #[serde(rename = "warningNote", skip_serializing_if = "Option::is_none")]
    pub warning_note: Option<String>,
}

/// Convenience shape for callers that want a single flat result set.
/// `rows_total` still counts rows across every set the query produced.
#[derive(Debug, Serialize)]
pub struct FlatQueryResponse {
    #[serde(rename = "dbName")]
    pub db_name: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u128,
    #[serde(rename = "rowsTotal")]
    pub rows_total: usize,
    pub rows: Vec<serde_json::Map<String, Value>>,
    #[serde(rename = "warningNote", skip_serializing_if = "Option::is_none")]
    pub warning_note: Option<String>,
}

pub struct ProxyService;

impl ProxyService {
    /// Validate, connect, execute, normalize. The ephemeral handle is
    /// dropped before returning, success or not.
    pub async fn run(request: &AdHocQueryRequest) -> Result<AdHocQueryResponse, ProxyError> {
        query_guard::validate_read_only(&request.query)?;
        let params = build_params(request.params.as_ref())?;
        let timeout = effective_timeout(request.timeout_ms);

        let statement = SqlStatement {
            sql: request.query.clone(),
            params: SqlParams::Named(params),
        };

        let handle = EphemeralMssql::open(&request.db).await?;

        // Duration covers execution and row transfer, not connect/ping.
        let started = Instant::now();
        let outcome = handle.execute(&statement, timeout).await?;
        let duration_ms = started.elapsed().as_millis();

        log::info!(
            "ad-hoc query on {}: {} result set(s), {} row(s), {} ms",
            request.db_name,
            outcome.result_sets.len(),
            outcome.rows_total,
            duration_ms
        );

        Ok(AdHocQueryResponse {
            db_name: request.db_name.clone(),
            duration_ms,
            result_sets: outcome.result_sets,
            rows_total: outcome.rows_total,
            warning_note: None,
        })
    }

    /// Collapse a full response to its first result set. Extra sets are
    /// dropped with a warning note rather than an error; a warning the
    /// response already carries takes precedence.
    pub fn flatten(response: AdHocQueryResponse) -> FlatQueryResponse {
        let warning_note = match response.warning_note {
            Some(existing) => Some(existing),
            None if response.result_sets.len() > 1 => {
                Some(MULTI_RESULT_SET_WARNING.to_string())
            }
            None => None,
        };

        let rows = response
            .result_sets
            .into_iter()
            .next()
            .map(|rs| rs.rows)
            .unwrap_or_default();

        FlatQueryResponse {
            db_name: response.db_name,
            duration_ms: response.duration_ms,
            rows_total: response.rows_total,
            rows,
            warning_note,
        }
    }
}

/// Name-validate and convert caller params. Sorted by name so the
/// binding order is deterministic regardless of JSON map iteration.
fn build_params(
    params: Option<&HashMap<String, Value>>,
) -> Result<Vec<(String, SqlValue)>, ProxyError> {
    let Some(params) = params else {
        return Ok(Vec::new());
    };

    let mut names: Vec<&String> = params.keys().collect();
    names.sort();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        query_guard::validate_param_name(name)?;
        let value = SqlValue::from_json(&params[name]).map_err(|reason| {
            ProxyError::InvalidParam {
                name: name.clone(),
                reason,
            }
        })?;
        out.push((name.clone(), value));
    }
    Ok(out)
}
