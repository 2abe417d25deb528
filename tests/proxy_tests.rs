//! Ad-hoc proxy behavior that can be verified without a reachable
//! database, plus one opt-in test against a live server.

use sapgate::db::mssql::ConnectionSpec;
use sapgate::proxy::{AdHocQueryRequest, ProxyError, ProxyService};
use sapgate::query_guard::QueryRejected;

fn request(query: &str, db: ConnectionSpec) -> AdHocQueryRequest {
    AdHocQueryRequest {
        db_name: "SBODEMO".to_string(),
        db,
        query: query.to_string(),
        params: None,
        timeout_ms: None,
    }
}

#[tokio::test]
async fn write_statements_are_rejected_before_any_connection_attempt() {
    // The credentials are deliberately unusable; if validation did not
    // run first, this would fail with a connection error instead.
    let req = request("update t set x=1", ConnectionSpec::default());
    let err = ProxyService::run(&req).await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Rejected(QueryRejected::NotReadOnly)
    ));
}

#[tokio::test]
async fn invalid_params_are_rejected_before_any_connection_attempt() {
    let mut req = request("select 1 as x", ConnectionSpec::default());
    req.params = Some(
        [("bad-name".to_string(), serde_json::json!(1))]
            .into_iter()
            .collect(),
    );
    let err = ProxyService::run(&req).await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Rejected(QueryRejected::ParamNameBadChar(_))
    ));
}

/// Requires a reachable MSSQL server; configure via SAPGATE_TEST_DB_*
/// and run with `--ignored`.
#[tokio::test]
#[ignore]
async fn select_one_round_trips_against_live_server() {
    let spec = ConnectionSpec {
        server: std::env::var("SAPGATE_TEST_DB_SERVER").unwrap_or_default(),
        database: std::env::var("SAPGATE_TEST_DB_DATABASE").unwrap_or_default(),
        user: std::env::var("SAPGATE_TEST_DB_USER").unwrap_or_default(),
        password: std::env::var("SAPGATE_TEST_DB_PASSWORD").unwrap_or_default(),
    };

    let response = ProxyService::run(&request("select 1 as x", spec))
        .await
        .unwrap();
    assert_eq!(response.result_sets.len(), 1);
    assert_eq!(response.rows_total, 1);
    assert_eq!(response.result_sets[0].rows[0]["x"], serde_json::json!(1));
}
