use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{models::DocumentQuery, AppState};
use crate::proxy::{AdHocQueryRequest, ProxyService};

/// Simple health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "service": "sapgate",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /sql` — ad-hoc read-only query with caller credentials.
pub async fn ad_hoc_query(Json(request): Json<AdHocQueryRequest>) -> impl IntoResponse {
    match run_ad_hoc(&request).await {
        Ok(response) => (StatusCode::OK, Json(json!(response))),
        Err(rejection) => rejection,
    }
}

/// `POST /sql/flat` — same call, first result set only.
pub async fn ad_hoc_query_flat(Json(request): Json<AdHocQueryRequest>) -> impl IntoResponse {
    match run_ad_hoc(&request).await {
        Ok(response) => (StatusCode::OK, Json(json!(ProxyService::flatten(response)))),
        Err(rejection) => rejection,
    }
}

async fn run_ad_hoc(
    request: &AdHocQueryRequest,
) -> Result<crate::proxy::AdHocQueryResponse, (StatusCode, Json<serde_json::Value>)> {
    if request.db_name.is_empty() {
        return Err(bad_request("dbName is required"));
    }
    if !request.db.is_complete() {
        return Err(bad_request("db.server, db.database, db.user are required"));
    }

    // Validation, connection and execution failures all surface as 400
    // with the error text; the caller owns the target database.
    ProxyService::run(request).await.map_err(|e| {
        log::warn!("ad-hoc query on {} failed: {}", request.db_name, e);
        bad_request(&e.to_string())
    })
}

/// `GET /documents` — paginated cross-table document listing.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentQuery>,
) -> impl IntoResponse {
    let filter = match query.parse() {
        Ok(filter) => filter,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.message, "details": e.details})),
            );
        }
    };

    match state.documents.fetch_page(&filter).await {
        Ok(page) => (StatusCode::OK, Json(json!(page))),
        Err(e) => {
            log::error!("document listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "failed to fetch documents",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

fn bad_request(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
}
