//! HTTP surface of the reconciliation service.
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/reconcile` | GET | Service manifest |
//! | `/reconcile` | POST | Batch queries / data extension |
//! | `/reconcile/properties` | GET | Extendable property proposal |
//! | `/suggest/entity` | GET | Entity typeahead |
//! | `/suggest/property` | GET | Property typeahead |
//!
//! Clients post form-encoded `queries=<json>` or `extend=<json>`, per
//! the reconciliation protocol.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::index::SearchIndexGateway;

use super::batch::run_batch;
use super::extend::{run_extend, ExtendRequest, EXTEND_PROPERTIES};
use super::manifest::manifest;
use super::suggest::{suggest_entity, suggest_property, SUGGEST_LIMIT};
use super::validate::DEFAULT_LIMIT;

/// Shared state for the reconciliation routes.
#[derive(Clone)]
pub struct ReconState {
    pub gateway: Arc<dyn SearchIndexGateway>,
    /// The index served to reconciliation clients (the merged index).
    pub index: String,
    pub default_lang: String,
    pub batch_ceiling: usize,
    pub public_url: String,
}

/// Build the reconciliation router.
pub fn recon_router(state: ReconState) -> Router {
    Router::new()
        .route("/reconcile", get(get_manifest).post(post_reconcile))
        .route("/reconcile/properties", get(get_properties))
        .route("/suggest/entity", get(get_suggest_entity))
        .route("/suggest/property", get(get_suggest_property))
        .with_state(state)
}

#[derive(Deserialize, Default)]
struct TokenParams {
    #[serde(default)]
    token: Option<String>,
}

async fn get_manifest(
    State(state): State<ReconState>,
    Query(params): Query<TokenParams>,
) -> Json<Value> {
    let credential = params.token.unwrap_or_default();
    Json(manifest(&state.public_url, &credential))
}

#[derive(Deserialize, Default)]
struct ReconPost {
    #[serde(default)]
    queries: Option<String>,
    #[serde(default)]
    extend: Option<String>,
}

async fn post_reconcile(
    State(state): State<ReconState>,
    Form(body): Form<ReconPost>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(raw) = body.queries {
        let queries: Value = serde_json::from_str(&raw).map_err(bad_request)?;
        let Some(map) = queries.as_object() else {
            return Err(bad_request("queries must be a JSON object"));
        };
        let out = run_batch(
            state.gateway.as_ref(),
            &state.index,
            &state.default_lang,
            map,
            state.batch_ceiling,
        )
        .await;
        return Ok(Json(out));
    }

    if let Some(raw) = body.extend {
        let request: ExtendRequest = serde_json::from_str(&raw).map_err(bad_request)?;
        let out = run_extend(state.gateway.as_ref(), &state.index, &request)
            .await
            .map_err(bad_request)?;
        return Ok(Json(out));
    }

    Err(bad_request("expected a 'queries' or 'extend' form field"))
}

async fn get_properties(State(_state): State<ReconState>) -> Json<Value> {
    Json(json!({
        "limit": DEFAULT_LIMIT,
        "type": "Place",
        "properties": EXTEND_PROPERTIES.iter()
            .map(|p| json!({"id": p.id, "name": p.name}))
            .collect::<Vec<_>>(),
    }))
}

#[derive(Deserialize)]
struct SuggestParams {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    cursor: usize,
}

async fn get_suggest_entity(
    State(state): State<ReconState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let out = suggest_entity(
        state.gateway.as_ref(),
        &state.index,
        &params.prefix,
        params.cursor,
        SUGGEST_LIMIT,
    )
    .await
    .map_err(bad_request)?;
    Ok(Json(out))
}

async fn get_suggest_property(Query(params): Query<SuggestParams>) -> Json<Value> {
    Json(suggest_property(&params.prefix, params.cursor, SUGGEST_LIMIT))
}

fn bad_request<E: std::fmt::Display>(err: E) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": err.to_string()})),
    )
}
