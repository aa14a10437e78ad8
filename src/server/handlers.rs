//! Query-service handlers.
//!
//! Arguments are lenient: a missing or malformed argument behaves like an
//! empty one and never produces a 4xx. Store failures map to a 500 with an
//! `{"error": ...}` body.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::AppState;
use crate::error::CatalogError;
use crate::model::{BookHit, Form};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Topic name, or `*` for every book.
    pub kw: String,
    /// Form name, or `all`.
    pub form: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FavParams {
    pub val: String,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetaParams {
    pub key: String,
}

fn internal_error(e: CatalogError) -> Response {
    warn!("Query service error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// Books filtered by form and topic.
pub async fn query(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    let form = match params.form.trim() {
        f if f.is_empty() || f.eq_ignore_ascii_case("all") => None,
        f => match f.parse::<Form>() {
            Ok(form) => Some(form),
            // No book can have an unknown form.
            Err(_) => return Json(vec![BookHit::no_match()]).into_response(),
        },
    };

    let mut store = state.store.lock().await;
    match store.query_books(&params.kw, form).await {
        Ok(hits) => Json(hits).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Toggle the favorite flag of a book; committed immediately.
pub async fn set_fav(State(state): State<AppState>, Query(params): Query<FavParams>) -> Response {
    let Ok(book_id) = params.id.trim().parse::<i64>() else {
        return StatusCode::OK.into_response();
    };
    let favorite = params.val == "1";

    let mut store = state.store.lock().await;
    let result = match store.set_favorite(book_id, favorite).await {
        Ok(_) => store.commit_transaction().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            if let Err(cancel) = store.cancel_transaction().await {
                warn!("Rollback failed: {}", cancel);
            }
            internal_error(e)
        }
    }
}

/// Catalog metadata. Only `key=user` is known; it reports the owner name.
pub async fn dbmeta(State(state): State<AppState>, Query(params): Query<MetaParams>) -> Response {
    if params.key != "user" {
        return Json(serde_json::Value::Null).into_response();
    }
    let mut store = state.store.lock().await;
    match store.owner().await {
        Ok(owner) => Json(owner).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn status() -> impl IntoResponse {
    Json(json!({ "status": "running" }))
}

/// Ask the server to shut down gracefully.
pub async fn turnoff(State(state): State<AppState>) -> impl IntoResponse {
    info!("Shutdown requested");
    state.shutdown.notify_one();
    StatusCode::OK
}
