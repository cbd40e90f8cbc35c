//! HTTP route handlers for the PDF merge web application.
//!
//! The upload page is rendered with Askama; the merge endpoint returns
//! either the merged PDF or a JSON error body.

mod merge;
mod pages;

pub use merge::merge_pdfs;
pub use pages::index;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use pdf_merge_core::MERGE_PATH;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(index))
        // API endpoints
        .route(MERGE_PATH, post(merge_pdfs))
        // Middleware
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(DefaultBodyLimit::max(state.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
