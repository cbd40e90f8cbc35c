//! Page routes - full HTML pages.

use axum::extract::State;
use pdf_merge_core::MERGE_PATH;
use pdf_merge_core::util::format_megabytes;
use std::sync::Arc;

use crate::state::AppState;
use crate::templates::IndexTemplate;

/// Landing page with upload form.
pub async fn index(State(state): State<Arc<AppState>>) -> IndexTemplate {
    let limits = state.limits();
    IndexTemplate {
        merge_path: MERGE_PATH,
        field_name: limits.field_name.clone(),
        max_files: limits.max_files,
        max_megabytes: format_megabytes(limits.max_total_bytes),
        min_files: state.min_files(),
    }
}
