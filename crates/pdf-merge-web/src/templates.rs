//! Askama templates for the upload page.

use askama::Template;
use askama_web::WebTemplate;

/// Landing page with the merge form.
///
/// The form posts every selected file under `field_name` straight to the
/// merge endpoint, so the browser downloads the result itself.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub merge_path: &'static str,
    pub field_name: String,
    pub max_files: usize,
    /// Size budget formatted in megabytes
    pub max_megabytes: String,
    pub min_files: usize,
}
