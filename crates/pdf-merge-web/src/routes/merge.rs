//! Merge route - multipart upload in, merged PDF out.

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::Response,
};
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::{MultipartError, MultipartRejection};
use bytes::BytesMut;
use pdf_merge_core::{
    Error, FileSet, FormEntry, MERGED_FILENAME, MergeLimits, PDF_MIME, UploadedFile,
    merge_file_set,
};
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{ApiError, ResultExt, RouteResult};
use crate::state::AppState;

/// Collect every entry under the files field, in submission order.
///
/// Parts with a filename are files; parts without one are plain fields,
/// which still count towards the entry limit. Parts under other names are
/// skipped.
///
/// Parts are streamed. Once the entry count is past `max_files` or the file
/// bytes are past `max_total_bytes` the outcome of validation is fixed, so
/// later content is only counted and drained, never held. Declared types and
/// sizes are still recorded so validation reports the first failure in order.
async fn read_entries(
    multipart: &mut Multipart,
    limits: &MergeLimits,
) -> Result<Vec<FormEntry>, MultipartError> {
    let mut entries = Vec::new();
    let mut file_bytes: u64 = 0;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(limits.field_name.as_str()) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let is_file = filename.is_some();
        // Past either limit the outcome is fixed, so the content is irrelevant.
        let mut holding =
            entries.len() < limits.max_files && file_bytes <= limits.max_total_bytes;

        let mut buffer = BytesMut::new();
        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            let len = chunk.len() as u64;
            size = size.saturating_add(len);
            if is_file {
                file_bytes = file_bytes.saturating_add(len);
            }

            let counted = if is_file { file_bytes } else { size };
            holding &= counted <= limits.max_total_bytes;
            if holding {
                buffer.extend_from_slice(&chunk);
            }
        }

        let entry = if is_file {
            FormEntry::File(UploadedFile::streamed(
                filename,
                content_type,
                buffer.freeze(),
                size,
            ))
        } else {
            FormEntry::Field {
                value: String::from_utf8_lossy(&buffer).into_owned(),
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}

/// Merge uploaded PDFs into one document returned as an attachment.
///
/// The whole upload is validated before any PDF is parsed. Parsing and
/// assembly run on the blocking pool.
pub async fn merge_pdfs(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> RouteResult<Response> {
    let span = info_span!("merge", request_id = %Uuid::new_v4());
    handle_merge(state, multipart).instrument(span).await
}

async fn handle_merge(
    state: Arc<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> RouteResult<Response> {
    let expose = state.expose_error_detail();

    // A body that is not multipart at all carries no files.
    let mut multipart = multipart.map_err(|e| {
        warn!("Rejected non-multipart request: {}", e);
        ApiError::from_merge(&Error::NoFiles, expose)
    })?;

    let entries = read_entries(&mut multipart, state.limits())
        .await
        .map_err(|e| ApiError::from_multipart(&e, expose))?;
    debug!("Received {} entries", entries.len());

    let set =
        FileSet::from_entries(entries, state.limits()).map_err(|e| ApiError::from_merge(&e, expose))?;

    let span = Span::current();
    let merged = tokio::task::spawn_blocking(move || span.in_scope(|| merge_file_set(&set)))
        .await
        .or_internal_error(expose)?
        .map_err(|e| ApiError::from_merge(&e, expose))?;

    info!(
        "Returning {} pages ({} bytes)",
        merged.page_count,
        merged.bytes.len()
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_MIME)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{MERGED_FILENAME}\""),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(merged.bytes))
        .or_internal_error(expose)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routes::router;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use lopdf::{Dictionary, Document, Object, Stream};
    use pdf_merge_core::{AppConfig, MERGE_PATH};
    use tower::ServiceExt;

    const BOUNDARY: &str = "merge-test-boundary";

    fn build_pdf(label: &str, pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (1..=pages)
            .map(|n| {
                let content = format!("BT /F1 12 Tf 72 720 Td ({label}-{n}) Tj ET");
                let content_id =
                    doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
                let page_id = doc.add_object(Dictionary::from_iter([
                    ("Type", Object::Name(b"Page".to_vec())),
                    ("Parent", Object::Reference(pages_id)),
                    ("Contents", Object::Reference(content_id)),
                ]));
                Object::Reference(page_id)
            })
            .collect();

        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                ),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    enum Part<'a> {
        File {
            filename: &'a str,
            content_type: Option<&'a str>,
            bytes: Vec<u8>,
        },
        Text(&'a str),
    }

    fn pdf_part(filename: &str, bytes: Vec<u8>) -> Part<'_> {
        Part::File {
            filename,
            content_type: Some("application/pdf"),
            bytes,
        }
    }

    fn multipart_body(field: &str, parts: Vec<Part<'_>>) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File {
                    filename,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
                        )
                        .as_bytes(),
                    );
                    if let Some(content_type) = content_type {
                        body.extend_from_slice(
                            format!("Content-Type: {content_type}\r\n").as_bytes(),
                        );
                    }
                    body.extend_from_slice(b"\r\n");
                    body.extend_from_slice(&bytes);
                }
                Part::Text(value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn app(config: AppConfig) -> axum::Router {
        router(Arc::new(AppState::new(config)))
    }

    async fn post(config: AppConfig, body: Vec<u8>) -> Response {
        app(config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(MERGE_PATH)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn error_of(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_merges_three_and_five_pages() {
        let body = multipart_body(
            "files",
            vec![
                pdf_part("a.pdf", build_pdf("A", 3)),
                pdf_part("b.pdf", build_pdf("B", 5)),
            ],
        );

        let response = post(AppConfig::default(), body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"merged.pdf\""
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 8);

        let first = String::from_utf8_lossy(&doc.get_page_content(pages[0]).unwrap()).into_owned();
        let fourth = String::from_utf8_lossy(&doc.get_page_content(pages[3]).unwrap()).into_owned();
        assert!(first.contains("A-1"));
        assert!(fourth.contains("B-1"));
    }

    #[tokio::test]
    async fn test_single_file_is_accepted() {
        let body = multipart_body("files", vec![pdf_part("only.pdf", build_pdf("Only", 2))]);
        let response = post(AppConfig::default(), body).await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_no_files() {
        let body = multipart_body("files", vec![]);
        let (status, json) = error_of(post(AppConfig::default(), body).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "No files uploaded"}));
    }

    #[tokio::test]
    async fn test_files_under_other_field_are_ignored() {
        let body = multipart_body("attachments", vec![pdf_part("a.pdf", build_pdf("A", 1))]);
        let (status, json) = error_of(post(AppConfig::default(), body).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No files uploaded");
    }

    #[tokio::test]
    async fn test_too_many_files() {
        let parts = (0..21)
            .map(|_| pdf_part("x.pdf", b"%PDF-1.4".to_vec()))
            .collect();
        let (status, json) =
            error_of(post(AppConfig::default(), multipart_body("files", parts)).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Too many files");
    }

    #[tokio::test]
    async fn test_text_fields_count_towards_limit() {
        let mut config = AppConfig::default();
        config.limits.max_files = 2;

        let body = multipart_body(
            "files",
            vec![
                pdf_part("a.pdf", build_pdf("A", 1)),
                Part::Text("note"),
                pdf_part("b.pdf", build_pdf("B", 1)),
            ],
        );
        let (status, json) = error_of(post(config, body).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Too many files");
    }

    #[tokio::test]
    async fn test_non_pdf_rejected() {
        let body = multipart_body(
            "files",
            vec![
                pdf_part("a.pdf", build_pdf("A", 1)),
                Part::File {
                    filename: "photo.png",
                    content_type: Some("image/png"),
                    bytes: vec![0x89, b'P', b'N', b'G'],
                },
            ],
        );
        let (status, json) = error_of(post(AppConfig::default(), body).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Only PDFs allowed");
    }

    #[tokio::test]
    async fn test_missing_content_type_rejected() {
        let body = multipart_body(
            "files",
            vec![Part::File {
                filename: "mystery.pdf",
                content_type: None,
                bytes: build_pdf("A", 1),
            }],
        );
        let (status, json) = error_of(post(AppConfig::default(), body).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Only PDFs allowed");
    }

    #[tokio::test]
    async fn test_total_size_over_limit() {
        let first = build_pdf("A", 1);
        let second = build_pdf("B", 1);

        let mut config = AppConfig::default();
        config.limits.max_total_bytes = first.len() as u64;

        let body = multipart_body(
            "files",
            vec![pdf_part("a.pdf", first), pdf_part("b.pdf", second)],
        );
        let (status, json) = error_of(post(config, body).await).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"], "Files too large");
    }

    #[tokio::test]
    async fn test_too_many_files_beyond_total_size() {
        let mut config = AppConfig::default();
        config.limits.max_files = 4;
        config.limits.max_total_bytes = 1000;
        config.server.body_limit_slack = 0;

        let parts = ["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]
            .into_iter()
            .map(|name| pdf_part(name, vec![b'x'; 500]))
            .collect();
        let (status, json) = error_of(post(config, multipart_body("files", parts)).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Too many files");
    }

    #[tokio::test]
    async fn test_non_pdf_reported_before_oversized_pdf() {
        let mut config = AppConfig::default();
        config.limits.max_total_bytes = 1000;
        config.server.body_limit_slack = 0;

        let body = multipart_body(
            "files",
            vec![
                Part::File {
                    filename: "photo.png",
                    content_type: Some("image/png"),
                    bytes: vec![0x89, b'P', b'N', b'G'],
                },
                pdf_part("big.pdf", vec![b'x'; 5000]),
            ],
        );
        let (status, json) = error_of(post(config, body).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Only PDFs allowed");
    }

    #[tokio::test]
    async fn test_body_limit_maps_to_413() {
        let mut config = AppConfig::default();
        config.limits.max_total_bytes = 64;
        config.server.body_limit_slack = 0;

        let body = multipart_body(
            "files",
            vec![pdf_part("a.pdf", vec![b'x'; 4096])],
        );
        let (status, json) = error_of(post(config, body).await).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"], "Files too large");
    }

    #[tokio::test]
    async fn test_malformed_pdf_fails_without_detail() {
        let body = multipart_body(
            "files",
            vec![
                pdf_part("a.pdf", build_pdf("A", 1)),
                pdf_part("broken.pdf", b"%PDF-1.4 not really".to_vec()),
            ],
        );
        let (status, json) = error_of(post(AppConfig::default(), body).await).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, serde_json::json!({"error": "Merge failed"}));
    }

    #[tokio::test]
    async fn test_malformed_pdf_detail_when_exposed() {
        let mut config = AppConfig::default();
        config.server.expose_error_detail = true;

        let body = multipart_body("files", vec![pdf_part("broken.pdf", b"garbage".to_vec())]);
        let (status, json) = error_of(post(config, body).await).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Merge failed");
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn test_non_multipart_body() {
        let response = app(AppConfig::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(MERGE_PATH)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let (status, json) = error_of(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No files uploaded");
    }
}
