use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::SelectedFile;
use crate::config::{ClientConfig, FILES_FIELD, MERGE_PATH};
use crate::error::{Error, Result};

/// Sends a selection to a merge endpoint and returns the merged bytes.
#[async_trait]
pub trait MergeTransport: Send + Sync {
    /// Submit all files, in order, as one multipart request.
    ///
    /// A non-success response must be reported as [`Error::ServerRejected`].
    async fn submit(&self, files: &[SelectedFile]) -> Result<Bytes>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Message to surface for a failed response.
///
/// Uses the `error` field of a JSON body when present, otherwise a generic
/// message carrying the status code.
pub fn rejection_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("Request failed ({status})"))
}

/// reqwest-backed transport posting to `<server_url>/api/merge`.
pub struct HttpTransport {
    client: Client,
    /// Full URL of the merge endpoint
    pub endpoint: String,
    /// Multipart field name for each file
    pub field_name: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::ClientInit(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.server_url.trim_end_matches('/'), MERGE_PATH),
            field_name: FILES_FIELD.to_string(),
        })
    }

    /// Use a different multipart field name.
    #[must_use]
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    fn build_form(&self, files: &[SelectedFile]) -> Result<Form> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
            if let Some(content_type) = &file.content_type {
                part = part
                    .mime_str(content_type)
                    .map_err(|e| Error::Request(format!("invalid content type: {e}")))?;
            }
            form = form.part(self.field_name.clone(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl MergeTransport for HttpTransport {
    async fn submit(&self, files: &[SelectedFile]) -> Result<Bytes> {
        let form = self.build_form(files)?;
        debug!("Submitting {} files to {}", files.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Request("timed out".to_string())
                } else {
                    Error::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .bytes()
                .await
                .map_err(|e| Error::Request(e.to_string()));
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = rejection_message(status.as_u16(), &body);
        warn!("Merge request rejected: {} - {}", status, message);

        Err(Error::ServerRejected {
            status: status.as_u16(),
            message,
        })
    }
}
