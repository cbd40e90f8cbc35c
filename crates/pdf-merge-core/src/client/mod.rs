//! Upload client controller.
//!
//! Holds the selection, busy flag and last error for a merge front end. The
//! state sits behind a mutex that is never held across an `.await`, so one
//! client can be shared between tasks and a second `merge` while the first is
//! in flight is rejected instead of racing it.

mod download;
mod transport;

pub use download::{DownloadSink, FileDownload};
pub use transport::{rejection_message, HttpTransport, MergeTransport};

use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::config::{ClientConfig, MERGED_FILENAME, PDF_MIME};
use crate::error::{Error, Result};
use crate::util::{format_megabytes, mime_matches};

/// A file picked by the user, before submission.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its type from the extension.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "document.pdf".to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());

        Ok(Self::new(name, content_type, bytes))
    }

    pub fn is_pdf(&self) -> bool {
        mime_matches(self.content_type.as_deref(), PDF_MIME)
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Count and size of the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub count: usize,
    pub total_bytes: u64,
    pub names: Vec<String>,
}

impl SelectionSummary {
    pub fn megabytes(&self) -> String {
        format_megabytes(self.total_bytes)
    }
}

impl fmt::Display for SelectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "No files selected.")
        } else {
            write!(f, "{} file(s) selected • {} MB", self.count, self.megabytes())
        }
    }
}

/// What a successful merge produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub files: usize,
    pub bytes: usize,
}

#[derive(Debug, Default)]
struct ClientState {
    files: Vec<SelectedFile>,
    busy: bool,
    error: Option<String>,
}

/// Clears the busy flag when dropped, whatever the merge outcome.
struct BusyGuard<'a> {
    state: &'a Mutex<ClientState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
    }
}

/// Stateful merge front end over a transport and a download sink.
pub struct UploadClient<T, S> {
    transport: T,
    sink: S,
    min_files: usize,
    state: Mutex<ClientState>,
}

impl<T: MergeTransport, S: DownloadSink> UploadClient<T, S> {
    pub fn new(transport: T, sink: S, config: &ClientConfig) -> Self {
        Self {
            transport,
            sink,
            min_files: config.min_files,
            state: Mutex::new(ClientState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the selection with the PDF entries of `files`.
    ///
    /// Non-PDF entries are dropped silently and any previous error is
    /// cleared. Returns the number of files kept. Selection is refused while
    /// a merge is running.
    pub fn select(&self, files: impl IntoIterator<Item = SelectedFile>) -> Result<usize> {
        let mut state = self.state();
        if state.busy {
            return Err(Error::ClientBusy);
        }

        state.error = None;
        state.files = files.into_iter().filter(SelectedFile::is_pdf).collect();
        Ok(state.files.len())
    }

    pub fn summary(&self) -> SelectionSummary {
        let state = self.state();
        SelectionSummary {
            count: state.files.len(),
            total_bytes: state.files.iter().map(SelectedFile::len).sum(),
            names: state.files.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state().busy
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Whether `merge` would currently be accepted.
    pub fn can_merge(&self) -> bool {
        let state = self.state();
        !state.busy && state.files.len() >= self.min_files
    }

    /// Submit the selection and deliver the merged PDF.
    ///
    /// Refused without touching state when busy or when fewer than
    /// `min_files` are selected. On failure the error message is stored and
    /// the selection kept; on success the selection is cleared. The busy flag
    /// is cleared in every case.
    pub async fn merge(&self) -> Result<MergeOutcome> {
        let (_guard, files) = {
            let mut state = self.state();
            if state.busy {
                return Err(Error::ClientBusy);
            }
            if state.files.len() < self.min_files {
                return Err(Error::NotEnoughFiles {
                    selected: state.files.len(),
                    required: self.min_files,
                });
            }

            state.busy = true;
            state.error = None;
            (BusyGuard { state: &self.state }, state.files.clone())
        };

        match self.submit(&files).await {
            Ok(outcome) => {
                self.state().files.clear();
                info!("Merged {} files ({} bytes)", outcome.files, outcome.bytes);
                Ok(outcome)
            }
            Err(e) => {
                warn!("Merge failed: {}", e);
                self.state().error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn submit(&self, files: &[SelectedFile]) -> Result<MergeOutcome> {
        let bytes = self.transport.submit(files).await?;
        self.sink.deliver(MERGED_FILENAME, &bytes).await?;

        Ok(MergeOutcome {
            files: files.len(),
            bytes: bytes.len(),
        })
    }
}
