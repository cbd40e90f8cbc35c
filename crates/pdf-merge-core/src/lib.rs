//! PDF Merge Core Library
//!
//! This library provides the core functionality for merging uploaded PDFs:
//! - Upload validation (entry count, MIME type, cumulative size)
//! - Page concatenation via lopdf, ignoring encryption flags
//! - An upload client controller with an HTTP transport
//! - Configuration loading

pub mod client;
pub mod config;
pub mod error;
pub mod pdf;
pub mod upload;
pub mod util;

pub use client::{
    DownloadSink, FileDownload, HttpTransport, MergeOutcome, MergeTransport, SelectedFile,
    SelectionSummary, UploadClient,
};
pub use config::{
    AppConfig, ClientConfig, MergeLimits, ServerConfig, FILES_FIELD, MAX_FILES,
    MAX_TOTAL_BYTES, MERGED_FILENAME, MERGE_PATH, PDF_MIME,
};
pub use error::{Error, ErrorKind, Result};
pub use pdf::{MergedDocument, PdfDocument};
pub use upload::{FileSet, FormEntry, UploadedFile};

use tracing::{debug, info};

/// Result of merging a file set
#[derive(Debug)]
pub struct MergedPdf {
    /// Serialized PDF
    pub bytes: Vec<u8>,
    /// Total pages in the output
    pub page_count: usize,
    /// Pages contributed by each input, in input order
    pub source_pages: Vec<usize>,
}

/// Parse every file in order and concatenate all of their pages.
///
/// Inputs are processed sequentially; the first parse or copy failure aborts
/// the merge and no output is produced.
pub fn merge_file_set(set: &FileSet) -> Result<MergedPdf> {
    let mut merged = MergedDocument::new();
    let mut source_pages = Vec::with_capacity(set.len());

    for (index, file) in set.files().iter().enumerate() {
        if !file.is_complete() {
            return Err(Error::PdfParse {
                index,
                reason: format!("only {} of {} bytes received", file.bytes.len(), file.len()),
            });
        }
        let doc = PdfDocument::from_bytes(&file.bytes, index)?;
        debug!(
            "Input {} ({}): {} pages, {} bytes",
            index,
            file.display_name(),
            doc.page_count(),
            file.len()
        );
        source_pages.push(merged.append(doc)?);
    }

    let page_count = merged.page_count();
    let bytes = merged.save()?;

    info!(
        "Merged {} files into {} pages ({} bytes)",
        set.len(),
        page_count,
        bytes.len()
    );

    Ok(MergedPdf {
        bytes,
        page_count,
        source_pages,
    })
}

/// Validate raw form entries and merge them in one step.
pub fn merge_entries(entries: Vec<FormEntry>, limits: &MergeLimits) -> Result<MergedPdf> {
    let set = FileSet::from_entries(entries, limits)?;
    merge_file_set(&set)
}
