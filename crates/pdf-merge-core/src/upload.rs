//! Uploaded files and the validated file set.
//!
//! Multipart parts arrive as [`FormEntry`] values. Only [`FormEntry::File`]
//! entries take part in a merge; plain text fields are counted by the entry
//! limit but otherwise skipped.

use bytes::Bytes;

use crate::config::{MergeLimits, PDF_MIME};
use crate::error::{Error, Result};
use crate::util::mime_matches;

/// One uploaded file, owned for the duration of a request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename, if the client sent one
    pub filename: Option<String>,
    /// Declared MIME type of the part
    pub content_type: Option<String>,
    /// Buffered content; shorter than `size` when the part was only counted
    pub bytes: Bytes,
    size: u64,
}

impl UploadedFile {
    pub fn new(
        filename: Option<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            filename,
            content_type,
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// A part read from a stream, of which only a prefix was kept.
    ///
    /// Used once a request is already over its size budget: the part still
    /// counts towards validation with its real `size`, but its content is
    /// never merged.
    pub fn streamed(
        filename: Option<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
        size: u64,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            filename,
            content_type,
            size: size.max(bytes.len() as u64),
            bytes,
        }
    }

    /// Convenience constructor for a file declared as `application/pdf`.
    pub fn pdf(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::new(Some(filename.into()), Some(PDF_MIME.to_string()), bytes)
    }

    pub fn is_pdf(&self) -> bool {
        mime_matches(self.content_type.as_deref(), PDF_MIME)
    }

    /// Size of the part as received.
    pub const fn len(&self) -> u64 {
        self.size
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the whole part is held in memory.
    pub fn is_complete(&self) -> bool {
        self.bytes.len() as u64 == self.size
    }

    /// Name used in logs.
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or("<unnamed>")
    }
}

/// A multipart entry under the files field.
#[derive(Debug, Clone)]
pub enum FormEntry {
    /// Plain text field (no filename)
    Field { value: String },
    /// File part
    File(UploadedFile),
}

impl FormEntry {
    pub const fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Field { .. } => None,
        }
    }
}

/// Ordered, validated set of files accepted for one merge.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<UploadedFile>,
    total_bytes: u64,
}

impl FileSet {
    /// Validate raw entries in order, stopping at the first failure:
    /// empty set, entry count, per-file MIME type, then the running size total.
    ///
    /// The size check runs after each accepted file, so the file that first
    /// pushes the total over the limit is the one reported.
    pub fn from_entries(entries: Vec<FormEntry>, limits: &MergeLimits) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::NoFiles);
        }

        if entries.len() > limits.max_files {
            return Err(Error::TooManyFiles {
                count: entries.len(),
                max: limits.max_files,
            });
        }

        let mut set = Self::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let FormEntry::File(file) = entry else {
                continue;
            };

            if !file.is_pdf() {
                return Err(Error::NotPdf {
                    index,
                    content_type: file.content_type,
                });
            }

            set.total_bytes = set.total_bytes.saturating_add(file.len());
            if set.total_bytes > limits.max_total_bytes {
                return Err(Error::TooLarge {
                    index,
                    total: set.total_bytes,
                    max: limits.max_total_bytes,
                });
            }

            set.files.push(file);
        }

        Ok(set)
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub const fn len(&self) -> usize {
        self.files.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
