use thiserror::Error;

/// Unified error type for pdf-merge-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Upload validation (empty set, too many files, wrong type, too large)
/// - PDF operations (parsing, page copying, saving)
/// - Upload client operations (transport, server rejection, download delivery)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    /// The request carried no entries under the files field
    #[error("no files uploaded")]
    NoFiles,

    /// More entries than the configured maximum
    #[error("too many files: {count} (maximum {max})")]
    TooManyFiles { count: usize, max: usize },

    /// An uploaded file is not declared as `application/pdf`
    #[error("entry {index} is not a PDF (declared type: {})", content_type.as_deref().unwrap_or("none"))]
    NotPdf {
        index: usize,
        content_type: Option<String>,
    },

    /// The running byte total went over the configured maximum
    #[error("upload too large at entry {index}: {total} bytes exceeds {max}")]
    TooLarge { index: usize, total: u64, max: u64 },

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to parse an input PDF
    #[error("failed to parse PDF {index}: {reason}")]
    PdfParse { index: usize, reason: String },

    /// Failed to copy pages into the merged document
    #[error("failed to copy pages: {0}")]
    PdfAssemble(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    // ==========================================================================
    // Client Errors
    // ==========================================================================
    /// A merge is already in flight on this client
    #[error("a merge is already in progress")]
    ClientBusy,

    /// The client gate requires more selected files
    #[error("select at least {required} PDFs to merge ({selected} selected)")]
    NotEnoughFiles { selected: usize, required: usize },

    /// The HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    ClientInit(String),

    /// The request never produced a response
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status
    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    /// The merged bytes could not be delivered
    #[error("failed to save download: {0}")]
    Download(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad shape, type or count (400)
    InvalidRequest,
    /// Size budget exceeded (413)
    PayloadTooLarge,
    /// Anything unexpected during parse, assembly or serialization (500)
    MergeFailed,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoFiles | Self::TooManyFiles { .. } | Self::NotPdf { .. } => {
                ErrorKind::InvalidRequest
            }
            Self::TooLarge { .. } => ErrorKind::PayloadTooLarge,
            _ => ErrorKind::MergeFailed,
        }
    }

    /// Message safe to show to callers. Internal failures collapse to one
    /// generic string so parser and I/O details never leave the process.
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::NoFiles => "No files uploaded",
            Self::TooManyFiles { .. } => "Too many files",
            Self::NotPdf { .. } => "Only PDFs allowed",
            _ => self.kind().public_message(),
        }
    }
}

impl ErrorKind {
    /// Generic message for the class, used when no finer one applies.
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid request",
            Self::PayloadTooLarge => "Files too large",
            Self::MergeFailed => "Merge failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
