use lopdf::{Document, Object};
use tracing::warn;

use crate::error::{Error, Result};

/// One parsed input document, ready to have its pages copied.
pub struct PdfDocument {
    inner: Document,
    page_count: usize,
    /// Whether the input declared encryption
    encryption_ignored: bool,
}

impl PdfDocument {
    /// Parse a PDF from bytes.
    ///
    /// Encryption is ignored rather than enforced. lopdf decrypts inputs with
    /// an empty user password while loading; whatever `Encrypt` entry is left
    /// afterwards is removed from the trailer and the structure is read as-is.
    /// `index` is the position of the input in its file set and is only used
    /// for error reporting.
    pub fn from_bytes(bytes: &[u8], index: usize) -> Result<Self> {
        let inner = Document::load_mem(bytes).map_err(|e| Error::PdfParse {
            index,
            reason: e.to_string(),
        })?;

        let mut doc = Self::from_document(inner, index);
        // Decryption during load already dropped the trailer entry.
        if !doc.encryption_ignored && declares_encryption(bytes) {
            warn!("Input {} was encrypted; ignoring it", index);
            doc.encryption_ignored = true;
        }
        Ok(doc)
    }

    /// Wrap an already loaded document.
    pub(crate) fn from_document(mut inner: Document, index: usize) -> Self {
        let encryption_ignored = strip_encryption(&mut inner);
        if encryption_ignored {
            warn!("Input {} has an encryption dictionary; ignoring it", index);
        }

        Self {
            page_count: inner.get_pages().len(),
            inner,
            encryption_ignored,
        }
    }

    /// Number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Whether the input declared encryption that was dropped.
    pub const fn encryption_ignored(&self) -> bool {
        self.encryption_ignored
    }

    pub(crate) fn into_document(self) -> Document {
        self.inner
    }
}

/// Drop the trailer's `Encrypt` entry and the dictionary it points to.
///
/// Returns true if the document carried one.
fn strip_encryption(doc: &mut Document) -> bool {
    match doc.trailer.remove(b"Encrypt") {
        Some(Object::Reference(id)) => {
            doc.objects.remove(&id);
            true
        }
        Some(_) => true,
        None => false,
    }
}

/// Whether the raw file names an `/Encrypt` entry.
///
/// Trailer and cross-reference stream dictionaries are never compressed, so
/// the key is visible in the bytes whichever form the file uses.
fn declares_encryption(bytes: &[u8]) -> bool {
    const KEY: &[u8] = b"/Encrypt";
    bytes.windows(KEY.len()).any(|window| window == KEY)
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("version", &self.inner.version)
            .field("encryption_ignored", &self.encryption_ignored)
            .finish()
    }
}
