//! Page concatenation.
//!
//! Each source document is renumbered past the objects already collected,
//! its pages are re-parented under one fresh page tree, and everything except
//! the source catalog, page-tree nodes, outlines and stream indexes is carried
//! over.

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::PdfDocument;
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Bound on parent-chain walks, guards against cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// The output document being assembled.
pub struct MergedDocument {
    document: Document,
    /// Copied page ids in output order
    pages: Vec<ObjectId>,
    /// First object id free for the next source
    next_id: u32,
}

impl Default for MergedDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MergedDocument {
    pub fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            pages: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of pages appended so far
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Copy every page of `source`, in page order, to the end of the output.
    ///
    /// Returns the number of pages appended.
    pub fn append(&mut self, source: PdfDocument) -> Result<usize> {
        let mut doc = source.into_document();

        doc.renumber_objects_with(self.next_id);
        self.next_id = doc
            .max_id
            .checked_add(1)
            .ok_or_else(|| Error::PdfAssemble("object id space exhausted".to_string()))?;

        // Page ids change on renumbering, so collect them afterwards.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

        for &page_id in &page_ids {
            let inherited = inherited_attributes(&doc, page_id);
            if inherited.is_empty() {
                continue;
            }
            let page = doc
                .get_dictionary_mut(page_id)
                .map_err(|e| Error::PdfAssemble(format!("page {page_id:?}: {e}")))?;
            for (key, value) in inherited {
                page.set(key, value);
            }
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                // Object and xref streams describe the source layout and
                // are stale once renumbered.
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline" | b"ObjStm" | b"XRef" => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                }
            }
        }

        let appended = page_ids.len();
        self.pages.extend(page_ids);
        debug!("Appended {} pages ({} total)", appended, self.pages.len());

        Ok(appended)
    }

    /// Build the page tree and catalog, then serialize.
    pub fn save(mut self) -> Result<Vec<u8>> {
        let pages_id = (self.next_id, 0);
        let catalog_id = (self.next_id + 1, 0);

        for &page_id in &self.pages {
            let page = self
                .document
                .get_dictionary_mut(page_id)
                .map_err(|e| Error::PdfAssemble(format!("page {page_id:?}: {e}")))?;
            page.set("Parent", Object::Reference(pages_id));
        }

        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::Reference(id)).collect();
        let count = i64::try_from(self.pages.len())
            .map_err(|_| Error::PdfAssemble("too many pages".to_string()))?;

        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ]);
        self.document
            .objects
            .insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        self.document
            .objects
            .insert(catalog_id, Object::Dictionary(catalog_dict));

        self.document.trailer.set("Root", Object::Reference(catalog_id));
        self.document.max_id = catalog_id.0;

        self.document.compress();

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save merged PDF: {e}")))?;

        Ok(output)
    }
}

/// Collect inheritable attributes the page lacks from its nearest ancestors.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    let mut missing: Vec<&'static [u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        if missing.is_empty() {
            break;
        }
        let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    found
}
