mod document;
mod merge;

pub use document::PdfDocument;
pub use merge::MergedDocument;
