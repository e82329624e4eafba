use chrono::NaiveDate;

/// Canonical key for one archived article record.
pub type ArticleId = u64;

/// Pointer into a packaged container: which archive file holds the content,
/// and which member inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRef {
    pub archive: String,
    pub member: String,
}

/// One row of the metadata index. Loaded once at startup, immutable for the
/// lifetime of a session. Every record carries at least one of `pdf` / `txt`;
/// rows with neither are dropped by the loader.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub pub_date: NaiveDate,
    pub start_page: u32,
    /// Semicolon-joined composite category string, e.g. `"feature;article"`.
    pub object_types: String,
    pub pdf: Option<ArchiveRef>,
    pub txt: Option<ArchiveRef>,
    /// Set when the source marked the record as having no usable text.
    pub no_text: bool,
}

impl ArticleRecord {
    pub fn object_type_list(&self) -> impl Iterator<Item = &str> {
        self.object_types
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
    }
}

pub mod error;
pub mod extract;
pub mod index;
pub mod punctuate;
pub mod resolve;
pub mod results;
pub mod session;
pub mod viewer;
