//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The three legal source categories, each backed by its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Statute,
    Case,
    Regulation,
}

impl Category {
    /// All categories in presentation order.
    pub const ALL: [Category; 3] = [Category::Statute, Category::Case, Category::Regulation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Statute => "statute",
            Category::Case => "case",
            Category::Regulation => "regulation",
        }
    }

    /// Name of the backing collection in the store.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Category::Statute => "statutes_collection",
            Category::Case => "cases_collection",
            Category::Regulation => "regulations_collection",
        }
    }

    /// Key used for this category in citation JSON.
    pub fn plural_key(&self) -> &'static str {
        match self {
            Category::Statute => "statutes",
            Category::Case => "cases",
            Category::Regulation => "regulations",
        }
    }

    /// Prefix used when numbering documents for the citation model.
    pub fn document_label(&self) -> &'static str {
        match self {
            Category::Statute => "Statute",
            Category::Case => "Case",
            Category::Regulation => "Regulation",
        }
    }

    /// Upper-case display name used in headings.
    pub fn heading(&self) -> &'static str {
        match self {
            Category::Statute => "STATUTE",
            Category::Case => "CASE LAW",
            Category::Regulation => "REGULATION",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "statute" | "statutes" => Ok(Category::Statute),
            "case" | "cases" | "case_law" | "case_laws" => Ok(Category::Case),
            "regulation" | "regulations" => Ok(Category::Regulation),
            other => Err(format!(
                "Unknown category '{}'. Expected one of: statute, case, regulation",
                other
            )),
        }
    }
}

/// A retrieved passage of a legal document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Passage text
    pub text: String,

    /// Originating document name (e.g. "IPC.pdf")
    pub source_name: String,

    /// Zero-based page within the source, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    pub category: Category,
}

impl Chunk {
    pub fn new(
        category: Category,
        source_name: impl Into<String>,
        page: Option<u32>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_name: source_name.into(),
            page,
            category,
        }
    }

    /// Source name with a trailing `.pdf` removed.
    pub fn label(&self) -> &str {
        self.source_name
            .strip_suffix(".pdf")
            .unwrap_or(&self.source_name)
    }

    /// One-based page for display, or "N/A".
    pub fn display_page(&self) -> String {
        display_page(self.page)
    }

    /// Identity used for de-duplication and citation checks.
    pub fn same_passage(&self, other: &Chunk) -> bool {
        self.category == other.category
            && self.source_name == other.source_name
            && self.page == other.page
            && self.text == other.text
    }
}

/// Render a stored zero-based page as a one-based display string.
pub fn display_page(page: Option<u32>) -> String {
    match page {
        Some(p) => (u64::from(p) + 1).to_string(),
        None => "N/A".to_string(),
    }
}

/// Outcome of querying one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// The store answered (possibly with zero matches)
    Searched,

    /// The backing collection was not initialized
    Unavailable,

    /// The model's invocation had no usable query argument
    Malformed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Searched => "searched",
            QueryStatus::Unavailable => "unavailable",
            QueryStatus::Malformed => "malformed",
        }
    }
}

/// Chunks gathered per category for one question, best match first.
///
/// An empty sequence means the category was not queried or returned nothing;
/// `status` records which, for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    chunks: BTreeMap<Category, Vec<Chunk>>,

    #[serde(default)]
    status: BTreeMap<Category, QueryStatus>,
}

impl RetrievalResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks for a category, in rank order.
    pub fn chunks(&self, category: Category) -> &[Chunk] {
        self.chunks
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append chunks for a category, skipping passages already present.
    pub fn extend(&mut self, category: Category, chunks: Vec<Chunk>) {
        let entry = self.chunks.entry(category).or_default();
        for chunk in chunks {
            if !entry.iter().any(|existing| existing.same_passage(&chunk)) {
                entry.push(chunk);
            }
        }
    }

    /// Record how a category query ended. A successful search is never
    /// downgraded by a later failed invocation of the same category.
    pub fn record_status(&mut self, category: Category, status: QueryStatus) {
        let current = self.status.get(&category).copied();
        if current != Some(QueryStatus::Searched) {
            self.status.insert(category, status);
        }
    }

    /// How the category was queried, or `None` if it was not.
    pub fn status(&self, category: Category) -> Option<QueryStatus> {
        self.status.get(&category).copied()
    }

    /// True if at least one category has a chunk.
    pub fn has_any(&self) -> bool {
        self.chunks.values().any(|c| !c.is_empty())
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    /// Whether a passage with this source and page was retrieved.
    pub fn contains_reference(&self, category: Category, source_name: &str, page: Option<u32>) -> bool {
        self.chunks(category)
            .iter()
            .any(|c| c.source_name == source_name && c.page == page)
    }
}

/// Per-collection statistics from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub category: Category,
    pub collection: String,
    pub chunks_count: u32,
    pub sources_count: u32,
    pub embedding_provider: String,
    pub built_at: DateTime<Utc>,
}

/// Statistics for the whole store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    /// Initialized collections; absent categories are not built
    pub collections: Vec<CollectionStats>,

    /// Database size in bytes
    pub db_size_bytes: u64,
}

/// Statistics from a learn operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnStats {
    pub category: Category,

    /// Number of files ingested
    pub sources_count: u32,

    /// Number of chunks created
    pub chunks_count: u32,

    /// Total bytes processed
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_aliases() {
        assert_eq!("statutes".parse::<Category>().unwrap(), Category::Statute);
        assert_eq!("case_laws".parse::<Category>().unwrap(), Category::Case);
        assert_eq!(" Regulation ".parse::<Category>().unwrap(), Category::Regulation);
        assert!("contract".parse::<Category>().is_err());
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Category::Statute.collection_name(), "statutes_collection");
        assert_eq!(Category::Case.collection_name(), "cases_collection");
        assert_eq!(Category::Regulation.collection_name(), "regulations_collection");
    }

    #[test]
    fn test_display_page_is_one_based() {
        assert_eq!(display_page(Some(0)), "1");
        assert_eq!(display_page(Some(41)), "42");
        assert_eq!(display_page(None), "N/A");
    }

    #[test]
    fn test_label_strips_pdf_suffix() {
        let chunk = Chunk::new(Category::Statute, "IPC.pdf", Some(0), "text");
        assert_eq!(chunk.label(), "IPC");

        let chunk = Chunk::new(Category::Case, "judgment.txt", None, "text");
        assert_eq!(chunk.label(), "judgment.txt");
    }

    #[test]
    fn test_extend_drops_duplicates() {
        let mut result = RetrievalResult::new();
        let a = Chunk::new(Category::Statute, "IPC.pdf", Some(1), "murder");
        let b = Chunk::new(Category::Statute, "IPC.pdf", Some(2), "culpable homicide");

        result.extend(Category::Statute, vec![a.clone(), b.clone()]);
        result.extend(Category::Statute, vec![b, a]);

        assert_eq!(result.chunks(Category::Statute).len(), 2);
        assert!(result.has_any());
        assert!(result.chunks(Category::Case).is_empty());
    }

    #[test]
    fn test_empty_result_has_nothing() {
        let mut result = RetrievalResult::new();
        result.extend(Category::Case, Vec::new());
        result.record_status(Category::Case, QueryStatus::Searched);

        assert!(!result.has_any());
        assert_eq!(result.status(Category::Case), Some(QueryStatus::Searched));
        assert_eq!(result.status(Category::Statute), None);
    }

    #[test]
    fn test_searched_status_is_sticky() {
        let mut result = RetrievalResult::new();
        result.record_status(Category::Statute, QueryStatus::Searched);
        result.record_status(Category::Statute, QueryStatus::Malformed);
        assert_eq!(result.status(Category::Statute), Some(QueryStatus::Searched));

        result.record_status(Category::Case, QueryStatus::Malformed);
        result.record_status(Category::Case, QueryStatus::Searched);
        assert_eq!(result.status(Category::Case), Some(QueryStatus::Searched));
    }
}
