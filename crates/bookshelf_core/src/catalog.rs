//! crates/bookshelf_core/src/catalog.rs
//!
//! The bibliographic record returned by the external catalog and its mapping
//! onto a `BookDraft`.

use crate::domain::BookDraft;
use crate::isbn::normalize_isbn_list;

pub const CATALOG_SOURCE: &str = "googlebooks";
const UNTITLED: &str = "Untitled";
const UNKNOWN_AUTHOR: &str = "Unknown author";
const UNKNOWN_PUBLISHER: &str = "Unknown publisher";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndustryIdentifier {
    /// `ISBN_10`, `ISBN_13`, `OTHER`, ...
    pub kind: String,
    pub identifier: String,
}

/// One volume as described by the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogVolume {
    pub volume_id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i32>,
    pub categories: Vec<String>,
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i32>,
    pub language: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    pub industry_identifiers: Vec<IndustryIdentifier>,
    /// The untouched `volumeInfo` object.
    pub raw: serde_json::Value,
}

impl CatalogVolume {
    fn identifier_of(&self, kind: &str) -> Option<&str> {
        self.industry_identifiers
            .iter()
            .find(|id| id.kind == kind)
            .map(|id| id.identifier.as_str())
    }

    /// ISBN-10, ISBN-13 and the ISBN the caller asked for, normalized and
    /// deduplicated.
    pub fn isbns(&self, requested: &str) -> Vec<String> {
        let candidates = [
            self.identifier_of("ISBN_10"),
            self.identifier_of("ISBN_13"),
            Some(requested),
        ];
        normalize_isbn_list(candidates.into_iter().flatten())
    }

    /// Builds a book draft. `pages` overrides the catalog page count.
    pub fn to_draft(&self, requested_isbn: &str, pages: Option<i32>) -> BookDraft {
        let author = if self.authors.is_empty() {
            UNKNOWN_AUTHOR.to_string()
        } else {
            self.authors.join(", ")
        };

        BookDraft {
            title: self.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
            subtitle: self.subtitle.clone(),
            author,
            publisher: self
                .publisher
                .clone()
                .unwrap_or_else(|| UNKNOWN_PUBLISHER.to_string()),
            overview: self.description.clone(),
            release_year: self
                .published_date
                .as_deref()
                .and_then(extract_year)
                .unwrap_or(0),
            pages: pages.or(self.page_count).unwrap_or(0),
            cover_url: self
                .thumbnail
                .clone()
                .or_else(|| self.small_thumbnail.clone()),
            genres: self.categories.clone(),
            isbns: self.isbns(requested_isbn),
            rate: self.average_rating,
            ratings_count: self.ratings_count,
            language: self.language.clone(),
            published_date: self.published_date.clone(),
            google_volume_id: self.volume_id.clone(),
            preview_link: self.preview_link.clone(),
            info_link: self.info_link.clone(),
            raw: Some(self.raw.clone()),
            source: Some(CATALOG_SOURCE.to_string()),
        }
    }
}

/// Year from a catalog date such as `2018-01-06`, `2018-01` or `2018`.
pub fn extract_year(published_date: &str) -> Option<i32> {
    published_date.get(..4)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> CatalogVolume {
        CatalogVolume {
            volume_id: Some("zyTCAlFPjgYC".to_string()),
            title: Some("Effective Java".to_string()),
            authors: vec!["Joshua Bloch".to_string()],
            publisher: Some("Addison-Wesley".to_string()),
            published_date: Some("2018-01-06".to_string()),
            page_count: Some(412),
            categories: vec!["Computers".to_string()],
            small_thumbnail: Some("http://img/small".to_string()),
            average_rating: Some(4.5),
            industry_identifiers: vec![
                IndustryIdentifier {
                    kind: "ISBN_13".to_string(),
                    identifier: "9780134685991".to_string(),
                },
                IndustryIdentifier {
                    kind: "ISBN_10".to_string(),
                    identifier: "0134685997".to_string(),
                },
            ],
            raw: serde_json::json!({ "title": "Effective Java" }),
            ..Default::default()
        }
    }

    #[test]
    fn isbns_merge_catalog_and_requested_values() {
        let isbns = volume().isbns("978-0-13-468599-1");
        assert_eq!(isbns, vec!["0134685997", "9780134685991"]);

        let isbns = volume().isbns("123456789X");
        assert_eq!(isbns, vec!["0134685997", "9780134685991", "123456789X"]);
    }

    #[test]
    fn draft_uses_catalog_values_and_caller_pages() {
        let draft = volume().to_draft("9780134685991", Some(420));
        assert_eq!(draft.title, "Effective Java");
        assert_eq!(draft.author, "Joshua Bloch");
        assert_eq!(draft.release_year, 2018);
        assert_eq!(draft.pages, 420);
        assert_eq!(draft.cover_url.as_deref(), Some("http://img/small"));
        assert_eq!(draft.rate, Some(4.5));
        assert_eq!(draft.source.as_deref(), Some(CATALOG_SOURCE));

        let preview = volume().to_draft("9780134685991", None);
        assert_eq!(preview.pages, 412);
    }

    #[test]
    fn draft_fills_defaults_for_sparse_records() {
        let sparse = CatalogVolume {
            authors: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        let draft = sparse.to_draft("111", None);
        assert_eq!(draft.title, "Untitled");
        assert_eq!(draft.author, "A, B");
        assert_eq!(draft.publisher, "Unknown publisher");
        assert_eq!(draft.release_year, 0);
        assert_eq!(draft.pages, 0);
        assert_eq!(draft.isbns, vec!["111"]);
    }

    #[test]
    fn year_is_read_from_the_leading_digits() {
        assert_eq!(extract_year("2018-01-06"), Some(2018));
        assert_eq!(extract_year("1999"), Some(1999));
        assert_eq!(extract_year("19"), None);
        assert_eq!(extract_year("n.d."), None);
    }
}
