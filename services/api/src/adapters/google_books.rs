//! services/api/src/adapters/google_books.rs
//!
//! This module contains the adapter for the Google Books volumes API.
//! It implements the `CatalogService` port from the `core` crate.
//!
//! Requests are bounded by a client-wide timeout. Network failures, `429` and
//! `5xx` responses are retried with exponential backoff; any other non-success
//! status fails straight away.

use async_trait::async_trait;
use bookshelf_core::catalog::{CatalogVolume, IndustryIdentifier};
use bookshelf_core::ports::{CatalogService, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// First backoff delay; doubles on each further attempt.
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Upper bound for a single backoff wait.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

/// Backoff before retrying after `attempt` (1-based) failed.
fn retry_delay(attempt: u32) -> Duration {
    let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
    INITIAL_RETRY_DELAY
        .checked_mul(factor)
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

//=========================================================================================
// Wire Format
//=========================================================================================

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<VolumeItem>,
}

#[derive(Deserialize)]
struct VolumeItem {
    id: Option<String>,
    #[serde(rename = "volumeInfo", default)]
    volume_info: serde_json::Value,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    description: Option<String>,
    published_date: Option<String>,
    page_count: Option<i32>,
    categories: Vec<String>,
    image_links: Option<ImageLinks>,
    average_rating: Option<f64>,
    ratings_count: Option<i32>,
    language: Option<String>,
    preview_link: Option<String>,
    info_link: Option<String>,
    industry_identifiers: Vec<IdentifierDto>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct IdentifierDto {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

fn to_volume(item: VolumeItem) -> PortResult<CatalogVolume> {
    let is_empty = item
        .volume_info
        .as_object()
        .map_or(true, |fields| fields.is_empty());
    if is_empty {
        return Err(PortError::Upstream(
            "Catalog returned an empty volumeInfo".to_string(),
        ));
    }

    let info: VolumeInfo = serde_json::from_value(item.volume_info.clone())
        .map_err(|e| PortError::Upstream(format!("Malformed catalog volume: {}", e)))?;
    let images = info.image_links.unwrap_or_default();

    Ok(CatalogVolume {
        volume_id: item.id,
        title: info.title,
        subtitle: info.subtitle,
        authors: info.authors,
        publisher: info.publisher,
        description: info.description,
        published_date: info.published_date,
        page_count: info.page_count,
        categories: info.categories,
        thumbnail: images.thumbnail,
        small_thumbnail: images.small_thumbnail,
        average_rating: info.average_rating,
        ratings_count: info.ratings_count,
        language: info.language,
        preview_link: info.preview_link,
        info_link: info.info_link,
        industry_identifiers: info
            .industry_identifiers
            .into_iter()
            .map(|id| IndustryIdentifier {
                kind: id.kind,
                identifier: id.identifier,
            })
            .collect(),
        raw: item.volume_info,
    })
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `CatalogService` port using Google Books.
#[derive(Clone)]
pub struct GoogleBooksAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    max_attempts: u32,
}

impl GoogleBooksAdapter {
    /// Creates a new `GoogleBooksAdapter`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            max_attempts: max_attempts.max(1),
        })
    }

    async fn fetch(&self, isbn: &str) -> PortResult<VolumesResponse> {
        let query = format!("isbn:{}", isbn);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = retry_delay(attempt);
            let last_attempt = attempt >= self.max_attempts;

            let result = self
                .client
                .get(&self.base_url)
                .query(&[("q", query.as_str()), ("key", self.api_key.as_str())])
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.json::<VolumesResponse>().await.map_err(|e| {
                        PortError::Upstream(format!("Unreadable catalog response: {}", e))
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if !retryable || last_attempt {
                        let body = response.text().await.unwrap_or_default();
                        return Err(PortError::Upstream(format!(
                            "Catalog error: {} - {}",
                            status, body
                        )));
                    }
                    warn!(
                        "Catalog returned {} for {} (attempt {}/{}), retrying in {:?}",
                        status, isbn, attempt, self.max_attempts, delay
                    );
                }
                Err(e) => {
                    if last_attempt {
                        return Err(PortError::Upstream(format!(
                            "Catalog request failed after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!(
                        "Catalog request for {} failed (attempt {}/{}): {}",
                        isbn, attempt, self.max_attempts, e
                    );
                }
            }

            sleep(delay).await;
        }
    }
}

//=========================================================================================
// `CatalogService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogService for GoogleBooksAdapter {
    async fn lookup_isbn(&self, isbn: &str) -> PortResult<Option<CatalogVolume>> {
        let response = self.fetch(isbn).await?;
        match response.items.into_iter().next() {
            Some(item) => to_volume(item).map(Some),
            None => {
                info!("Catalog has no volume for ISBN {}", isbn);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(payload: serde_json::Value) -> VolumesResponse {
        serde_json::from_value(payload).unwrap()
    }

    #[test]
    fn missing_items_means_no_match() {
        let response = parse(json!({ "kind": "books#volumes", "totalItems": 0 }));
        assert!(response.items.is_empty());
    }

    #[test]
    fn volume_info_is_mapped_and_kept_raw() {
        let response = parse(json!({
            "items": [{
                "id": "vol-1",
                "volumeInfo": {
                    "title": "Effective Java",
                    "authors": ["Joshua Bloch"],
                    "publishedDate": "2018",
                    "pageCount": 412,
                    "imageLinks": { "smallThumbnail": "http://img/s" },
                    "averageRating": 4.5,
                    "industryIdentifiers": [
                        { "type": "ISBN_13", "identifier": "9780134685991" }
                    ]
                }
            }]
        }));
        let item = response.items.into_iter().next().unwrap();
        let volume = to_volume(item).unwrap();

        assert_eq!(volume.volume_id.as_deref(), Some("vol-1"));
        assert_eq!(volume.title.as_deref(), Some("Effective Java"));
        assert_eq!(volume.page_count, Some(412));
        assert_eq!(volume.small_thumbnail.as_deref(), Some("http://img/s"));
        assert_eq!(volume.industry_identifiers[0].kind, "ISBN_13");
        assert_eq!(volume.raw["publishedDate"], "2018");
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        assert_eq!(retry_delay(1), Duration::from_millis(250));
        assert_eq!(retry_delay(2), Duration::from_millis(500));
        assert_eq!(retry_delay(3), Duration::from_secs(1));
        assert_eq!(retry_delay(6), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(40), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(u32::MAX), MAX_RETRY_DELAY);
    }

    #[test]
    fn empty_volume_info_is_an_upstream_failure() {
        let response = parse(json!({ "items": [{ "id": "vol-1", "volumeInfo": {} }] }));
        let item = response.items.into_iter().next().unwrap();
        assert!(matches!(to_volume(item), Err(PortError::Upstream(_))));

        let response = parse(json!({ "items": [{ "id": "vol-2" }] }));
        let item = response.items.into_iter().next().unwrap();
        assert!(matches!(to_volume(item), Err(PortError::Upstream(_))));
    }
}
