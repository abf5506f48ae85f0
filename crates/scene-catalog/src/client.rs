//! Async STAC client for scene discovery.
//!
//! Targets Earth Search out of the box, plus arbitrary STAC API endpoints via
//! [`StacCatalog::Custom`].

use async_trait::async_trait;
use geo::MultiPolygon;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use etl_common::{backoff_delay, DateRange};

use crate::error::{CatalogError, Result};
use crate::geojson::GeoJsonGeometry;
use crate::models::{StacItem, StacItemCollection, StacLink, StacSearchParams};
use crate::scene::Scene;

/// Source of candidate scenes for a parcel.
///
/// An empty result, including a provider "not found" answer, is a normal
/// `Ok(vec![])`. Any other provider failure is an error.
#[async_trait]
pub trait SceneCatalog: Send + Sync {
    async fn search(
        &self,
        geometry: &MultiPolygon<f64>,
        range: &DateRange,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Scene>>;
}

// ---------------------------------------------------------------------------
// Catalog enum
// ---------------------------------------------------------------------------

/// Well-known STAC catalogs plus custom endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum StacCatalog {
    /// AWS Earth Search (Element 84).
    EarthSearch,
    /// Any STAC API endpoint (root URL or full `/search` URL).
    Custom(String),
}

impl StacCatalog {
    /// Return the full POST `/search` URL for this catalog.
    pub fn search_url(&self) -> String {
        match self {
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".to_string(),
            Self::Custom(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with("/search") {
                    base.to_string()
                } else {
                    format!("{}/search", base)
                }
            }
        }
    }

    /// Parse a shorthand string into a catalog. Anything other than
    /// `"es"`/`"earth-search"` is treated as a URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            _ => Self::Custom(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`StacCatalogClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Initial backoff, doubled on every retry (default 500 ms).
    pub initial_backoff: Duration,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// STAC Item Search client with pagination and retries.
pub struct StacCatalogClient {
    catalog: StacCatalog,
    client: reqwest::Client,
    options: StacClientOptions,
}

impl StacCatalogClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            catalog,
            client,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    /// Search with automatic pagination, collecting up to `limit` raw items.
    pub async fn search_items(&self, params: &StacSearchParams, limit: usize) -> Result<Vec<StacItem>> {
        let body = serde_json::to_value(params)
            .map_err(|e| CatalogError::Parse(format!("serializing search params: {e}")))?;

        let mut page = match self.post_page(&self.catalog.search_url(), &body).await? {
            Some(page) => page,
            None => return Ok(Vec::new()),
        };

        let mut items: Vec<StacItem> = Vec::new();
        let mut pages = 1usize;
        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);

            if items.len() >= limit {
                break;
            }

            match next {
                Some(link) => match self.follow_next(&link, &body).await? {
                    Some(next_page) if !next_page.is_empty() => {
                        page = next_page;
                        pages += 1;
                    }
                    _ => break,
                },
                None => break,
            }
        }

        items.truncate(limit);
        debug!(items = items.len(), pages = pages, "STAC search complete");
        Ok(items)
    }

    /// POST a search body. `Ok(None)` means the provider reported not-found.
    async fn post_page(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Option<StacItemCollection>> {
        let text = self
            .send_with_retry(|| {
                self.client
                    .post(url)
                    .header("Content-Type", "application/json")
                    .json(body)
            })
            .await?;
        text.map(|t| parse_collection(&t)).transpose()
    }

    /// Follow a pagination link. Handles both POST (body/merge) and GET links.
    async fn follow_next(
        &self,
        link: &StacLink,
        original: &serde_json::Value,
    ) -> Result<Option<StacItemCollection>> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();

        if method == "POST" {
            let body = match (&link.body, link.merge.unwrap_or(false)) {
                (Some(link_body), true) => {
                    let mut merged = original.clone();
                    if let (Some(base), Some(overlay)) = (merged.as_object_mut(), link_body.as_object()) {
                        for (k, v) in overlay {
                            base.insert(k.clone(), v.clone());
                        }
                    }
                    merged
                }
                (Some(link_body), false) => link_body.clone(),
                (None, _) => original.clone(),
            };
            self.post_page(&link.href, &body).await
        } else {
            let text = self
                .send_with_retry(|| self.client.get(&link.href))
                .await?;
            text.map(|t| parse_collection(&t)).transpose()
        }
    }

    /// Send a request with exponential backoff on transient failures
    /// (timeouts, connection errors, 5xx, 429). Returns `Ok(None)` on 404.
    async fn send_with_retry<F>(&self, build: F) -> Result<Option<String>>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.options.initial_backoff, attempt);
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(resp) if resp.status().is_success() => return Ok(Some(resp.text().await?)),
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let err = CatalogError::Status {
                        status: status.as_u16(),
                        body: body.chars().take(500).collect(),
                    };
                    // Don't retry client errors other than throttling
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(err);
                    }
                    warn!(status = status.as_u16(), attempt = attempt, "STAC request failed, retrying");
                    last_err = Some(err);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(error = %e, attempt = attempt, "STAC request failed, retrying");
                    last_err = Some(CatalogError::Http(e));
                }
                Err(e) => return Err(CatalogError::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| CatalogError::Parse("STAC search failed".into())))
    }
}

#[async_trait]
impl SceneCatalog for StacCatalogClient {
    #[instrument(skip(self, geometry, range), fields(catalog = ?self.catalog, range = %range))]
    async fn search(
        &self,
        geometry: &MultiPolygon<f64>,
        range: &DateRange,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<Scene>> {
        let params = StacSearchParams::new()
            .intersects(GeoJsonGeometry::from_multi_polygon(geometry).to_value()?)
            .datetime(&range.to_stac_interval())
            .collections(&[collection])
            .limit(limit.min(u32::MAX as usize) as u32);

        let items = self.search_items(&params, limit).await?;
        let scenes = items_to_scenes(&items);

        info!(items = items.len(), scenes = scenes.len(), "Found candidate scenes");
        Ok(scenes)
    }
}

/// Convert items to scenes, skipping items that lack the fields selection
/// depends on.
pub fn items_to_scenes(items: &[StacItem]) -> Vec<Scene> {
    items
        .iter()
        .filter_map(|item| match Scene::try_from(item) {
            Ok(scene) => Some(scene),
            Err(e) => {
                warn!(item = %item.id, error = %e, "Skipping unusable catalog item");
                None
            }
        })
        .collect()
}

fn parse_collection(body: &str) -> Result<StacItemCollection> {
    serde_json::from_str(body).map_err(|e| CatalogError::Parse(format!("parsing STAC response: {e}")))
}
