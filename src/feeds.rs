// 🌍 Location Feeds
// Providers fetch independently (in parallel); fusion then merges them
// sequentially in priority order. Any fetch failure aborts the whole run.

use crate::catalog::Coordinate;
use crate::error::{InvaderError, Result};
use crate::fusion::{LocationFeature, LocationFeed};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// A source of placemarks
///
/// Providers only fetch and decode. Precedence is the position of the provider
/// in the list handed to `fetch_all`.
pub trait FeedProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<LocationFeed>;
}

// ============================================================================
// GEOJSON FILE PROVIDER
// ============================================================================

/// GeoJSON FeatureCollection exported from a uMap layer
pub struct GeoJsonFileFeed {
    name: String,
    path: PathBuf,
}

impl GeoJsonFileFeed {
    pub fn new(name: &str, path: &Path) -> Self {
        GeoJsonFileFeed {
            name: name.to_string(),
            path: path.to_path_buf(),
        }
    }
}

impl FeedProvider for GeoJsonFileFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<LocationFeed> {
        let content = fs::read_to_string(&self.path).map_err(|e| InvaderError::SourceFetchFailure {
            feed: self.name.clone(),
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        parse_geojson(&self.name, &content)
    }
}

// ============================================================================
// HTTP GEOJSON PROVIDER
// ============================================================================

const USER_AGENT: &str = concat!("invader-tracker/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT_SECS: u64 = 30;

/// uMap datalayer served over HTTP
pub struct HttpGeoJsonFeed {
    name: String,
    url: String,
}

impl HttpGeoJsonFeed {
    pub fn new(name: &str, url: &str) -> Self {
        HttpGeoJsonFeed {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    fn failure(&self, reason: String) -> InvaderError {
        InvaderError::SourceFetchFailure {
            feed: self.name.clone(),
            reason,
        }
    }
}

impl FeedProvider for HttpGeoJsonFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<LocationFeed> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| self.failure(e.to_string()))?;

        tracing::debug!(feed = %self.name, url = %self.url, "Downloading feed");

        let response = client
            .get(&self.url)
            .send()
            .map_err(|e| self.failure(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failure(format!("{}: HTTP {}", self.url, status.as_u16())));
        }

        let content = response
            .text()
            .map_err(|e| self.failure(format!("{}: {}", self.url, e)))?;
        parse_geojson(&self.name, &content)
    }
}

/// Read `[lon, lat]` from a point geometry
fn point_coordinate(feature: &Value) -> Option<Coordinate> {
    let coordinates = feature.get("geometry")?.get("coordinates")?.as_array()?;
    if coordinates.len() < 2 {
        return None;
    }
    let longitude = coordinates[0].as_f64()?;
    let latitude = coordinates[1].as_f64()?;
    Some(Coordinate::new(longitude, latitude))
}

/// Decode a FeatureCollection into a feed
///
/// Features keep their file order. A feature without a point geometry is
/// kept with no coordinate so fusion can report it.
pub fn parse_geojson(feed_name: &str, content: &str) -> Result<LocationFeed> {
    let fetch_failure = |reason: String| InvaderError::SourceFetchFailure {
        feed: feed_name.to_string(),
        reason,
    };

    let document: Value =
        serde_json::from_str(content).map_err(|e| fetch_failure(format!("invalid JSON: {}", e)))?;

    let features = document
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| fetch_failure("missing 'features' array".to_string()))?;

    let features = features
        .iter()
        .map(|feature| LocationFeature {
            raw_name: feature
                .get("properties")
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            coordinate: point_coordinate(feature),
        })
        .collect();

    Ok(LocationFeed::new(feed_name, features))
}

// ============================================================================
// PARALLEL FETCH
// ============================================================================

/// Fetch every provider concurrently, returning feeds in provider order
///
/// Fails with the first (highest priority) failure; no partial result.
pub fn fetch_all(providers: &[Box<dyn FeedProvider>]) -> Result<Vec<LocationFeed>> {
    let results: Vec<Result<LocationFeed>> = std::thread::scope(|scope| {
        let handles: Vec<_> = providers
            .iter()
            .map(|provider| (provider.name(), scope.spawn(move || provider.fetch())))
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(InvaderError::SourceFetchFailure {
                        feed: name.to_string(),
                        reason: "fetch thread panicked".to_string(),
                    })
                })
            })
            .collect()
    });

    let feeds = results.into_iter().collect::<Result<Vec<_>>>()?;

    for feed in &feeds {
        tracing::info!(feed = %feed.name, features = feed.features.len(), "Feed fetched");
    }

    Ok(feeds)
}

// ============================================================================
// TESTS
// ============================================================================
