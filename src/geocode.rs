// 🌍 Geocoding
//
// Postcode → point, in three layers:
// - Geocoder: the external service (postcodes.io over HTTP in production)
// - lookup_point(): stored point first, then the service, never an error
// - GeocodeResolver: lookup_point() memoised per postcode for one run

use crate::db::Store;
use crate::entities::Point;
use crate::error::Result;
use crate::memo::Memo;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_GEOCODER_URL: &str = "https://api.postcodes.io";

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Postcode not found: {0}")]
    PostcodeNotFound(String),

    #[error("Geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geocoder returned HTTP {0}")]
    Status(u16),

    #[error("Invalid geocoder URL {0}")]
    InvalidUrl(String),
}

/// External postcode geocoding service
pub trait Geocoder {
    /// Resolve a postcode, telling "no such postcode" apart from service trouble
    fn geocode(&self, postcode: &str) -> std::result::Result<Point, GeocodeError>;
}

// ============================================================================
// POSTCODES.IO
// ============================================================================

#[derive(Debug, Deserialize)]
struct PostcodeResponse {
    result: Option<PostcodeResult>,
}

#[derive(Debug, Deserialize)]
struct PostcodeResult {
    longitude: Option<f64>,
    latitude: Option<f64>,
}

/// Blocking client for the postcodes.io lookup endpoint
pub struct PostcodesIo {
    client: Client,
    base_url: Url,
}

impl PostcodesIo {
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, GeocodeError> {
        let base_url = Url::parse(base_url).map_err(|_| GeocodeError::InvalidUrl(base_url.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(PostcodesIo { client, base_url })
    }

    fn lookup_url(&self, postcode: &str) -> std::result::Result<Url, GeocodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeocodeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("postcodes")
            .push(postcode);
        Ok(url)
    }
}

impl Geocoder for PostcodesIo {
    fn geocode(&self, postcode: &str) -> std::result::Result<Point, GeocodeError> {
        let url = self.lookup_url(postcode)?;
        debug!(%url, "geocoding postcode");

        let response = self.client.get(url).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(GeocodeError::PostcodeNotFound(postcode.to_string())),
            status if !status.is_success() => return Err(GeocodeError::Status(status.as_u16())),
            _ => {}
        }

        let body: PostcodeResponse = response.json()?;
        // Terminated or non-geographic postcodes come back without coordinates
        match body.result {
            Some(PostcodeResult {
                longitude: Some(longitude),
                latitude: Some(latitude),
            }) => Ok(Point::new(longitude, latitude)),
            _ => Err(GeocodeError::PostcodeNotFound(postcode.to_string())),
        }
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Point for a postcode: an already-stored one if any, else the geocoder's.
/// Every failure is logged and becomes None.
pub fn lookup_point(store: &Store, geocoder: &dyn Geocoder, postcode: &str) -> Option<Point> {
    match store.find_point_by_postcode(postcode) {
        Ok(Some(point)) => return Some(point),
        Ok(None) => {}
        Err(e) => warn!("Failed reading stored point for {}: {}", postcode, e),
    }

    match geocoder.geocode(postcode) {
        Ok(point) => Some(point),
        Err(GeocodeError::PostcodeNotFound(_)) => {
            warn!("Failed geocoding postcode: {}", postcode);
            None
        }
        Err(e) => {
            warn!("Error connecting to geocoder: {}", e);
            None
        }
    }
}

/// Per-run postcode cache in front of lookup_point()
///
/// Misses are cached as well: a postcode that failed once is not retried
/// until the cache is cleared.
#[derive(Debug, Default)]
pub struct GeocodeResolver {
    cache: Memo<String, Option<Point>>,
}

impl GeocodeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, store: &Store, geocoder: &dyn Geocoder, postcode: &str) -> Option<Point> {
        self.cache
            .resolve(postcode.to_string(), |pc| lookup_point(store, geocoder, pc))
    }

    /// Seed the cache with every postcode that already has a stored point
    pub fn prime(&mut self, store: &Store) -> Result<usize> {
        let located = store.located_postcodes()?;
        let count = located.len();
        for (postcode, point) in located {
            self.cache.prime(postcode, Some(point));
        }
        Ok(count)
    }

    pub fn is_cached(&self, postcode: &str) -> bool {
        self.cache.contains(&postcode.to_string())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
