use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Best-effort address resolution. A failed or empty lookup is `None`;
/// callers persist null coordinates and move on, with no retry or backoff.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<GeoPoint>;
}

/// Yandex-format geocoder over a single outbound GET per call.
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEOCODER_API_KEY").ok()?;
        let base_url = std::env::var("GEOCODER_URL")
            .unwrap_or_else(|_| "https://geocode-maps.yandex.ru/1.x".to_string());
        Some(Self::new(base_url, api_key))
    }

    async fn lookup(&self, address: &str) -> Result<Option<GeoPoint>, reqwest::Error> {
        let url = format!(
            "{}/?apikey={}&format=json&results=1&geocode={}",
            self.base_url,
            self.api_key,
            urlencoding::encode(address)
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<GeocoderResponse>()
            .await?;
        Ok(resp.point())
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Option<GeoPoint> {
        match self.lookup(address).await {
            Ok(point) => point,
            Err(e) => {
                warn!("geocoding failed for '{address}': {e}");
                None
            }
        }
    }
}

/// Used when no geocoder is configured and in tests.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn geocode(&self, _address: &str) -> Option<GeoPoint> {
        None
    }
}

pub fn build_geocoder() -> Arc<dyn Geocoder> {
    match HttpGeocoder::from_env() {
        Some(g) => Arc::new(g),
        None => {
            warn!("GEOCODER_API_KEY not set; new ads will have no coordinates");
            Arc::new(NoopGeocoder)
        }
    }
}

// ---- wire format ------------------------------------------------------

#[derive(Deserialize)]
struct GeocoderResponse {
    response: GeocoderBody,
}

#[derive(Deserialize)]
struct GeocoderBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Deserialize)]
struct Point {
    // "longitude latitude", space separated
    pos: String,
}

impl GeocoderResponse {
    fn point(&self) -> Option<GeoPoint> {
        let pos = &self.response.collection.members.first()?.geo_object.point.pos;
        let mut parts = pos.split_whitespace();
        let longitude = parts.next()?.parse::<f64>().ok()?;
        let latitude = parts.next()?.parse::<f64>().ok()?;
        Some(GeoPoint { latitude, longitude })
    }
}
