//! Ground-station measurements and their blending into a grid.
//!
//! Acquisition is best-effort: [`fetch_with_timeout`] turns every failure
//! into an empty list so the baseline can always be built.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{SensorConfig, SensorSourceKind};
use crate::error::SensorError;
use crate::grid::Grid;

/// Cells on each side of the nearest cell that a measurement reaches.
pub const BLEND_RADIUS_CELLS: usize = 2;

/// Share of the proxy taken at the nearest cell; the kernel decays from here.
pub const DEFAULT_BLEND_STRENGTH: f64 = 0.3;

/// A single station reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Linear unit-to-intensity conversion factors, keyed by normalized unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyFactors(BTreeMap<String, f64>);

impl ProxyFactors {
    pub fn new(factors: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self(
            factors
                .into_iter()
                .map(|(unit, factor)| (normalize_unit(&unit), factor))
                .collect(),
        )
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        match &config.proxy_factors {
            Some(factors) => Self::new(factors.clone()),
            None => Self::default(),
        }
    }

    pub fn factor(&self, unit: &str) -> Option<f64> {
        self.0.get(&normalize_unit(unit)).copied()
    }
}

impl Default for ProxyFactors {
    fn default() -> Self {
        Self::new([
            ("ug/m3".to_string(), 2.5),
            ("ppb".to_string(), 1.0),
            ("ppm".to_string(), 1000.0),
        ])
    }
}

/// Lowercase, drop whitespace, and fold micro and superscript variants to ASCII.
fn normalize_unit(unit: &str) -> String {
    unit.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'µ' | 'μ' => 'u',
            '³' => '3',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlendReport {
    pub blended: usize,
    pub skipped: usize,
}

/// Pull cells around each measurement toward its intensity proxy.
///
/// Measurements are applied in order, each seeing the grid as left by the previous one.
/// `strength` is clamped into `[0, 1)`, so a synthesized value is never fully replaced.
pub fn blend(
    grid: &mut Grid,
    measurements: &[Measurement],
    proxy: &ProxyFactors,
    strength: f64,
) -> BlendReport {
    let strength = if strength.is_finite() {
        strength.clamp(0.0, 0.99)
    } else {
        DEFAULT_BLEND_STRENGTH
    };
    let mut report = BlendReport::default();
    for m in measurements {
        let Some(factor) = proxy.factor(&m.unit) else {
            warn!(unit = %m.unit, location = ?m.location, "skipping measurement with unknown unit");
            report.skipped += 1;
            continue;
        };
        if !(m.lat.is_finite() && m.lon.is_finite() && m.value.is_finite()) {
            warn!(location = ?m.location, "skipping non-finite measurement");
            report.skipped += 1;
            continue;
        }
        let target = m.value * factor;
        let centre = grid.nearest(m.lat, m.lon);
        let cells: Vec<_> = grid.window(centre, BLEND_RADIUS_CELLS).collect();
        for pos in cells {
            let d = centre.distance(pos);
            let w = strength * (-(d * d) / 2.0).exp();
            if let Some(old) = grid.get(pos) {
                grid.set(pos, old * (1.0 - w) + target * w);
            }
        }
        report.blended += 1;
    }
    if report.blended > 0 || report.skipped > 0 {
        info!(blended = report.blended, skipped = report.skipped, "measurements blended");
    }
    report
}

/// OpenAQ v2 `/latest` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAqSource {
    client: reqwest::Client,
    pub url: String,
    pub api_key: Option<String>,
    pub parameter: String,
    pub centre: (f64, f64),
    pub radius_m: u32,
    pub limit: u32,
}

impl OpenAqSource {
    pub fn new(url: impl Into<String>, parameter: impl Into<String>, centre: (f64, f64)) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: None,
            parameter: parameter.into(),
            centre,
            radius_m: 50_000,
            limit: 100,
        }
    }

    async fn fetch(&self) -> Result<Vec<Measurement>, SensorError> {
        let query = [
            ("limit", self.limit.to_string()),
            ("parameter", self.parameter.clone()),
            ("coordinates", format!("{},{}", self.centre.0, self.centre.1)),
            ("radius", self.radius_m.to_string()),
        ];
        let mut request = self.client.get(&self.url).query(&query);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SensorError::Transport(format!("OpenAQ request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SensorError::Transport(format!("OpenAQ returned {status}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SensorError::Payload(format!("OpenAQ response parse failed: {e}")))?;

        parse_openaq_latest(&json, &self.parameter)
    }
}

/// Extract readings for `parameter` from an OpenAQ v2 `/latest` body.
///
/// Results without coordinates, or measurements missing a numeric value, are skipped.
pub fn parse_openaq_latest(json: &Value, parameter: &str) -> Result<Vec<Measurement>, SensorError> {
    let results = json
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SensorError::Payload("missing 'results' array".to_string()))?;

    let mut measurements = Vec::new();
    for result in results {
        let coords = result.get("coordinates");
        let lat = coords.and_then(|c| c.get("latitude")).and_then(Value::as_f64);
        let lon = coords.and_then(|c| c.get("longitude")).and_then(Value::as_f64);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            debug!("OpenAQ result without coordinates");
            continue;
        };
        let location = result
            .get("location")
            .and_then(Value::as_str)
            .map(str::to_string);
        let Some(readings) = result.get("measurements").and_then(Value::as_array) else {
            continue;
        };
        for reading in readings {
            if reading.get("parameter").and_then(Value::as_str) != Some(parameter) {
                continue;
            }
            let Some(value) = reading.get("value").and_then(Value::as_f64) else {
                continue;
            };
            let unit = reading
                .get("unit")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            measurements.push(Measurement {
                lat,
                lon,
                value,
                unit,
                location: location.clone(),
            });
        }
    }
    Ok(measurements)
}

/// Local JSON array of [`Measurement`]s.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    async fn fetch(&self) -> Result<Vec<Measurement>, SensorError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SensorError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&text).map_err(|e| SensorError::Payload(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum MeasurementSource {
    OpenAq(OpenAqSource),
    File(FileSource),
}

impl MeasurementSource {
    /// Build the configured source, or `None` when sensors are disabled.
    pub fn from_config(config: &SensorConfig, centre: (f64, f64)) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match config.source {
            SensorSourceKind::OpenAq => {
                let mut source = OpenAqSource::new(&config.url, &config.parameter, centre);
                source.api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAQ_API_KEY").ok());
                source.radius_m = config.radius_m;
                source.limit = config.limit;
                Some(Self::OpenAq(source))
            }
            SensorSourceKind::File => config.path.as_ref().map(|path| {
                Self::File(FileSource { path: path.clone() })
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAq(_) => "openaq",
            Self::File(_) => "file",
        }
    }

    pub async fn fetch(&self) -> Result<Vec<Measurement>, SensorError> {
        match self {
            Self::OpenAq(source) => source.fetch().await,
            Self::File(source) => source.fetch().await,
        }
    }
}

/// Fetch measurements, logging and swallowing every failure.
pub async fn fetch_with_timeout(source: &MeasurementSource, timeout: Duration) -> Vec<Measurement> {
    match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(Ok(measurements)) => {
            info!(source = source.name(), count = measurements.len(), "measurements fetched");
            measurements
        }
        Ok(Err(err)) => {
            warn!(source = source.name(), error = %err, "measurement fetch failed");
            Vec::new()
        }
        Err(_) => {
            warn!(source = source.name(), error = %SensorError::Timeout(timeout), "measurement fetch failed");
            Vec::new()
        }
    }
}
