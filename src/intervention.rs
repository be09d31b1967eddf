//! Structured intervention: what a policy does to the grid.
//!
//! Incoming JSON is deserialized into loose `Raw*` shapes first and then
//! validated into [`Intervention`], so a bad payload is rejected before any
//! grid work starts and the error can name the offending modification.

use serde::{Deserialize, Serialize};

use crate::error::InterventionError;

/// Largest accepted increase, in percent. Cuts are unbounded; rules floor them.
pub const MAX_CHANGE_PERCENT: f64 = 1000.0;

/// One geographic change, with `change_percent` in percent (`-20.0` is a 20% cut).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeographicModification {
    Hotspot {
        lat: f64,
        lon: f64,
        radius_km: f64,
        change_percent: f64,
    },
    Region {
        area: String,
        change_percent: f64,
    },
    Floor {
        change_percent: f64,
    },
}

impl GeographicModification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hotspot { .. } => "hotspot",
            Self::Region { .. } => "region",
            Self::Floor { .. } => "floor",
        }
    }

    /// Change as a fraction (`-0.2` for a 20% cut).
    pub fn change_fraction(&self) -> f64 {
        let percent = match self {
            Self::Hotspot { change_percent, .. }
            | Self::Region { change_percent, .. }
            | Self::Floor { change_percent } => *change_percent,
        };
        percent / 100.0
    }
}

/// Fine-grained spatial weight; `weight` is clamped to `[0, 1]` when applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayPoint {
    pub lat: f64,
    pub lon: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Intervention {
    #[serde(rename = "geographic_modifications")]
    pub modifications: Vec<GeographicModification>,
    pub spatial_pattern: Vec<OverlayPoint>,
    pub is_unrelated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Intervention {
    pub fn new(modifications: Vec<GeographicModification>) -> Self {
        Self {
            modifications,
            ..Self::default()
        }
    }

    /// An intervention with no spatial effect.
    pub fn unrelated() -> Self {
        Self {
            is_unrelated: true,
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: Vec<OverlayPoint>) -> Self {
        self.spatial_pattern = pattern;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, InterventionError> {
        let raw: RawIntervention =
            serde_json::from_str(text).map_err(|e| InterventionError::Malformed(e.to_string()))?;
        raw.try_into()
    }
}

/// Wire shape of an intervention before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIntervention {
    #[serde(default, alias = "modifications")]
    pub geographic_modifications: Vec<RawModification>,
    #[serde(default)]
    pub spatial_pattern: Option<Vec<RawPatternPoint>>,
    #[serde(default)]
    pub is_unrelated: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub area: Option<String>,
    #[serde(alias = "percent_change")]
    pub change_percent: Option<f64>,
}

/// Overlay points arrive either as `[lat, lon, weight]` or as objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPatternPoint {
    Tuple(f64, f64, f64),
    Object {
        lat: f64,
        lon: f64,
        #[serde(alias = "intensity")]
        weight: f64,
    },
}

impl From<RawPatternPoint> for OverlayPoint {
    fn from(raw: RawPatternPoint) -> Self {
        match raw {
            RawPatternPoint::Tuple(lat, lon, weight) | RawPatternPoint::Object { lat, lon, weight } => {
                OverlayPoint { lat, lon, weight }
            }
        }
    }
}

impl RawModification {
    fn validate(self, index: usize) -> Result<GeographicModification, InterventionError> {
        let kind = self
            .kind
            .ok_or(InterventionError::MissingKind { index })?;
        let missing = |kind: &'static str, field: &'static str| InterventionError::MissingField {
            index,
            kind,
            field,
        };
        let finite = |kind: &'static str, field: &'static str, value: f64| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(InterventionError::OutOfRange {
                    index,
                    kind,
                    field,
                    value,
                })
            }
        };
        let percent = |kind: &'static str, value: Option<f64>| -> Result<f64, InterventionError> {
            let value = value.ok_or_else(|| missing(kind, "change_percent"))?;
            let value = finite(kind, "change_percent", value)?;
            if value > MAX_CHANGE_PERCENT {
                return Err(InterventionError::OutOfRange {
                    index,
                    kind,
                    field: "change_percent",
                    value,
                });
            }
            Ok(value)
        };
        match kind.trim().to_ascii_lowercase().as_str() {
            "hotspot" => Ok(GeographicModification::Hotspot {
                lat: finite("hotspot", "lat", self.lat.ok_or_else(|| missing("hotspot", "lat"))?)?,
                lon: finite("hotspot", "lon", self.lon.ok_or_else(|| missing("hotspot", "lon"))?)?,
                radius_km: finite(
                    "hotspot",
                    "radius_km",
                    self.radius_km.ok_or_else(|| missing("hotspot", "radius_km"))?,
                )?,
                change_percent: percent("hotspot", self.change_percent)?,
            }),
            "region" => Ok(GeographicModification::Region {
                area: self.area.ok_or_else(|| missing("region", "area"))?,
                change_percent: percent("region", self.change_percent)?,
            }),
            "floor" => Ok(GeographicModification::Floor {
                change_percent: percent("floor", self.change_percent)?,
            }),
            _ => Err(InterventionError::UnknownKind { index, kind }),
        }
    }
}

impl TryFrom<RawIntervention> for Intervention {
    type Error = InterventionError;

    fn try_from(raw: RawIntervention) -> Result<Self, Self::Error> {
        let description = raw.description;
        if raw.is_unrelated.unwrap_or(false) {
            return Ok(Self {
                description,
                ..Self::unrelated()
            });
        }
        let modifications = raw
            .geographic_modifications
            .into_iter()
            .enumerate()
            .map(|(index, m)| m.validate(index))
            .collect::<Result<Vec<_>, _>>()?;
        let spatial_pattern = raw
            .spatial_pattern
            .unwrap_or_default()
            .into_iter()
            .map(OverlayPoint::from)
            .collect();
        Ok(Self {
            modifications,
            spatial_pattern,
            is_unrelated: false,
            description,
        })
    }
}
