//! Static reference tables feeding baseline synthesis and region lookup.
//!
//! The built-in tables describe New York City. A YAML file with the same
//! shape can replace them; sections left out of the file fall back to the
//! built-in values.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::geometry::{NamedRect, Rect};

/// Permanent point source (airport, dense commercial core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub peak: f64,
    pub radius_km: f64,
}

/// Dense commercial or residential zone with a linear falloff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityZone {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
}

/// Representative centre point of a region for the ambient field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCentre {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitatKind {
    Water,
    Park,
}

impl HabitatKind {
    /// Share of the synthesized value a cell keeps after the override.
    pub fn retention(self) -> f64 {
        match self {
            HabitatKind::Water => 0.05,
            HabitatKind::Park => 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habitat {
    pub name: String,
    pub kind: HabitatKind,
    #[serde(flatten)]
    pub rect: Rect,
}

impl Habitat {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.rect.contains(lat, lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTables {
    #[serde(default)]
    pub regions: Vec<NamedRect>,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub zones: Vec<DensityZone>,
    #[serde(default)]
    pub centres: Vec<RegionCentre>,
    #[serde(default)]
    pub habitats: Vec<Habitat>,
}

impl ReferenceTables {
    /// Load tables from YAML, filling omitted sections from [`ReferenceTables::nyc`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference tables {}", path.display()))?;
        let mut tables: ReferenceTables = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let builtin = Self::nyc();
        if tables.regions.is_empty() {
            tables.regions = builtin.regions;
        }
        if tables.centres.is_empty() {
            tables.centres = builtin.centres;
        }
        if tables.habitats.is_empty() {
            tables.habitats = builtin.habitats;
        }
        Ok(tables)
    }

    /// Load tables if a path is configured, degrading instead of failing.
    ///
    /// An unreadable file yields the built-in tables without the hotspot
    /// layer, since no trustworthy point-source table is available.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::nyc();
        };
        match Self::load(path) {
            Ok(tables) => {
                info!(
                    path = %path.display(),
                    hotspots = tables.hotspots.len(),
                    zones = tables.zones.len(),
                    "reference tables loaded"
                );
                tables
            }
            Err(err) => {
                warn!(error = format!("{err:#}"), "reference tables unavailable, skipping hotspot layer");
                Self {
                    hotspots: Vec::new(),
                    ..Self::nyc()
                }
            }
        }
    }

    pub fn nyc() -> Self {
        Self {
            regions: vec![
                NamedRect::new("Manhattan", Rect::new(40.70, 40.80, -74.02, -73.93)),
                NamedRect::new("Brooklyn", Rect::new(40.57, 40.70, -74.05, -73.82)),
                NamedRect::new("Queens", Rect::new(40.54, 40.80, -74.05, -73.70)),
                NamedRect::new("Bronx", Rect::new(40.78, 40.92, -73.95, -73.77)),
                NamedRect::new("Staten Island", Rect::new(40.49, 40.65, -74.26, -74.05)),
            ],
            hotspots: vec![
                hotspot("JFK Airport", 40.6413, -73.7781, 120.0, 4.0),
                hotspot("LaGuardia Airport", 40.7769, -73.8740, 100.0, 3.0),
                hotspot("Midtown", 40.7580, -73.9855, 150.0, 2.5),
                hotspot("Hunts Point", 40.8200, -73.9000, 60.0, 2.0),
                hotspot("Sunset Park", 40.6500, -73.9500, 50.0, 2.0),
            ],
            zones: vec![
                zone("Times Square", 40.7580, -73.9855, 50.0),
                zone("Financial District", 40.7128, -74.0060, 46.0),
                zone("Midtown West", 40.7505, -73.9934, 44.0),
                zone("Upper East Side", 40.7831, -73.9712, 40.0),
                zone("Downtown Brooklyn", 40.6782, -73.9442, 36.0),
                zone("Park Slope", 40.6500, -73.9857, 32.0),
                zone("Bay Ridge", 40.6200, -73.9500, 28.0),
                zone("Long Island City", 40.7282, -73.7949, 30.0),
                zone("Astoria", 40.7500, -73.8500, 26.0),
                zone("Jamaica", 40.7000, -73.8000, 24.0),
                zone("South Bronx", 40.8448, -73.8648, 28.0),
                zone("Fordham", 40.8200, -73.9000, 24.0),
                zone("St. George", 40.5795, -74.1502, 20.0),
                zone("New Dorp", 40.6200, -74.1000, 18.0),
            ],
            centres: vec![
                centre("Manhattan", 40.7831, -73.9712, 1.5),
                centre("Brooklyn", 40.6782, -73.9442, 1.2),
                centre("Queens", 40.7282, -73.7949, 1.0),
                centre("Bronx", 40.8448, -73.8648, 1.1),
                centre("Staten Island", 40.5795, -74.1502, 0.7),
            ],
            habitats: vec![
                habitat("Hudson River", HabitatKind::Water, Rect::new(40.70, 40.88, -74.06, -74.02)),
                habitat("East River", HabitatKind::Water, Rect::new(40.70, 40.80, -73.98, -73.93)),
                habitat("Upper Bay", HabitatKind::Water, Rect::new(40.49, 40.62, -74.05, -74.00)),
                habitat("Central Park", HabitatKind::Park, Rect::new(40.764, 40.800, -73.982, -73.949)),
                habitat("Prospect Park", HabitatKind::Park, Rect::new(40.651, 40.673, -73.980, -73.962)),
            ],
        }
    }
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::nyc()
    }
}

fn hotspot(name: &str, lat: f64, lon: f64, peak: f64, radius_km: f64) -> Hotspot {
    Hotspot {
        name: name.to_string(),
        lat,
        lon,
        peak,
        radius_km,
    }
}

fn zone(name: &str, lat: f64, lon: f64, intensity: f64) -> DensityZone {
    DensityZone {
        name: name.to_string(),
        lat,
        lon,
        intensity,
    }
}

fn centre(name: &str, lat: f64, lon: f64, weight: f64) -> RegionCentre {
    RegionCentre {
        name: name.to_string(),
        lat,
        lon,
        weight,
    }
}

fn habitat(name: &str, kind: HabitatKind, rect: Rect) -> Habitat {
    Habitat {
        name: name.to_string(),
        kind,
        rect,
    }
}
