//! Configuration module for grid, baseline, sensor and server setup

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::Bounds;

/// Main configuration for an emissions grid deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub intervention: InterventionConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "nyc".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default = "default_resolution")]
    pub resolution: usize,
}

fn default_resolution() -> usize {
    50
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::nyc(),
            resolution: default_resolution(),
        }
    }
}

/// Synthesis constants for the baseline layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Cells below this value receive the ambient field.
    #[serde(default = "default_ambient_threshold")]
    pub ambient_threshold: f64,
    #[serde(default = "default_base_level")]
    pub base_level: f64,
    #[serde(default = "default_global_floor")]
    pub global_floor: f64,
    /// Minimum value kept by water and park cells.
    #[serde(default = "default_water_floor")]
    pub water_floor: f64,
    #[serde(default = "default_zone_radius_cells")]
    pub zone_radius_cells: usize,
    #[serde(default)]
    pub noise: NoiseConfig,
}

fn default_ambient_threshold() -> f64 {
    1.0
}

fn default_base_level() -> f64 {
    20.0
}

fn default_global_floor() -> f64 {
    1.0
}

fn default_water_floor() -> f64 {
    2.0
}

fn default_zone_radius_cells() -> usize {
    4
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            ambient_threshold: default_ambient_threshold(),
            base_level: default_base_level(),
            global_floor: default_global_floor(),
            water_floor: default_water_floor(),
            zone_radius_cells: default_zone_radius_cells(),
            noise: NoiseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_noise_sigma")]
    pub sigma: f64,
    #[serde(default = "default_noise_seed")]
    pub seed: u64,
}

fn default_noise_sigma() -> f64 {
    5.0
}

fn default_noise_seed() -> u64 {
    42
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sigma: default_noise_sigma(),
            seed: default_noise_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionConfig {
    /// Baseline value below which a cell counts as low-emission for floor rules.
    #[serde(default = "default_floor_threshold")]
    pub floor_threshold: f64,
    #[serde(default = "default_overlay_radius_deg")]
    pub overlay_radius_deg: f64,
}

fn default_floor_threshold() -> f64 {
    20.0
}

fn default_overlay_radius_deg() -> f64 {
    0.02
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            floor_threshold: default_floor_threshold(),
            overlay_radius_deg: default_overlay_radius_deg(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// YAML file replacing the built-in reference tables.
    #[serde(default)]
    pub tables: Option<PathBuf>,
    /// GeoJSON FeatureCollection of region polygons.
    #[serde(default)]
    pub boundaries: Option<PathBuf>,
    /// Feature property holding the region name.
    #[serde(default)]
    pub name_property: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSourceKind {
    #[default]
    OpenAq,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub source: SensorSourceKind,
    #[serde(default = "default_sensor_url")]
    pub url: String,
    /// Falls back to `OPENAQ_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_parameter")]
    pub parameter: String,
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Weight of a measurement at its nearest cell, in `[0, 1)`.
    #[serde(default = "default_blend_strength")]
    pub blend_strength: f64,
    /// Unit to intensity-proxy multipliers, replacing the defaults when set.
    #[serde(default)]
    pub proxy_factors: Option<BTreeMap<String, f64>>,
}

fn default_sensor_url() -> String {
    "https://api.openaq.org/v2/latest".to_string()
}

fn default_parameter() -> String {
    "pm25".to_string()
}

fn default_radius_m() -> u32 {
    50_000
}

fn default_limit() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_blend_strength() -> f64 {
    0.3
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: SensorSourceKind::default(),
            url: default_sensor_url(),
            api_key: None,
            path: None,
            parameter: default_parameter(),
            radius_m: default_radius_m(),
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
            blend_strength: default_blend_strength(),
            proxy_factors: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from YAML file and validate it
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// The default New York City configuration
    pub fn nyc() -> Self {
        Self {
            name: default_name(),
            grid: GridConfig::default(),
            baseline: BaselineConfig::default(),
            intervention: InterventionConfig::default(),
            reference: ReferenceConfig::default(),
            sensors: SensorConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.resolution < 2 {
            return Err(ConfigError::Invalid(format!(
                "grid.resolution must be at least 2, got {}",
                self.grid.resolution
            )));
        }
        if !self.grid.bounds.is_valid() {
            return Err(ConfigError::Invalid(
                "grid.bounds must be finite with south < north and west < east".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be positive".to_string()));
        }
        let sigma = self.baseline.noise.sigma;
        if sigma.is_nan() || sigma < 0.0 {
            return Err(ConfigError::Invalid(
                "baseline.noise.sigma must be non-negative".to_string(),
            ));
        }
        let overlay_radius = self.intervention.overlay_radius_deg;
        if overlay_radius.is_nan() || overlay_radius <= 0.0 {
            return Err(ConfigError::Invalid(
                "intervention.overlay_radius_deg must be positive".to_string(),
            ));
        }
        if self.sensors.enabled {
            if self.sensors.timeout_secs == 0 {
                return Err(ConfigError::Invalid(
                    "sensors.timeout_secs must be positive".to_string(),
                ));
            }
            let strength = self.sensors.blend_strength;
            if !(0.0..1.0).contains(&strength) {
                return Err(ConfigError::Invalid(
                    "sensors.blend_strength must be in [0, 1)".to_string(),
                ));
            }
            if self.sensors.source == SensorSourceKind::File && self.sensors.path.is_none() {
                return Err(ConfigError::Invalid(
                    "sensors.path is required for the file source".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::nyc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nyc_config() {
        let config = Config::nyc();

        assert_eq!(config.name, "nyc");
        assert_eq!(config.grid.resolution, 50);
        assert_eq!(config.grid.bounds, Bounds::nyc());
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(!config.sensors.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::nyc();

        let temp = tempfile::NamedTempFile::new().unwrap();
        config.to_yaml(temp.path()).unwrap();

        let loaded = Config::from_yaml(temp.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_sparse_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("grid:\n  resolution: 20\n").unwrap();

        assert_eq!(config.grid.resolution, 20);
        assert_eq!(config.grid.bounds, Bounds::nyc());
        assert_eq!(config.baseline.base_level, 20.0);
        assert_eq!(config.intervention.floor_threshold, 20.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::nyc();
        config.grid.resolution = 1;
        assert!(config.validate().is_err());

        let mut config = Config::nyc();
        config.grid.bounds.north = config.grid.bounds.south - 0.1;
        assert!(config.validate().is_err());

        let mut config = Config::nyc();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::nyc();
        config.sensors.enabled = true;
        config.sensors.source = SensorSourceKind::File;
        assert!(config.validate().is_err());

        let mut config = Config::nyc();
        config.sensors.enabled = true;
        config.sensors.blend_strength = 1.0;
        assert!(config.validate().is_err());
        config.sensors.blend_strength = 0.3;
        assert!(config.validate().is_ok());
    }
}
