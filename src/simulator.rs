//! Wiring of reference data, baseline cache and intervention engine from a [`Config`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::{
    baseline::BaselineSynthesizer,
    cache::{Baseline, BaselineCache, Clock, SystemClock},
    config::Config,
    engine::{ChangeTotals, InterventionEngine},
    geometry::RegionSet,
    intervention::Intervention,
    reference::ReferenceTables,
    sensor::{Measurement, MeasurementSource, ProxyFactors},
    snapshot::GridSnapshot,
};

/// Result of applying one intervention to the current baseline.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub snapshot: GridSnapshot,
    pub totals: ChangeTotals,
    pub intervention: Intervention,
}

pub struct Simulator {
    config: Config,
    regions: Arc<RegionSet>,
    cache: BaselineCache,
    engine: InterventionEngine,
}

impl Simulator {
    pub fn from_config(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let tables = ReferenceTables::load_or_builtin(config.reference.tables.as_deref());
        let regions = Arc::new(RegionSet::load(
            config.reference.boundaries.as_deref(),
            &tables.regions,
            config.reference.name_property.as_deref(),
        ));

        let bounds = config.grid.bounds;
        let synthesizer = BaselineSynthesizer::new(
            bounds,
            config.grid.resolution,
            tables,
            config.baseline.clone(),
        );
        let mut cache = BaselineCache::new(synthesizer, clock)
            .with_ttl(Duration::from_secs(config.cache.ttl_secs));
        let centre = (bounds.reference_latitude(), (bounds.west + bounds.east) / 2.0);
        if let Some(source) = MeasurementSource::from_config(&config.sensors, centre) {
            info!(source = source.name(), "live measurements enabled");
            cache = cache.with_measurements(
                source,
                ProxyFactors::from_config(&config.sensors),
                Duration::from_secs(config.sensors.timeout_secs),
            )
            .with_blend_strength(config.sensors.blend_strength);
        }

        let engine = InterventionEngine::new(Arc::clone(&regions), config.intervention.clone());
        Self {
            config,
            regions,
            cache,
            engine,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn cache(&self) -> &BaselineCache {
        &self.cache
    }

    /// Cached baseline, rebuilt first when stale and a measurement source is configured.
    pub async fn baseline(&self) -> Arc<Baseline> {
        self.cache.get_fresh().await
    }

    pub async fn baseline_snapshot(&self) -> GridSnapshot {
        let baseline = self.baseline().await;
        GridSnapshot::capture(&baseline.grid, &self.regions, baseline.built_at)
    }

    pub async fn refresh(&self) -> Arc<Baseline> {
        self.cache.refresh().await
    }

    /// Raw station readings from the configured source, without blending.
    pub async fn stations(&self) -> Vec<Measurement> {
        self.cache.fetch_measurements().await
    }

    pub async fn simulate(&self, intervention: Intervention) -> SimulationReport {
        let baseline = self.baseline().await;
        let outcome = self.engine.apply(&baseline.grid, &intervention);
        SimulationReport {
            snapshot: GridSnapshot::capture(&outcome.grid, &self.regions, baseline.built_at),
            totals: outcome.totals,
            intervention,
        }
    }
}
