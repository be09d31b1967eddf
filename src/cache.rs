//! Baseline cache with an injectable clock.
//!
//! The cached baseline is an immutable `Arc<Baseline>`; a refresh builds a
//! new one off to the side and swaps the pointer, so readers holding the
//! old `Arc` are never disturbed.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::baseline::BaselineSynthesizer;
use crate::grid::Grid;
use crate::sensor::{self, Measurement, MeasurementSource, ProxyFactors};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A built baseline and when it was built.
#[derive(Debug, Clone)]
pub struct Baseline {
    pub grid: Grid,
    pub built_at: DateTime<Utc>,
    pub measurements_blended: usize,
}

struct MeasurementFeed {
    source: MeasurementSource,
    proxy: ProxyFactors,
    timeout: Duration,
    strength: f64,
}

pub struct BaselineCache {
    synthesizer: BaselineSynthesizer,
    feed: Option<MeasurementFeed>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    current: RwLock<Arc<Baseline>>,
}

impl BaselineCache {
    /// Create the cache and build the synthetic baseline immediately.
    pub fn new(synthesizer: BaselineSynthesizer, clock: Arc<dyn Clock>) -> Self {
        let initial = Baseline {
            grid: synthesizer.synthesize(),
            built_at: clock.now(),
            measurements_blended: 0,
        };
        Self {
            synthesizer,
            feed: None,
            ttl: Duration::from_secs(3600),
            clock,
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Blend measurements from `source` on every refresh.
    pub fn with_measurements(
        mut self,
        source: MeasurementSource,
        proxy: ProxyFactors,
        timeout: Duration,
    ) -> Self {
        self.feed = Some(MeasurementFeed {
            source,
            proxy,
            timeout,
            strength: sensor::DEFAULT_BLEND_STRENGTH,
        });
        self
    }

    /// Kernel strength for measurement blending. No effect without a measurement source.
    pub fn with_blend_strength(mut self, strength: f64) -> Self {
        if let Some(feed) = &mut self.feed {
            feed.strength = strength;
        }
        self
    }

    pub fn has_measurement_source(&self) -> bool {
        self.feed.is_some()
    }

    /// Fetch readings from the measurement source. Empty when none is configured or the fetch fails.
    pub async fn fetch_measurements(&self) -> Vec<Measurement> {
        match &self.feed {
            Some(feed) => sensor::fetch_with_timeout(&feed.source, feed.timeout).await,
            None => Vec::new(),
        }
    }

    /// Current baseline, however old.
    pub fn get(&self) -> Arc<Baseline> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_stale(&self) -> bool {
        let built_at = self.get().built_at;
        // a clock that went backwards counts as fresh
        (self.clock.now() - built_at)
            .to_std()
            .map(|age| age >= self.ttl)
            .unwrap_or(false)
    }

    /// Rebuild the baseline, blending fresh measurements when a source is configured.
    pub async fn refresh(&self) -> Arc<Baseline> {
        let mut grid = self.synthesizer.synthesize();
        let mut blended = 0;
        if let Some(feed) = &self.feed {
            let measurements = self.fetch_measurements().await;
            blended = sensor::blend(&mut grid, &measurements, &feed.proxy, feed.strength).blended;
            self.synthesizer.apply_floor(&mut grid);
        }
        let baseline = Arc::new(Baseline {
            grid,
            built_at: self.clock.now(),
            measurements_blended: blended,
        });
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&baseline);
        info!(
            built_at = %baseline.built_at.to_rfc3339(),
            measurements = blended,
            "baseline refreshed"
        );
        baseline
    }

    /// Current baseline, rebuilt first if it is stale and live data can improve it.
    pub async fn get_fresh(&self) -> Arc<Baseline> {
        if self.feed.is_some() && self.is_stale() {
            debug!("cached baseline is stale");
            return self.refresh().await;
        }
        self.get()
    }
}
