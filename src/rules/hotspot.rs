use tracing::{debug, warn};

use crate::{
    engine::{Rule, RuleContext},
    grid::{Grid, KM_PER_DEGREE},
};

use super::bounded_factor;

/// Gaussian-weighted change around a point.
pub struct HotspotRule {
    lat: f64,
    lon: f64,
    radius_km: f64,
    change: f64,
}

impl HotspotRule {
    pub fn new(lat: f64, lon: f64, radius_km: f64, change: f64) -> Self {
        Self {
            lat,
            lon,
            radius_km,
            change,
        }
    }

    fn is_degenerate(&self) -> bool {
        let finite = self.lat.is_finite() && self.lon.is_finite() && self.radius_km.is_finite();
        !finite || self.radius_km <= 0.0
    }
}

/// Kernel weight at planar degree distance `d` for a disc of `radius_deg`.
pub fn gaussian_weight(d: f64, radius_deg: f64) -> f64 {
    let sigma = radius_deg / 3.0;
    (-(d * d) / (2.0 * sigma * sigma)).exp()
}

impl Rule for HotspotRule {
    fn name(&self) -> &str {
        "hotspot"
    }

    fn apply(&self, _ctx: &RuleContext<'_>, grid: &mut Grid) -> usize {
        if self.is_degenerate() {
            warn!(
                lat = self.lat,
                lon = self.lon,
                radius_km = self.radius_km,
                "ignoring hotspot with degenerate geometry"
            );
            return 0;
        }
        let radius_deg = self.radius_km / KM_PER_DEGREE;
        let mut touched = 0;
        grid.update_cells(|_, lat, lon, value| {
            let d = (lat - self.lat).hypot(lon - self.lon);
            if d < radius_deg {
                *value *= bounded_factor(self.change * gaussian_weight(d, radius_deg));
                touched += 1;
            }
        });
        debug!(touched, radius_deg, "hotspot rule applied");
        touched
    }
}
