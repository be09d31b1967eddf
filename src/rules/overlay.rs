use tracing::debug;

use crate::{
    engine::{Rule, RuleContext},
    grid::Grid,
    intervention::OverlayPoint,
};

/// Maximum swing either side of neutral for a fully weighted overlay point.
const OVERLAY_SWING: f64 = 0.2;

/// Small per-point adjustments from an intervention's spatial pattern.
pub struct OverlayRule {
    points: Vec<OverlayPoint>,
}

impl OverlayRule {
    pub fn new(points: Vec<OverlayPoint>) -> Self {
        Self { points }
    }
}

/// Factor for an overlay weight: 0.9 at weight 0, 1.0 at 0.5, 1.1 at 1.
pub fn overlay_factor(weight: f64) -> f64 {
    1.0 + (weight.clamp(0.0, 1.0) - 0.5) * OVERLAY_SWING
}

impl Rule for OverlayRule {
    fn name(&self) -> &str {
        "overlay"
    }

    fn apply(&self, ctx: &RuleContext<'_>, grid: &mut Grid) -> usize {
        let radius = ctx.settings.overlay_radius_deg;
        let mut touched = 0;
        for point in &self.points {
            if !(point.lat.is_finite() && point.lon.is_finite() && point.weight.is_finite()) {
                continue;
            }
            let factor = overlay_factor(point.weight);
            grid.update_cells(|_, lat, lon, value| {
                if (lat - point.lat).hypot(lon - point.lon) < radius {
                    *value *= factor;
                    touched += 1;
                }
            });
        }
        debug!(points = self.points.len(), touched, "overlay applied");
        touched
    }
}
