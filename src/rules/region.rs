use tracing::{debug, warn};

use crate::{
    engine::{Rule, RuleContext},
    grid::Grid,
};

use super::bounded_factor;

/// Uniform change over every cell inside a named region.
pub struct RegionRule {
    area: String,
    change: f64,
}

impl RegionRule {
    pub fn new(area: impl Into<String>, change: f64) -> Self {
        Self {
            area: area.into(),
            change,
        }
    }
}

impl Rule for RegionRule {
    fn name(&self) -> &str {
        "region"
    }

    fn apply(&self, ctx: &RuleContext<'_>, grid: &mut Grid) -> usize {
        let Some(region) = ctx.regions.resolve(&self.area) else {
            warn!(area = %self.area, "ignoring modification for unknown region");
            return 0;
        };
        let factor = bounded_factor(self.change);
        let mut touched = 0;
        grid.update_cells(|_, lat, lon, value| {
            if ctx.regions.contains_ref(region, lat, lon) {
                *value *= factor;
                touched += 1;
            }
        });
        debug!(area = %self.area, touched, factor, "region rule applied");
        touched
    }
}
