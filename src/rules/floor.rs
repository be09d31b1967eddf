use tracing::debug;

use crate::{
    engine::{Rule, RuleContext},
    grid::Grid,
};

use super::bounded_factor;

/// Change applied to cells that were low-emission in the baseline.
pub struct FloorRule {
    change: f64,
}

impl FloorRule {
    pub fn new(change: f64) -> Self {
        Self { change }
    }
}

impl Rule for FloorRule {
    fn name(&self) -> &str {
        "floor"
    }

    fn apply(&self, ctx: &RuleContext<'_>, grid: &mut Grid) -> usize {
        let threshold = ctx.settings.floor_threshold;
        let baseline = ctx.baseline.values();
        let factor = bounded_factor(self.change);
        let mut touched = 0;
        grid.update_cells(|idx, _, _, value| {
            if baseline[idx] < threshold {
                *value *= factor;
                touched += 1;
            }
        });
        debug!(threshold, touched, factor, "floor rule applied");
        touched
    }
}
