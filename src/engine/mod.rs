//! Intervention engine: turns a baseline grid plus an [`Intervention`] into
//! a modified grid and its change totals.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::InterventionConfig,
    geometry::RegionSet,
    grid::Grid,
    intervention::{GeographicModification, Intervention},
    rules::{FloorRule, HotspotRule, OverlayRule, RegionRule, MIN_FACTOR},
};

/// Read-only inputs shared by every rule of one application.
pub struct RuleContext<'a> {
    /// The unmodified grid the intervention started from.
    pub baseline: &'a Grid,
    pub regions: &'a RegionSet,
    pub settings: &'a InterventionConfig,
}

pub trait Rule {
    fn name(&self) -> &str;

    /// Scale cells of `grid` in place and return how many cells were touched.
    fn apply(&self, ctx: &RuleContext<'_>, grid: &mut Grid) -> usize;
}

/// Aggregate change over the boundary-filtered cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeTotals {
    pub baseline_total: f64,
    pub modified_total: f64,
    pub absolute_change: f64,
    pub percent_change: f64,
    pub cells_changed: usize,
}

impl ChangeTotals {
    /// Compare two grids of the same shape, counting only cells inside `regions`.
    pub fn between(baseline: &Grid, modified: &Grid, regions: &RegionSet) -> Self {
        let mut totals = Self::default();
        for (before, after) in baseline.cells().zip(modified.values()) {
            if !regions.contains_any(before.lat, before.lon) {
                continue;
            }
            totals.baseline_total += before.value;
            totals.modified_total += after;
            if (after - before.value).abs() > 1e-9 {
                totals.cells_changed += 1;
            }
        }
        totals.absolute_change = totals.modified_total - totals.baseline_total;
        if totals.baseline_total > 0.0 {
            totals.percent_change = totals.absolute_change / totals.baseline_total * 100.0;
        }
        totals
    }
}

#[derive(Debug, Clone)]
pub struct InterventionOutcome {
    pub grid: Grid,
    pub totals: ChangeTotals,
}

pub struct InterventionEngine {
    regions: Arc<RegionSet>,
    settings: InterventionConfig,
}

impl InterventionEngine {
    pub fn new(regions: Arc<RegionSet>, settings: InterventionConfig) -> Self {
        Self { regions, settings }
    }

    /// Apply `intervention` to a copy of `baseline`.
    ///
    /// Rules compound multiplicatively in order, then every cell is held at
    /// or above [`MIN_FACTOR`] times its baseline value.
    pub fn apply(&self, baseline: &Grid, intervention: &Intervention) -> InterventionOutcome {
        if intervention.is_unrelated {
            info!("intervention has no spatial effect");
            return InterventionOutcome {
                grid: baseline.clone(),
                totals: ChangeTotals::default(),
            };
        }

        let ctx = RuleContext {
            baseline,
            regions: &self.regions,
            settings: &self.settings,
        };
        let mut grid = baseline.clone();
        for rule in rules_for(intervention) {
            let touched = rule.apply(&ctx, &mut grid);
            debug!(rule = rule.name(), touched, "rule finished");
        }

        let floor = baseline.values();
        grid.update_cells(|idx, _, _, value| *value = value.max(floor[idx] * MIN_FACTOR));

        let totals = ChangeTotals::between(baseline, &grid, &self.regions);
        info!(
            modifications = intervention.modifications.len(),
            overlay_points = intervention.spatial_pattern.len(),
            percent_change = totals.percent_change,
            cells_changed = totals.cells_changed,
            "intervention applied"
        );
        InterventionOutcome { grid, totals }
    }
}

fn rules_for(intervention: &Intervention) -> Vec<Box<dyn Rule>> {
    let mut rules: Vec<Box<dyn Rule>> = intervention
        .modifications
        .iter()
        .map(|modification| -> Box<dyn Rule> {
            let change = modification.change_fraction();
            match modification {
                GeographicModification::Hotspot {
                    lat,
                    lon,
                    radius_km,
                    ..
                } => Box::new(HotspotRule::new(*lat, *lon, *radius_km, change)),
                GeographicModification::Region { area, .. } => {
                    Box::new(RegionRule::new(area.clone(), change))
                }
                GeographicModification::Floor { .. } => Box::new(FloorRule::new(change)),
            }
        })
        .collect();
    if !intervention.spatial_pattern.is_empty() {
        rules.push(Box::new(OverlayRule::new(
            intervention.spatial_pattern.clone(),
        )));
    }
    rules
}
