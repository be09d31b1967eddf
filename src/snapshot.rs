use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::RegionSet;
use crate::grid::{Bounds, Grid};

/// Unit label attached to every exported snapshot.
pub const INTENSITY_UNIT: &str = "kg CO2/km2/day";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

/// Cells inside at least one region, in grid order.
pub fn to_points(grid: &Grid, regions: &RegionSet) -> Vec<GridPoint> {
    grid.cells()
        .filter(|cell| regions.contains_any(cell.lat, cell.lon))
        .map(|cell| GridPoint {
            lat: cell.lat,
            lon: cell.lon,
            value: cell.value,
        })
        .collect()
}

/// Every cell, including those outside all regions.
pub fn all_points(grid: &Grid) -> Vec<GridPoint> {
    grid.cells()
        .map(|cell| GridPoint {
            lat: cell.lat,
            lon: cell.lon,
            value: cell.value,
        })
        .collect()
}

/// Exported view of a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub unit: String,
    pub resolution: usize,
    pub bounds: Bounds,
    pub cell_area_km2: f64,
    pub last_updated: DateTime<Utc>,
    pub points: Vec<GridPoint>,
}

impl GridSnapshot {
    /// Snapshot restricted to cells inside the region boundaries.
    pub fn capture(grid: &Grid, regions: &RegionSet, last_updated: DateTime<Utc>) -> Self {
        Self::with_points(grid, to_points(grid, regions), last_updated)
    }

    pub fn unfiltered(grid: &Grid, last_updated: DateTime<Utc>) -> Self {
        Self::with_points(grid, all_points(grid), last_updated)
    }

    fn with_points(grid: &Grid, points: Vec<GridPoint>, last_updated: DateTime<Utc>) -> Self {
        Self {
            unit: INTENSITY_UNIT.to_string(),
            resolution: grid.resolution(),
            bounds: grid.bounds(),
            cell_area_km2: grid.cell_area_km2(),
            last_updated,
            points,
        }
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}
