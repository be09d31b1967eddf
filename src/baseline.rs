//! Synthetic baseline emission grid.
//!
//! Layers run in a fixed order: point-source hotspots, density zones,
//! ambient field, optional noise, habitat override, then the global floor.
//! Every layer after the first reads what the previous layers wrote.

use tracing::{debug, info};

use crate::config::BaselineConfig;
use crate::grid::{Bounds, CellPos, Grid};
use crate::reference::ReferenceTables;
use crate::rng::{NoiseStream, RngExt, SeedKey};

pub struct BaselineSynthesizer {
    bounds: Bounds,
    resolution: usize,
    tables: ReferenceTables,
    settings: BaselineConfig,
}

impl BaselineSynthesizer {
    pub fn new(
        bounds: Bounds,
        resolution: usize,
        tables: ReferenceTables,
        settings: BaselineConfig,
    ) -> Self {
        Self {
            bounds,
            resolution,
            tables,
            settings,
        }
    }

    /// Build the synthetic grid. Deterministic for a fixed configuration.
    pub fn synthesize(&self) -> Grid {
        let mut grid = Grid::new(self.bounds, self.resolution);

        self.apply_hotspots(&mut grid);
        self.apply_zones(&mut grid);
        self.apply_ambient(&mut grid);
        if self.settings.noise.enabled {
            self.apply_noise(&mut grid);
        }
        self.apply_habitats(&mut grid);
        self.apply_floor(&mut grid);

        info!(
            resolution = self.resolution,
            total = grid.total(),
            min = grid.min_value(),
            max = grid.max_value(),
            "baseline synthesized"
        );
        grid
    }

    /// Raise every cell to at least `global_floor`. Also run after sensor blending.
    pub fn apply_floor(&self, grid: &mut Grid) {
        let floor = self.settings.global_floor;
        grid.update_cells(|_, _, _, value| *value = value.max(floor));
    }

    fn apply_hotspots(&self, grid: &mut Grid) {
        let scale = grid.km_scale();
        for hotspot in &self.tables.hotspots {
            let usable = hotspot.radius_km > 0.0 && hotspot.lat.is_finite() && hotspot.lon.is_finite();
            if !usable {
                debug!(name = %hotspot.name, "skipping degenerate hotspot");
                continue;
            }
            let sigma = hotspot.radius_km / 3.0;
            grid.update_cells(|_, lat, lon, value| {
                let d = scale.distance_km(lat - hotspot.lat, lon - hotspot.lon);
                if d < hotspot.radius_km {
                    *value += hotspot.peak * (-(d * d) / (2.0 * sigma * sigma)).exp();
                }
            });
        }
    }

    fn apply_zones(&self, grid: &mut Grid) {
        let radius = self.settings.zone_radius_cells;
        if radius == 0 {
            return;
        }
        for zone in &self.tables.zones {
            if !self.bounds.contains(zone.lat, zone.lon) {
                debug!(name = %zone.name, "density zone outside grid bounds");
                continue;
            }
            let centre = grid.nearest(zone.lat, zone.lon);
            let cells: Vec<CellPos> = grid.window(centre, radius).collect();
            for pos in cells {
                let d = centre.distance(pos);
                if d <= radius as f64 {
                    let add = zone.intensity * (1.0 - d / radius as f64);
                    if let Some(current) = grid.get(pos) {
                        grid.set(pos, current + add);
                    }
                }
            }
        }
    }

    fn apply_ambient(&self, grid: &mut Grid) {
        let threshold = self.settings.ambient_threshold;
        let base = self.settings.base_level;
        let centres = &self.tables.centres;
        grid.update_cells(|_, lat, lon, value| {
            if *value >= threshold {
                return;
            }
            let field: f64 = centres
                .iter()
                .map(|c| c.weight * ambient_band((lat - c.lat).hypot(lon - c.lon)))
                .sum();
            *value += base + field;
        });
    }

    fn apply_noise(&self, grid: &mut Grid) {
        let sigma = self.settings.noise.sigma;
        let mut rng =
            SeedKey::new(self.settings.noise.seed, NoiseStream::Baseline, self.resolution).rng();
        grid.update_cells(|_, _, _, value| *value += rng.gaussian(sigma));
    }

    fn apply_habitats(&self, grid: &mut Grid) {
        let floor = self.settings.water_floor;
        let habitats = &self.tables.habitats;
        grid.update_cells(|_, lat, lon, value| {
            if let Some(habitat) = habitats.iter().find(|h| h.contains(lat, lon)) {
                *value = (*value * habitat.kind.retention()).max(floor);
            }
        });
    }
}

/// Inverse-distance contribution of one region centre at planar degree distance `d`.
pub fn ambient_band(d: f64) -> f64 {
    if d < 0.05 {
        50.0
    } else if d < 0.15 {
        30.0 / (d * 100.0)
    } else {
        30.0 / (d * 100.0) * (-(d - 0.15) * 8.0).exp()
    }
}
