//! Regular latitude/longitude grid of intensity samples.

use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.0;

/// Rectangular bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl Bounds {
    /// The five boroughs of New York City.
    pub const fn nyc() -> Self {
        Self {
            south: 40.49,
            north: 40.92,
            west: -74.26,
            east: -73.70,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.south, self.north, self.west, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south < self.north
            && self.west < self.east
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lon)
    }

    /// Latitude the per-axis kilometre conversion is evaluated at.
    pub fn reference_latitude(&self) -> f64 {
        (self.south + self.north) / 2.0
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::nyc()
    }
}

/// Per-axis conversion from degree deltas to kilometres.
///
/// This is a flat projection around one reference latitude, not a geodesic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmScale {
    pub per_degree_lat: f64,
    pub per_degree_lon: f64,
}

impl KmScale {
    pub fn at_latitude(latitude: f64) -> Self {
        Self {
            per_degree_lat: KM_PER_DEGREE,
            per_degree_lon: KM_PER_DEGREE * latitude.to_radians().cos(),
        }
    }

    pub fn distance_km(&self, dlat: f64, dlon: f64) -> f64 {
        (dlat * self.per_degree_lat).hypot(dlon * self.per_degree_lon)
    }
}

/// Cell position: `row` indexes latitude (south to north), `col` longitude (west to east).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Euclidean distance in cell units.
    pub fn distance(self, other: CellPos) -> f64 {
        let dr = self.row.abs_diff(other.row) as f64;
        let dc = self.col.abs_diff(other.col) as f64;
        dr.hypot(dc)
    }
}

/// One sample read out of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub pos: CellPos,
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

/// `resolution x resolution` intensity samples, row-major with latitude outermost.
///
/// Values are kept non-negative by every mutator.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    bounds: Bounds,
    lats: Vec<f64>,
    lons: Vec<f64>,
    values: Vec<f64>,
}

impl Grid {
    /// A zeroed grid.
    pub fn new(bounds: Bounds, resolution: usize) -> Self {
        Self::filled(bounds, resolution, 0.0)
    }

    pub fn filled(bounds: Bounds, resolution: usize, value: f64) -> Self {
        let lats = linspace(bounds.south, bounds.north, resolution);
        let lons = linspace(bounds.west, bounds.east, resolution);
        Self {
            bounds,
            lats,
            lons,
            values: vec![value.max(0.0); resolution * resolution],
        }
    }

    pub fn resolution(&self) -> usize {
        self.lats.len()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn cell_count(&self) -> usize {
        self.values.len()
    }

    /// Convert a cell position to its flat index.
    pub fn index(&self, pos: CellPos) -> Option<usize> {
        let n = self.resolution();
        if pos.row < n && pos.col < n {
            Some(pos.row * n + pos.col)
        } else {
            None
        }
    }

    /// Convert a flat index back to a cell position.
    pub fn position(&self, index: usize) -> Option<CellPos> {
        let n = self.resolution();
        if index < self.values.len() {
            Some(CellPos::new(index / n, index % n))
        } else {
            None
        }
    }

    pub fn get(&self, pos: CellPos) -> Option<f64> {
        self.index(pos).map(|idx| self.values[idx])
    }

    /// Overwrite one cell. Negative values are stored as zero.
    pub fn set(&mut self, pos: CellPos, value: f64) {
        if let Some(idx) = self.index(pos) {
            self.values[idx] = value.max(0.0);
        }
    }

    pub fn cell(&self, index: usize) -> Option<Cell> {
        let pos = self.position(index)?;
        Some(Cell {
            pos,
            lat: self.lats[pos.row],
            lon: self.lons[pos.col],
            value: self.values[index],
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.values.len()).filter_map(move |idx| self.cell(idx))
    }

    /// Visit every cell with mutable access to its value.
    ///
    /// The closure sees `(flat index, lat, lon, value)`; the value is clamped
    /// to zero afterwards.
    pub fn update_cells(&mut self, mut f: impl FnMut(usize, f64, f64, &mut f64)) {
        let n = self.lats.len();
        for (idx, value) in self.values.iter_mut().enumerate() {
            let lat = self.lats[idx / n];
            let lon = self.lons[idx % n];
            f(idx, lat, lon, value);
            if value.is_nan() || *value < 0.0 {
                *value = 0.0;
            }
        }
    }

    /// Nearest cell to a coordinate; coordinates outside the bounds snap to the edge.
    pub fn nearest(&self, lat: f64, lon: f64) -> CellPos {
        CellPos::new(nearest_index(&self.lats, lat), nearest_index(&self.lons, lon))
    }

    /// Cells within `radius` rows and columns of `centre`, clipped to the grid.
    pub fn window(&self, centre: CellPos, radius: usize) -> impl Iterator<Item = CellPos> {
        let n = self.resolution();
        let rows = centre.row.saturating_sub(radius)..(centre.row + radius + 1).min(n);
        let cols = centre.col.saturating_sub(radius)..(centre.col + radius + 1).min(n);
        rows.flat_map(move |row| cols.clone().map(move |col| CellPos::new(row, col)))
    }

    pub fn km_scale(&self) -> KmScale {
        KmScale::at_latitude(self.bounds.reference_latitude())
    }

    /// Surface area represented by one cell.
    pub fn cell_area_km2(&self) -> f64 {
        let steps = self.resolution().saturating_sub(1).max(1) as f64;
        let scale = self.km_scale();
        let lat_step = (self.bounds.north - self.bounds.south) / steps;
        let lon_step = (self.bounds.east - self.bounds.west) / steps;
        lat_step * scale.per_degree_lat * lon_step * scale.per_degree_lon
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn min_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

fn nearest_index(samples: &[f64], target: f64) -> usize {
    samples
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_span_bounds() {
        let grid = Grid::new(Bounds::nyc(), 50);

        assert_eq!(grid.resolution(), 50);
        assert_eq!(grid.cell_count(), 2500);
        assert!((grid.lats()[0] - 40.49).abs() < 1e-12);
        assert!((grid.lats()[49] - 40.92).abs() < 1e-12);
        assert!((grid.lons()[0] + 74.26).abs() < 1e-12);
        assert!((grid.lons()[49] + 73.70).abs() < 1e-12);
    }

    #[test]
    fn test_index_position_conversion() {
        let grid = Grid::new(Bounds::nyc(), 10);

        let pos = CellPos::new(2, 3);
        let idx = grid.index(pos).unwrap();
        assert_eq!(idx, 23);
        assert_eq!(grid.position(idx), Some(pos));
        assert_eq!(grid.index(CellPos::new(10, 0)), None);
    }

    #[test]
    fn test_nearest_snaps_to_edges() {
        let grid = Grid::new(Bounds::nyc(), 10);

        assert_eq!(grid.nearest(40.0, -75.0), CellPos::new(0, 0));
        assert_eq!(grid.nearest(41.5, -73.0), CellPos::new(9, 9));
        let lat = grid.lats()[4];
        let lon = grid.lons()[7];
        assert_eq!(grid.nearest(lat + 1e-4, lon - 1e-4), CellPos::new(4, 7));
    }

    #[test]
    fn test_window_clips_at_corner() {
        let grid = Grid::new(Bounds::nyc(), 10);

        assert_eq!(grid.window(CellPos::new(0, 0), 2).count(), 9);
        assert_eq!(grid.window(CellPos::new(5, 5), 2).count(), 25);
    }

    #[test]
    fn test_mutators_keep_values_non_negative() {
        let mut grid = Grid::filled(Bounds::nyc(), 4, 10.0);

        grid.set(CellPos::new(1, 1), -5.0);
        assert_eq!(grid.get(CellPos::new(1, 1)), Some(0.0));

        grid.update_cells(|_, _, _, value| *value -= 20.0);
        assert!(grid.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_cell_area_is_plausible() {
        let grid = Grid::new(Bounds::nyc(), 50);
        let area = grid.cell_area_km2();

        // ~0.98 km north-south by ~0.96 km east-west
        assert!(area > 0.8 && area < 1.1, "cell area {area}");
    }
}
