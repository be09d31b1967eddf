use std::sync::Arc;

use airshed::{
    config::InterventionConfig,
    engine::InterventionEngine,
    geometry::{NamedRect, Rect, RegionSet},
    grid::{Bounds, CellPos, Grid},
    intervention::{GeographicModification, Intervention, OverlayPoint},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn unit_bounds() -> Bounds {
    Bounds {
        south: 40.0,
        north: 41.0,
        west: -74.5,
        east: -73.5,
    }
}

/// 21x21 grid over one square degree; cell spacing is 0.05 degrees.
fn uniform_grid(value: f64) -> Grid {
    Grid::filled(unit_bounds(), 21, value)
}

fn whole_area() -> RegionSet {
    RegionSet::from_rectangles(&[NamedRect::new(
        "Test Area",
        Rect::new(40.0, 41.0, -74.5, -73.5),
    )])
}

fn engine(regions: RegionSet) -> InterventionEngine {
    InterventionEngine::new(Arc::new(regions), InterventionConfig::default())
}

fn region(area: &str, change_percent: f64) -> GeographicModification {
    GeographicModification::Region {
        area: area.to_string(),
        change_percent,
    }
}

#[test]
fn region_cut_touches_only_the_contained_cell() {
    let baseline = uniform_grid(100.0);
    let target = CellPos::new(7, 12);
    let lat = baseline.lats()[target.row];
    let lon = baseline.lons()[target.col];
    let regions = RegionSet::from_rectangles(&[
        NamedRect::new("Test Area", Rect::new(40.0, 41.0, -74.5, -73.5)),
        NamedRect::new(
            "TestZone",
            Rect::new(lat - 0.01, lat + 0.01, lon - 0.01, lon + 0.01),
        ),
    ]);

    let outcome =
        engine(regions).apply(&baseline, &Intervention::new(vec![region("TestZone", -30.0)]));

    for cell in outcome.grid.cells() {
        let expected = if cell.pos == target { 70.0 } else { 100.0 };
        assert!(
            (cell.value - expected).abs() < 1e-9,
            "cell {:?} = {} (expected {expected})",
            cell.pos,
            cell.value
        );
    }
    assert_eq!(outcome.totals.cells_changed, 1);
    assert!((outcome.totals.absolute_change + 30.0).abs() < 1e-9);
}

#[test]
fn hotspot_cut_halves_centre_and_fades_to_edge() {
    let baseline = uniform_grid(100.0);
    // radius of half a degree, reaching exactly to the grid edge
    let radius_km = 0.5 * 111.0;
    let intervention = Intervention::new(vec![GeographicModification::Hotspot {
        lat: 40.5,
        lon: -74.0,
        radius_km,
        change_percent: -50.0,
    }]);

    let outcome = engine(whole_area()).apply(&baseline, &intervention);
    let grid = &outcome.grid;

    let centre = grid.get(CellPos::new(10, 10)).unwrap();
    assert!((centre - 50.0).abs() < 1e-9, "centre {centre}");

    let near_edge = grid.get(CellPos::new(10, 19)).unwrap();
    assert!(near_edge > 98.0 && near_edge < 100.0, "near edge {near_edge}");

    assert_eq!(grid.get(CellPos::new(10, 20)), Some(100.0));
    assert_eq!(grid.get(CellPos::new(0, 0)), Some(100.0));
}

#[test]
fn hotspot_effect_decays_monotonically() {
    let baseline = uniform_grid(100.0);
    let intervention = Intervention::new(vec![GeographicModification::Hotspot {
        lat: 40.5,
        lon: -74.0,
        radius_km: 40.0,
        change_percent: -60.0,
    }]);

    let grid = engine(whole_area()).apply(&baseline, &intervention).grid;

    let row: Vec<f64> = (10..21)
        .map(|col| grid.get(CellPos::new(10, col)).unwrap())
        .collect();
    for pair in row.windows(2) {
        assert!(pair[0] <= pair[1], "values along row not increasing: {row:?}");
    }
    assert!(row[0] < row[5]);
}

#[test]
fn repeated_cuts_compound() {
    let baseline = uniform_grid(100.0);
    let intervention = Intervention::new(vec![region("Test Area", -20.0), region("test area", -20.0)]);

    let grid = engine(whole_area()).apply(&baseline, &intervention).grid;

    assert!(grid.values().iter().all(|v| (*v - 64.0).abs() < 1e-9));
}

#[test]
fn hotspot_and_region_compound_at_centre() {
    let baseline = uniform_grid(100.0);
    let intervention = Intervention::new(vec![
        GeographicModification::Hotspot {
            lat: 40.5,
            lon: -74.0,
            radius_km: 10.0,
            change_percent: -20.0,
        },
        region("Test Area", -20.0),
    ]);

    let grid = engine(whole_area()).apply(&baseline, &intervention).grid;

    let centre = grid.get(CellPos::new(10, 10)).unwrap();
    assert!((centre - 64.0).abs() < 1e-9, "centre {centre}");
    // outside the hotspot only the region cut applies
    assert!((grid.get(CellPos::new(0, 0)).unwrap() - 80.0).abs() < 1e-9);
}

#[test]
fn floor_rule_only_touches_low_baseline_cells() {
    let mut baseline = uniform_grid(50.0);
    for col in 0..21 {
        baseline.set(CellPos::new(3, col), 10.0);
    }
    let intervention = Intervention::new(vec![GeographicModification::Floor {
        change_percent: 50.0,
    }]);

    let grid = engine(whole_area()).apply(&baseline, &intervention).grid;

    for cell in grid.cells() {
        let expected = if cell.pos.row == 3 { 15.0 } else { 50.0 };
        assert!((cell.value - expected).abs() < 1e-9, "cell {:?}", cell.pos);
    }
}

#[test]
fn unrelated_intervention_is_identity() {
    let baseline = uniform_grid(42.0);
    let intervention = Intervention {
        modifications: vec![region("Test Area", -90.0)],
        ..Intervention::unrelated()
    };

    let outcome = engine(whole_area()).apply(&baseline, &intervention);

    assert_eq!(outcome.grid, baseline);
    assert_eq!(outcome.totals.cells_changed, 0);
    assert_eq!(outcome.totals.percent_change, 0.0);
}

#[test]
fn random_interventions_never_go_negative() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let engine = engine(whole_area());

    for _ in 0..50 {
        let mut baseline = uniform_grid(0.0);
        baseline.update_cells(|_, _, _, value| *value = rng.gen_range(0.0..200.0));

        let mut modifications = Vec::new();
        for _ in 0..rng.gen_range(1..6) {
            let change_percent = rng.gen_range(-300.0..300.0);
            let modification = match rng.gen_range(0..3) {
                0 => GeographicModification::Hotspot {
                    lat: rng.gen_range(40.0..41.0),
                    lon: rng.gen_range(-74.5..-73.5),
                    radius_km: rng.gen_range(-5.0..60.0),
                    change_percent,
                },
                1 => region("citywide", change_percent),
                _ => GeographicModification::Floor { change_percent },
            };
            modifications.push(modification);
        }
        let pattern = (0..rng.gen_range(0..4))
            .map(|_| OverlayPoint {
                lat: rng.gen_range(40.0..41.0),
                lon: rng.gen_range(-74.5..-73.5),
                weight: rng.gen_range(-1.0..2.0),
            })
            .collect();

        let intervention = Intervention::new(modifications).with_pattern(pattern);
        let outcome = engine.apply(&baseline, &intervention);

        assert_eq!(outcome.grid.resolution(), baseline.resolution());
        for (after, before) in outcome.grid.values().iter().zip(baseline.values()) {
            assert!(after.is_finite());
            assert!(*after >= 0.0);
            assert!(*after >= before * 0.01 - 1e-12);
        }
    }
}

#[test]
fn parsed_json_intervention_applies() {
    let baseline = uniform_grid(100.0);
    let intervention = Intervention::from_json(
        r#"{
            "geographic_modifications": [
                {"type": "region", "area": "Test Area", "change_percent": -10}
            ],
            "description": "area-wide cut"
        }"#,
    )
    .unwrap();

    let outcome = engine(whole_area()).apply(&baseline, &intervention);

    assert!((outcome.totals.percent_change + 10.0).abs() < 1e-9);
    assert_eq!(outcome.totals.cells_changed, 441);
}
