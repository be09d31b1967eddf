use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use airshed::{
    baseline::BaselineSynthesizer,
    cache::{BaselineCache, Clock, ManualClock},
    config::{BaselineConfig, InterventionConfig},
    geometry::{NamedRect, Rect, RegionSet},
    grid::Bounds,
    intervention::{GeographicModification, Intervention},
    reference::ReferenceTables,
    sensor::{FileSource, MeasurementSource, ProxyFactors},
    InterventionEngine,
};
use chrono::{TimeZone, Utc};

fn synthesizer() -> BaselineSynthesizer {
    BaselineSynthesizer::new(
        Bounds::nyc(),
        20,
        ReferenceTables::nyc(),
        BaselineConfig::default(),
    )
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()))
}

fn measurement_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"lat": 40.7128, "lon": -74.0060, "value": 400.0, "unit": "ug/m3", "location": "City Hall"}},
            {{"lat": 40.7500, "lon": -73.9000, "value": 3.0, "unit": "furlongs"}}
        ]"#
    )
    .unwrap();
    file
}

fn flat_synthesizer() -> BaselineSynthesizer {
    let tables = ReferenceTables {
        regions: Vec::new(),
        hotspots: Vec::new(),
        zones: Vec::new(),
        centres: Vec::new(),
        habitats: Vec::new(),
    };
    BaselineSynthesizer::new(Bounds::nyc(), 20, tables, BaselineConfig::default())
}

fn file_source(path: PathBuf) -> MeasurementSource {
    MeasurementSource::File(FileSource { path })
}

#[tokio::test]
async fn get_fresh_without_source_never_rebuilds() {
    let clock = clock();
    let cache = BaselineCache::new(synthesizer(), clock.clone()).with_ttl(Duration::from_secs(60));
    let first = cache.get();

    clock.advance(chrono::Duration::hours(5));
    assert!(cache.is_stale());

    let again = cache.get_fresh().await;
    assert!(Arc::ptr_eq(&first, &again));
}

#[tokio::test]
async fn stale_baseline_is_rebuilt_with_measurements() {
    let file = measurement_file();
    let clock = clock();
    let cache = BaselineCache::new(synthesizer(), clock.clone())
        .with_ttl(Duration::from_secs(3600))
        .with_measurements(
            file_source(file.path().to_path_buf()),
            ProxyFactors::default(),
            Duration::from_secs(5),
        );
    let first = cache.get();
    assert_eq!(first.measurements_blended, 0);

    let fresh = cache.get_fresh().await;
    assert!(Arc::ptr_eq(&first, &fresh), "fresh baseline should be reused");

    clock.advance(chrono::Duration::seconds(3600));
    let rebuilt = cache.get_fresh().await;

    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(rebuilt.measurements_blended, 1);
    assert_eq!(rebuilt.built_at, clock.now());

    let pos = rebuilt.grid.nearest(40.7128, -74.0060);
    let synthetic = first.grid.get(pos).unwrap();
    // 400 ug/m3 * 2.5 at the default strength of 0.3
    let expected = synthetic * 0.7 + 1000.0 * 0.3;
    assert!((rebuilt.grid.get(pos).unwrap() - expected).abs() < 1e-9);
    assert!(Arc::ptr_eq(&rebuilt, &cache.get()));
}

#[tokio::test]
async fn failed_fetch_still_refreshes_synthetic_baseline() {
    let clock = clock();
    let cache = BaselineCache::new(synthesizer(), clock.clone()).with_measurements(
        file_source(PathBuf::from("/nonexistent/stations.json")),
        ProxyFactors::default(),
        Duration::from_secs(1),
    );
    let first = cache.get();

    clock.advance(chrono::Duration::minutes(1));
    let refreshed = cache.refresh().await;

    assert_eq!(refreshed.measurements_blended, 0);
    assert_eq!(refreshed.grid, first.grid);
    assert!(refreshed.built_at > first.built_at);
}

#[tokio::test]
async fn readers_keep_their_snapshot_across_refresh() {
    let file = measurement_file();
    let cache = BaselineCache::new(synthesizer(), clock()).with_measurements(
        file_source(file.path().to_path_buf()),
        ProxyFactors::default(),
        Duration::from_secs(5),
    );

    let held = cache.get();
    let before = held.grid.clone();
    cache.refresh().await;

    assert_eq!(held.grid, before);
    assert_ne!(cache.get().grid, before);
}

#[tokio::test]
async fn zero_reading_keeps_the_global_floor() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"[{{"lat": 40.75, "lon": -73.98, "value": 0.0, "unit": "ug/m3"}}]"#).unwrap();
    let cache = BaselineCache::new(flat_synthesizer(), clock())
        .with_measurements(
            file_source(file.path().to_path_buf()),
            ProxyFactors::default(),
            Duration::from_secs(5),
        )
        .with_blend_strength(0.99);

    let baseline = cache.refresh().await;
    let pos = baseline.grid.nearest(40.75, -73.98);

    assert_eq!(baseline.measurements_blended, 1);
    assert_eq!(baseline.grid.get(pos), Some(1.0));
    assert!(baseline.grid.values().iter().all(|v| *v >= 1.0));

    let manhattan = RegionSet::from_rectangles(&[NamedRect::new(
        "Manhattan",
        Rect::new(40.70, 40.80, -74.02, -73.93),
    )]);
    let engine = InterventionEngine::new(Arc::new(manhattan), InterventionConfig::default());
    let outcome = engine.apply(
        &baseline.grid,
        &Intervention::new(vec![GeographicModification::Region {
            area: "Manhattan".to_string(),
            change_percent: -10.0,
        }]),
    );
    assert!((outcome.grid.get(pos).unwrap() - 0.9).abs() < 1e-9);
    assert!(outcome.grid.values().iter().all(|v| *v > 0.0));
}

#[tokio::test]
async fn fetch_measurements_reads_the_source_unblended() {
    let file = measurement_file();
    let cache = BaselineCache::new(synthesizer(), clock()).with_measurements(
        file_source(file.path().to_path_buf()),
        ProxyFactors::default(),
        Duration::from_secs(5),
    );
    let before = cache.get();

    let stations = cache.fetch_measurements().await;

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].location.as_deref(), Some("City Hall"));
    assert!(Arc::ptr_eq(&before, &cache.get()));

    let bare = BaselineCache::new(synthesizer(), clock());
    assert!(bare.fetch_measurements().await.is_empty());
}
