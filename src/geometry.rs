//! Named regions and point containment.
//!
//! Every region carries exactly one [`Boundary`]. Precise polygons come from
//! a GeoJSON boundary file when it loads; otherwise the region keeps the
//! axis-aligned rectangle from the reference tables. The choice is made once,
//! in [`RegionSet::load`], and never revisited.

use std::fs;
use std::path::Path;

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::{Feature, GeoJson, PolygonType, Position};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ReferenceError;

/// Names that address the whole territory rather than one region.
const TERRITORY_ALIASES: &[&str] = &["citywide", "city", "all", "entire city", "nyc", "new york city"];

/// Feature properties tried, in order, when no name property is configured.
const DEFAULT_NAME_PROPERTIES: &[&str] = &["boro_name", "BoroName", "borough", "name"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Rect {
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Zero-area or inverted rectangles contain nothing.
    pub fn is_degenerate(&self) -> bool {
        !(self.min_lat < self.max_lat && self.min_lon < self.max_lon)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        !self.is_degenerate()
            && (self.min_lat..=self.max_lat).contains(&lat)
            && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// A rectangle with the region label it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRect {
    pub name: String,
    #[serde(flatten)]
    pub rect: Rect,
}

impl NamedRect {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// Union of one or more polygons, in GeoJSON `(lon, lat)` axis order.
    Polygon(MultiPolygon<f64>),
    Rectangle(Rect),
}

impl Boundary {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        match self {
            Boundary::Polygon(shape) => shape.contains(&Point::new(lon, lat)),
            Boundary::Rectangle(rect) => rect.contains(lat, lon),
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Boundary::Polygon(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub boundary: Boundary,
}

/// Result of resolving a user-supplied region name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRef {
    /// The whole territory; contains every point.
    Territory,
    /// Index into [`RegionSet::regions`].
    Region(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub fn from_rectangles(rectangles: &[NamedRect]) -> Self {
        Self::new(
            rectangles
                .iter()
                .map(|named| Region {
                    name: named.name.clone(),
                    boundary: Boundary::Rectangle(named.rect),
                })
                .collect(),
        )
    }

    /// Resolve boundaries once for the process lifetime.
    ///
    /// Polygons from `boundaries` replace matching rectangles. A missing or
    /// unreadable boundary file leaves every region on its rectangle.
    pub fn load(
        boundaries: Option<&Path>,
        rectangles: &[NamedRect],
        name_property: Option<&str>,
    ) -> Self {
        let Some(path) = boundaries else {
            info!(regions = rectangles.len(), "no boundary file configured, using rectangles");
            return Self::from_rectangles(rectangles);
        };

        match load_boundary_file(path, name_property) {
            Ok(features) => {
                let set = Self::merge(rectangles, features);
                info!(
                    path = %path.display(),
                    polygons = set.polygon_count(),
                    regions = set.regions.len(),
                    "region boundaries resolved"
                );
                set
            }
            Err(err) => {
                warn!(error = %err, "boundary polygons unavailable, falling back to rectangles");
                Self::from_rectangles(rectangles)
            }
        }
    }

    fn merge(rectangles: &[NamedRect], features: Vec<(String, MultiPolygon<f64>)>) -> Self {
        let mut claimed = vec![false; features.len()];
        let mut regions = Vec::with_capacity(rectangles.len());

        for named in rectangles {
            let mut shapes = Vec::new();
            for (idx, (label, feature_shapes)) in features.iter().enumerate() {
                if names_match(&named.name, label) {
                    claimed[idx] = true;
                    shapes.extend(feature_shapes.0.iter().cloned());
                }
            }
            let boundary = if shapes.is_empty() {
                Boundary::Rectangle(named.rect)
            } else {
                Boundary::Polygon(MultiPolygon::new(shapes))
            };
            regions.push(Region {
                name: named.name.clone(),
                boundary,
            });
        }

        for ((label, shapes), used) in features.into_iter().zip(claimed) {
            if !used && !shapes.0.is_empty() {
                regions.push(Region {
                    name: label,
                    boundary: Boundary::Polygon(shapes),
                });
            }
        }

        Self::new(regions)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn polygon_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|region| region.boundary.is_polygon())
            .count()
    }

    /// Case-insensitive lookup; exact labels win over substring matches.
    pub fn resolve(&self, name: &str) -> Option<RegionRef> {
        let wanted = normalise(name);
        if wanted.is_empty() {
            return None;
        }
        if TERRITORY_ALIASES.contains(&wanted.as_str()) {
            return Some(RegionRef::Territory);
        }
        self.regions
            .iter()
            .position(|region| normalise(&region.name) == wanted)
            .or_else(|| {
                self.regions
                    .iter()
                    .position(|region| names_match(&region.name, name))
            })
            .map(RegionRef::Region)
    }

    pub fn contains(&self, name: &str, lat: f64, lon: f64) -> bool {
        self.resolve(name)
            .is_some_and(|region| self.contains_ref(region, lat, lon))
    }

    pub fn contains_ref(&self, region: RegionRef, lat: f64, lon: f64) -> bool {
        match region {
            RegionRef::Territory => true,
            RegionRef::Region(idx) => self
                .regions
                .get(idx)
                .is_some_and(|region| region.boundary.contains(lat, lon)),
        }
    }

    /// Whether a point falls inside any real region.
    pub fn contains_any(&self, lat: f64, lon: f64) -> bool {
        self.regions
            .iter()
            .any(|region| region.boundary.contains(lat, lon))
    }
}

fn normalise(name: &str) -> String {
    name.trim().to_lowercase()
}

fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalise(a), normalise(b));
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn load_boundary_file(
    path: &Path,
    name_property: Option<&str>,
) -> Result<Vec<(String, MultiPolygon<f64>)>, ReferenceError> {
    let text = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_feature_collection(&text, name_property).map_err(|message| ReferenceError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse a GeoJSON FeatureCollection of Polygon / MultiPolygon features.
///
/// Features without a name or with no usable ring are skipped.
pub fn parse_feature_collection(
    text: &str,
    name_property: Option<&str>,
) -> Result<Vec<(String, MultiPolygon<f64>)>, String> {
    let collection = match text.parse::<GeoJson>().map_err(|err| err.to_string())? {
        GeoJson::FeatureCollection(collection) => collection,
        _ => return Err("expected a FeatureCollection".to_string()),
    };

    let mut parsed = Vec::new();
    for feature in &collection.features {
        let Some(name) = feature_name(feature, name_property) else {
            continue;
        };
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let polygons: Vec<Polygon<f64>> = match &geometry.value {
            geojson::Value::Polygon(rings) => to_polygon(rings).into_iter().collect(),
            geojson::Value::MultiPolygon(polys) => polys.iter().filter_map(|p| to_polygon(p)).collect(),
            _ => Vec::new(),
        };
        if !polygons.is_empty() {
            parsed.push((name, MultiPolygon::new(polygons)));
        }
    }
    Ok(parsed)
}

fn feature_name(feature: &Feature, name_property: Option<&str>) -> Option<String> {
    let lookup = |key: &str| feature.property(key).and_then(|v| v.as_str()).map(str::to_string);
    match name_property {
        Some(key) => lookup(key),
        None => DEFAULT_NAME_PROPERTIES.iter().find_map(|key| lookup(key)),
    }
}

/// First ring is the exterior, the rest are holes. Rings under three vertices are dropped.
fn to_polygon(rings: &PolygonType) -> Option<Polygon<f64>> {
    let mut rings = rings.iter();
    let exterior = to_ring(rings.next()?)?;
    Some(Polygon::new(exterior, rings.filter_map(|ring| to_ring(ring)).collect()))
}

fn to_ring(positions: &[Position]) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = positions
        .iter()
        .filter_map(|pos| {
            Some(Coord {
                x: *pos.first()?,
                y: *pos.get(1)?,
            })
        })
        .collect();
    (coords.len() >= 3).then(|| LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boroughs() -> RegionSet {
        RegionSet::from_rectangles(&[
            NamedRect::new("Manhattan", Rect::new(40.70, 40.80, -74.02, -73.93)),
            NamedRect::new("Staten Island", Rect::new(40.49, 40.65, -74.26, -74.05)),
        ])
    }

    fn square_with_hole() -> Boundary {
        let exterior = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let hole = LineString::from(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0)]);
        Boundary::Polygon(MultiPolygon::new(vec![Polygon::new(exterior, vec![hole])]))
    }

    #[test]
    fn test_rectangle_containment() {
        let set = boroughs();

        assert!(set.contains("Manhattan", 40.75, -73.98));
        assert!(!set.contains("Manhattan", 40.58, -74.15));
        assert!(set.contains("Staten Island", 40.58, -74.15));
        assert!(!set.contains("Staten Island", 40.75, -73.98));
    }

    #[test]
    fn test_name_matching_is_loose() {
        let set = boroughs();

        assert!(set.contains("manhattan", 40.75, -73.98));
        assert!(set.contains("  MANHATTAN borough ", 40.75, -73.98));
        assert!(set.contains("staten", 40.58, -74.15));
        assert_eq!(set.resolve("Atlantis"), None);
        assert!(!set.contains("Atlantis", 40.75, -73.98));
    }

    #[test]
    fn test_territory_alias_contains_everything() {
        let set = boroughs();

        assert_eq!(set.resolve("Citywide"), Some(RegionRef::Territory));
        assert!(set.contains("all", 0.0, 0.0));
        assert!(!set.contains_any(0.0, 0.0));
    }

    #[test]
    fn test_polygon_respects_holes() {
        let shape = square_with_hole();

        assert!(shape.contains(2.0, 2.0));
        assert!(!shape.contains(5.0, 5.0));
        assert!(!shape.contains(12.0, 2.0));
    }

    #[test]
    fn test_short_rings_are_skipped() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"name": "Sliver"},
                    "geometry": {"type": "Polygon", "coordinates": [[[-74.0, 40.7], [-73.9, 40.8]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"borough": "Queens"},
                    "geometry": {"type": "Point", "coordinates": [-73.8, 40.7]}
                }
            ]
        }"#;

        assert!(parse_feature_collection(geojson, None).unwrap().is_empty());
        assert!(parse_feature_collection(r#"{"type": "Point", "coordinates": [0, 0]}"#, None).is_err());
    }

    #[test]
    fn test_degenerate_rectangle_is_empty() {
        let rect = Rect::new(40.7, 40.7, -74.0, -73.9);

        assert!(rect.is_degenerate());
        assert!(!rect.contains(40.7, -73.95));
    }

    #[test]
    fn test_feature_collection_replaces_matching_rectangle() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"boro_name": "Manhattan"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-74.00, 40.72], [-73.96, 40.72], [-73.96, 40.76], [-74.00, 40.76], [-74.00, 40.72]]]]
                }
            }]
        }"#;
        let features = parse_feature_collection(geojson, None).unwrap();
        let rects = [
            NamedRect::new("Manhattan", Rect::new(40.70, 40.80, -74.02, -73.93)),
            NamedRect::new("Staten Island", Rect::new(40.49, 40.65, -74.26, -74.05)),
        ];
        let set = RegionSet::merge(&rects, features);

        assert_eq!(set.polygon_count(), 1);
        assert!(set.contains("Manhattan", 40.74, -73.98));
        // inside the rectangle but outside the polygon
        assert!(!set.contains("Manhattan", 40.79, -73.94));
        assert!(set.contains("Staten Island", 40.58, -74.15));
    }

    #[test]
    fn test_missing_boundary_file_falls_back() {
        let rects = [NamedRect::new("Manhattan", Rect::new(40.70, 40.80, -74.02, -73.93))];
        let set = RegionSet::load(
            Some(Path::new("/nonexistent/borough_boundaries.geojson")),
            &rects,
            None,
        );

        assert_eq!(set.polygon_count(), 0);
        assert!(set.contains("Manhattan", 40.75, -73.98));
    }
}
