/// Region boundaries and point-in-region queries.
///
/// Boundaries arrive as a GeoJSON FeatureCollection (Polygon / MultiPolygon
/// features with a name property). They are decoded once per run into a
/// `RegionIndex`, which answers "which region contains this point" with a
/// coarse bounding-box reject followed by exact polygon tests.
///
/// # Tie-break
/// Regions are assumed not to overlap, but this is not validated. When they
/// do, `RegionIndex::contains` returns the first feature in load order.
///
/// # Boundaries
/// Containment is half-open ray casting: points on a south or west edge are
/// inside, points on a north or east edge are outside. Regions that tile the
/// plane therefore claim every shared-edge point exactly once.
///
/// # Duplicate names
/// Features sharing a name are merged into one multipolygon region.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::logging::{self, Stage};
use crate::model::{GeoPoint, GeometryError, RegionError};

/// Property names tried, in order, when the configured name property is absent.
pub const NAME_PROPERTY_FALLBACKS: &[&str] = &["name", "NAME_2", "KABUPATEN", "WADMKK"];

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Grow every side by `margin` degrees.
    pub fn padded(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat - margin,
            min_lon: self.min_lon - margin,
            max_lat: self.max_lat + margin,
            max_lon: self.max_lon + margin,
        }
    }
}

// ---------------------------------------------------------------------------
// Region features
// ---------------------------------------------------------------------------

/// Boundary of a single region.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl RegionGeometry {
    fn contains(&self, point: Coord<f64>) -> bool {
        match self {
            RegionGeometry::Polygon(p) => polygon_contains(p, point),
            RegionGeometry::MultiPolygon(mp) => mp.0.iter().any(|p| polygon_contains(p, point)),
        }
    }

    /// Combine two geometries into one multipolygon.
    fn merge(self, other: RegionGeometry) -> RegionGeometry {
        let mut polygons = self.into_polygons();
        polygons.extend(other.into_polygons());
        RegionGeometry::MultiPolygon(MultiPolygon(polygons))
    }

    fn into_polygons(self) -> Vec<Polygon<f64>> {
        match self {
            RegionGeometry::Polygon(p) => vec![p],
            RegionGeometry::MultiPolygon(mp) => mp.0,
        }
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        let rect = match self {
            RegionGeometry::Polygon(p) => p.bounding_rect(),
            RegionGeometry::MultiPolygon(mp) => mp.bounding_rect(),
        }?;
        Some(BoundingBox::new(rect.min().y, rect.min().x, rect.max().y, rect.max().x))
    }

    fn polygons(&self) -> Vec<&Polygon<f64>> {
        match self {
            RegionGeometry::Polygon(p) => vec![p],
            RegionGeometry::MultiPolygon(mp) => mp.0.iter().collect(),
        }
    }
}

/// A named administrative region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub name: String,
    pub geometry: RegionGeometry,
}

impl RegionFeature {
    pub fn new(name: &str, geometry: RegionGeometry) -> Self {
        Self {
            name: name.to_string(),
            geometry,
        }
    }

    /// Axis-aligned rectangular region; handy for synthetic boundaries.
    pub fn rectangle(name: &str, min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        let exterior = LineString::from(vec![
            (min_lon, min_lat),
            (max_lon, min_lat),
            (max_lon, max_lat),
            (min_lon, max_lat),
            (min_lon, min_lat),
        ]);
        Self::new(name, RegionGeometry::Polygon(Polygon::new(exterior, vec![])))
    }

    /// Exact point-in-region test against this feature alone.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.geometry.contains(Coord {
            x: point.lon,
            y: point.lat,
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.geometry.bounding_box()
    }

    /// Checks that every ring is usable for containment tests.
    fn validate(&self) -> Result<(), String> {
        let polygons = self.geometry.polygons();
        if polygons.is_empty() {
            return Err("geometry has no polygons".to_string());
        }
        for polygon in polygons {
            validate_ring(polygon.exterior())?;
            for hole in polygon.interiors() {
                validate_ring(hole)?;
            }
        }
        Ok(())
    }
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), String> {
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err("ring has non-finite coordinates".to_string());
    }
    let mut distinct: Vec<Coord<f64>> = Vec::new();
    for c in &ring.0 {
        if !distinct.contains(c) {
            distinct.push(*c);
        }
    }
    if distinct.len() < 3 {
        return Err(format!("ring has {} distinct vertices, need at least 3", distinct.len()));
    }
    Ok(())
}

/// Inside the exterior ring and outside every hole.
fn polygon_contains(polygon: &Polygon<f64>, point: Coord<f64>) -> bool {
    ring_contains(polygon.exterior(), point) && !polygon.interiors().iter().any(|hole| ring_contains(hole, point))
}

/// Even-odd ray cast towards +x. An edge counts when it straddles the ray
/// half-open in y (`lo <= y < hi`) and lies strictly right of the point, so
/// lower and left edges are inside while upper and right edges are not.
fn ring_contains(ring: &LineString<f64>, point: Coord<f64>) -> bool {
    let coords = &ring.0;
    if coords.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = coords.len() - 1;
    for i in 0..coords.len() {
        let (a, b) = (coords[i], coords[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// ---------------------------------------------------------------------------
// Region index
// ---------------------------------------------------------------------------

/// Loaded region set with a combined bounding box for fast rejects.
#[derive(Debug, Clone)]
pub struct RegionIndex {
    features: Vec<RegionFeature>,
    bbox: Option<BoundingBox>,
}

/// Result of building an index: the usable regions plus the skipped ones.
#[derive(Debug, Clone)]
pub struct IndexBuild {
    pub index: RegionIndex,
    pub skipped: Vec<GeometryError>,
}

impl RegionIndex {
    /// Build an index, skipping (and reporting) features with degenerate geometry.
    pub fn build(features: Vec<RegionFeature>) -> IndexBuild {
        let mut kept = Vec::with_capacity(features.len());
        let mut skipped = Vec::new();

        for feature in features {
            match feature.validate() {
                Ok(()) => kept.push(feature),
                Err(reason) => {
                    logging::log_skipped_region(&feature.name, &reason);
                    skipped.push(GeometryError {
                        region: feature.name,
                        reason,
                    });
                }
            }
        }

        let kept = merge_same_name(kept);

        let bbox = kept
            .iter()
            .filter_map(RegionFeature::bounding_box)
            .reduce(|a, b| a.union(&b));

        logging::info(
            Stage::Regions,
            None,
            &format!("Region index built: {} regions, {} skipped", kept.len(), skipped.len()),
        );

        IndexBuild {
            index: RegionIndex { features: kept, bbox },
            skipped,
        }
    }

    /// Decode a GeoJSON FeatureCollection and build an index from it.
    ///
    /// Whole-document problems are errors; per-feature problems are reported
    /// in `IndexBuild::skipped`.
    pub fn from_geojson_str(text: &str, name_property: Option<&str>) -> Result<IndexBuild, RegionError> {
        let doc: FeatureCollectionDoc =
            serde_json::from_str(text).map_err(|e| RegionError::Json(e.to_string()))?;
        if doc.kind != "FeatureCollection" {
            return Err(RegionError::NotFeatureCollection);
        }

        let mut features = Vec::with_capacity(doc.features.len());
        let mut decode_errors = Vec::new();

        for (i, feature) in doc.features.iter().enumerate() {
            let name = resolve_name(feature.properties.as_ref(), name_property)
                .unwrap_or_else(|| format!("region_{}", i));

            match feature.geometry.as_ref().map(decode_geometry) {
                Some(Ok(geometry)) => features.push(RegionFeature { name, geometry }),
                Some(Err(reason)) => {
                    logging::log_skipped_region(&name, &reason);
                    decode_errors.push(GeometryError { region: name, reason });
                }
                None => {
                    let reason = "feature has no geometry".to_string();
                    logging::log_skipped_region(&name, &reason);
                    decode_errors.push(GeometryError { region: name, reason });
                }
            }
        }

        let mut build = RegionIndex::build(features);
        decode_errors.append(&mut build.skipped);
        build.skipped = decode_errors;
        Ok(build)
    }

    /// Read a GeoJSON boundary file from disk.
    pub fn load(path: &Path, name_property: Option<&str>) -> Result<IndexBuild, RegionError> {
        let text = fs::read_to_string(path)
            .map_err(|e| RegionError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_geojson_str(&text, name_property)
    }

    /// Name of the first region containing `point`, if any.
    pub fn contains(&self, point: &GeoPoint) -> Option<&str> {
        let bbox = self.bbox?;
        if !bbox.contains(point.lat, point.lon) {
            return None;
        }
        self.features
            .iter()
            .find(|f| f.contains(point))
            .map(|f| f.name.as_str())
    }

    /// Whether any region contains `point`.
    pub fn contains_any(&self, point: &GeoPoint) -> bool {
        self.contains(point).is_some()
    }

    pub fn features(&self) -> &[RegionFeature] {
        &self.features
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Combined bounding box of all regions, `None` when the index is empty.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Fold features that share a name into one region, keeping the position of
/// the first occurrence.
fn merge_same_name(features: Vec<RegionFeature>) -> Vec<RegionFeature> {
    let mut merged: Vec<RegionFeature> = Vec::with_capacity(features.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for feature in features {
        match position.get(&feature.name) {
            Some(&i) => {
                logging::debug(Stage::Regions, Some(&feature.name), "merging feature into earlier region of the same name");
                let region = &mut merged[i];
                let geometry = std::mem::replace(&mut region.geometry, RegionGeometry::MultiPolygon(MultiPolygon(Vec::new())));
                region.geometry = geometry.merge(feature.geometry);
            }
            None => {
                position.insert(feature.name.clone(), merged.len());
                merged.push(feature);
            }
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// GeoJSON decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

fn resolve_name(properties: Option<&Map<String, Value>>, preferred: Option<&str>) -> Option<String> {
    let properties = properties?;
    preferred
        .into_iter()
        .chain(NAME_PROPERTY_FALLBACKS.iter().copied())
        .find_map(|key| match properties.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn decode_geometry(geometry: &Value) -> Result<RegionGeometry, String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;
    let coordinates = geometry
        .get("coordinates")
        .ok_or("geometry has no coordinates")?;

    match kind {
        "Polygon" => Ok(RegionGeometry::Polygon(decode_polygon(coordinates)?)),
        "MultiPolygon" => {
            let parts = coordinates.as_array().ok_or("MultiPolygon coordinates are not an array")?;
            let polygons = parts
                .iter()
                .map(decode_polygon)
                .collect::<Result<Vec<_>, _>>()?;
            if polygons.is_empty() {
                return Err("MultiPolygon has no polygons".to_string());
            }
            Ok(RegionGeometry::MultiPolygon(MultiPolygon(polygons)))
        }
        other => Err(format!("unsupported geometry type {}", other)),
    }
}

fn decode_polygon(coordinates: &Value) -> Result<Polygon<f64>, String> {
    let rings = coordinates.as_array().ok_or("polygon coordinates are not an array")?;
    let mut rings = rings.iter().map(decode_ring);
    let exterior = rings.next().ok_or("polygon has no exterior ring")??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn decode_ring(ring: &Value) -> Result<LineString<f64>, String> {
    let positions = ring.as_array().ok_or("ring is not an array")?;
    let mut coords = Vec::with_capacity(positions.len() + 1);
    for position in positions {
        let xy = position.as_array().ok_or("position is not an array")?;
        let x = xy.first().and_then(Value::as_f64).ok_or("position has no longitude")?;
        let y = xy.get(1).and_then(Value::as_f64).ok_or("position has no latitude")?;
        coords.push(Coord { x, y });
    }
    // Polygon::new closes open rings; validation counts distinct vertices.
    Ok(LineString::from(coords))
}
