//! Block-fill interpolation from the coarse source grid to the fine grid.
//!
//! Source CH/SH data are reported on a 0.05° grid. To aggregate them against
//! irregular region boundaries we lay a 0.01° lattice over the padded region
//! bounding box, keep the lattice points inside some region, and give every
//! kept point the values of the coarse "parent" cell it falls in. There is no
//! smoothing: all fine points of one parent cell carry identical values.
//!
//! Parent-cell lookup:
//! 1. first source point inside the parent cell box (with `cell_tolerance`
//!    slack on the lower edges),
//! 2. otherwise the source point nearest to the cell centre.
//!
//! Lattice and parent indices are computed in integer steps so that values
//! like 10.05 do not drift into the neighbouring cell.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::logging::{self, Stage};
use crate::model::{
    CELL_TOLERANCE_DEG, ChPoint, FINE_RESOLUTION_DEG, GRID_PADDING_DEG, GeoPoint, MatchedPoint,
    PARENT_RESOLUTION_DEG, ShPoint,
};
use crate::regions::RegionIndex;

/// Slack, in grid-index units, when flooring a coordinate to its cell.
const INDEX_EPSILON: f64 = 1e-6;

/// Resolutions and tolerances of the interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    #[serde(default = "default_parent")]
    pub parent_resolution: f64,
    #[serde(default = "default_fine")]
    pub fine_resolution: f64,
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default = "default_tolerance")]
    pub cell_tolerance: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            parent_resolution: PARENT_RESOLUTION_DEG,
            fine_resolution: FINE_RESOLUTION_DEG,
            padding: GRID_PADDING_DEG,
            cell_tolerance: CELL_TOLERANCE_DEG,
        }
    }
}

fn default_parent() -> f64 {
    PARENT_RESOLUTION_DEG
}

fn default_fine() -> f64 {
    FINE_RESOLUTION_DEG
}

fn default_padding() -> f64 {
    GRID_PADDING_DEG
}

fn default_tolerance() -> f64 {
    CELL_TOLERANCE_DEG
}

/// Counters describing one interpolation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridStats {
    /// Lattice points generated over the padded bounding box.
    pub lattice_points: usize,
    /// Lattice points inside at least one region.
    pub inside_points: usize,
    /// Distinct parent cells touched by inside points.
    pub parent_cells: usize,
    /// Parent-cell values found by a source point inside the cell.
    pub exact_lookups: usize,
    /// Parent-cell values taken from the nearest source point instead.
    pub nearest_lookups: usize,
    /// Inside points dropped because a value could not be resolved.
    pub dropped_points: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridOutcome {
    pub points: Vec<MatchedPoint>,
    pub stats: GridStats,
}

type CellKey = (i64, i64);

/// Fill the fine lattice over `regions` from coarse CH and SH sources.
pub fn interpolate(ch: &[ChPoint], sh: &[ShPoint], regions: &RegionIndex, spec: &GridSpec) -> GridOutcome {
    let mut stats = GridStats::default();

    let Some(bbox) = regions.bbox() else {
        return GridOutcome { points: Vec::new(), stats };
    };
    let bbox = bbox.padded(spec.padding);

    let lattice = build_lattice(bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon, spec.fine_resolution);
    stats.lattice_points = lattice.len();

    let inside: Vec<GeoPoint> = lattice
        .into_par_iter()
        .filter(|p| regions.contains_any(p))
        .collect();
    stats.inside_points = inside.len();

    let mut cache: HashMap<CellKey, Option<(f64, f64)>> = HashMap::new();
    let mut points = Vec::with_capacity(inside.len());

    for fine in inside {
        let key = parent_key(&fine, spec.parent_resolution);
        let values = *cache.entry(key).or_insert_with(|| {
            let (lat, lon) = cell_origin(key, spec.parent_resolution);
            let ch_value = resolve_cell(ch, lat, lon, spec, |c: &ChPoint| (c.point, c.ch), &mut stats);
            let sh_value = resolve_cell(sh, lat, lon, spec, |s: &ShPoint| (s.point, s.sh), &mut stats);
            ch_value.zip(sh_value)
        });

        match values {
            Some((ch_value, sh_value)) => points.push(MatchedPoint {
                point: fine,
                ch: ch_value,
                sh: sh_value,
            }),
            None => stats.dropped_points += 1,
        }
    }
    stats.parent_cells = cache.len();

    logging::info(
        Stage::Grid,
        None,
        &format!(
            "Grid fill: {} lattice, {} inside, {} cells ({} exact, {} nearest), {} dropped",
            stats.lattice_points,
            stats.inside_points,
            stats.parent_cells,
            stats.exact_lookups,
            stats.nearest_lookups,
            stats.dropped_points
        ),
    );

    GridOutcome { points, stats }
}

/// Lattice coordinates at `step` covering `[min, max]` on both axes.
///
/// The origin is snapped down to a multiple of `step` so the fine lattice
/// lines up with parent cell edges.
pub fn build_lattice(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64, step: f64) -> Vec<GeoPoint> {
    if step.is_nan() || step <= 0.0 || min_lat > max_lat || min_lon > max_lon {
        return Vec::new();
    }
    let lat_range = index_range(min_lat, max_lat, step);
    let lon_range = index_range(min_lon, max_lon, step);

    let mut out = Vec::new();
    for i in lat_range {
        let lat = snap(i as f64 * step);
        for j in lon_range.clone() {
            out.push(GeoPoint {
                lat,
                lon: snap(j as f64 * step),
            });
        }
    }
    out
}

fn index_range(min: f64, max: f64, step: f64) -> std::ops::RangeInclusive<i64> {
    let start = (min / step + INDEX_EPSILON).floor() as i64;
    let end = (max / step + INDEX_EPSILON).floor() as i64;
    start..=end
}

/// Parent cell index of a coordinate: `floor(v / resolution)` per axis.
pub fn parent_key(point: &GeoPoint, resolution: f64) -> (i64, i64) {
    (
        (point.lat / resolution + INDEX_EPSILON).floor() as i64,
        (point.lon / resolution + INDEX_EPSILON).floor() as i64,
    )
}

/// South-west corner of a parent cell.
pub fn cell_origin(key: (i64, i64), resolution: f64) -> (f64, f64) {
    (snap(key.0 as f64 * resolution), snap(key.1 as f64 * resolution))
}

fn resolve_cell<T, F>(
    source: &[T],
    cell_lat: f64,
    cell_lon: f64,
    spec: &GridSpec,
    value_of: F,
    stats: &mut GridStats,
) -> Option<f64>
where
    F: Fn(&T) -> (GeoPoint, f64),
{
    let size = spec.parent_resolution;
    let tol = spec.cell_tolerance;
    let in_cell = |p: &GeoPoint| {
        p.lat >= cell_lat - tol
            && p.lat < cell_lat + size - tol
            && p.lon >= cell_lon - tol
            && p.lon < cell_lon + size - tol
    };

    if let Some(value) = source.iter().map(&value_of).find(|(p, _)| in_cell(p)).map(|(_, v)| v) {
        stats.exact_lookups += 1;
        return Some(value);
    }

    let centre_lat = cell_lat + size / 2.0;
    let centre_lon = cell_lon + size / 2.0;
    let mut best: Option<(f64, f64)> = None;
    for (p, v) in source.iter().map(&value_of) {
        let d2 = (p.lat - centre_lat).powi(2) + (p.lon - centre_lon).powi(2);
        if best.is_none_or(|(bd, _)| d2 < bd) {
            best = Some((d2, v));
        }
    }

    let (_, value) = best?;
    stats.nearest_lookups += 1;
    Some(value)
}

fn snap(v: f64) -> f64 {
    (v * 1e9).round() / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::RegionFeature;

    fn ch(lat: f64, lon: f64, value: f64) -> ChPoint {
        ChPoint {
            point: GeoPoint { lat, lon },
            ch: value,
            cell_id: None,
        }
    }

    fn sh(lat: f64, lon: f64, value: f64) -> ShPoint {
        ShPoint {
            point: GeoPoint { lat, lon },
            sh: value,
            cell_id: None,
        }
    }

    fn region() -> RegionIndex {
        RegionIndex::build(vec![RegionFeature::rectangle("Box", 9.905, 109.905, 10.195, 110.195)]).index
    }

    fn coarse_sources() -> (Vec<ChPoint>, Vec<ShPoint>) {
        let mut chs = Vec::new();
        let mut shs = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                let lat = snap(9.85 + i as f64 * 0.05);
                let lon = snap(109.85 + j as f64 * 0.05);
                chs.push(ch(lat, lon, (i * 10 + j) as f64));
                shs.push(sh(lat, lon, 100.0 + (i * 10 + j) as f64));
            }
        }
        // The cell under test.
        chs.insert(0, ch(10.0, 110.0, 80.0));
        (chs, shs)
    }

    #[test]
    fn test_parent_key_handles_float_drift() {
        assert_eq!(parent_key(&GeoPoint { lat: 10.05, lon: 110.04 }, 0.05), (201, 2200));
        assert_eq!(parent_key(&GeoPoint { lat: 10.049999999, lon: 110.0 }, 0.05), (201, 2200));
        assert_eq!(parent_key(&GeoPoint { lat: 10.04, lon: 110.0 }, 0.05), (200, 2200));
        assert_eq!(parent_key(&GeoPoint { lat: -0.01, lon: 0.0 }, 0.05), (-1, 0));
    }

    #[test]
    fn test_lattice_snaps_origin_and_includes_max() {
        let lattice = build_lattice(10.003, 10.02, 110.0, 110.01, 0.01);
        let lats: Vec<f64> = lattice.iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![10.0, 10.0, 10.01, 10.01, 10.02, 10.02]);
        assert!(build_lattice(1.0, 0.0, 0.0, 1.0, 0.01).is_empty());
    }

    #[test]
    fn test_parent_cell_fills_25_fine_points_with_its_value() {
        let (chs, shs) = coarse_sources();
        let outcome = interpolate(&chs, &shs, &region(), &GridSpec::default());

        let in_cell: Vec<&MatchedPoint> = outcome
            .points
            .iter()
            .filter(|p| parent_key(&p.point, 0.05) == (200, 2200))
            .collect();
        assert_eq!(in_cell.len(), 25, "5×5 fine points per parent cell");
        assert!(in_cell.iter().all(|p| p.ch == 80.0));
        let corner = in_cell.iter().map(|p| (p.point.lat, p.point.lon));
        assert!(corner.clone().any(|c| c == (10.0, 110.0)));
        assert!(corner.clone().any(|c| c == (10.04, 110.04)));
    }

    #[test]
    fn test_region_equal_to_one_parent_cell_yields_25_points() {
        let cell = RegionIndex::build(vec![RegionFeature::rectangle("Cell", 10.0, 110.0, 10.05, 110.05)]).index;
        let outcome = interpolate(&[ch(10.0, 110.0, 80.0)], &[sh(10.0, 110.0, 90.0)], &cell, &GridSpec::default());

        assert_eq!(outcome.points.len(), 25, "south and west edge rows are inside the cell");
        assert_eq!(outcome.stats.parent_cells, 1);
        assert!(outcome.points.iter().all(|p| p.ch == 80.0 && p.sh == 90.0));
        assert!(outcome.points.iter().any(|p| (p.point.lat, p.point.lon) == (10.0, 110.0)));
        assert!(outcome.points.iter().all(|p| p.point.lat < 10.05 && p.point.lon < 110.05));
    }

    #[test]
    fn test_block_fill_uniform_within_every_parent() {
        let (chs, shs) = coarse_sources();
        let outcome = interpolate(&chs, &shs, &region(), &GridSpec::default());
        assert!(!outcome.points.is_empty());

        let mut seen: HashMap<(i64, i64), (f64, f64)> = HashMap::new();
        for p in &outcome.points {
            let key = parent_key(&p.point, 0.05);
            let entry = seen.entry(key).or_insert((p.ch, p.sh));
            assert_eq!(*entry, (p.ch, p.sh), "cell {:?} is not uniform", key);
        }
        assert_eq!(outcome.stats.parent_cells, seen.len());
    }

    #[test]
    fn test_only_points_inside_regions_are_kept() {
        let (chs, shs) = coarse_sources();
        let regions = region();
        let outcome = interpolate(&chs, &shs, &regions, &GridSpec::default());
        assert!(outcome.points.iter().all(|p| regions.contains_any(&p.point)));
        assert!(outcome.stats.lattice_points > outcome.stats.inside_points);
        // 9.91..=10.19 on each axis.
        assert_eq!(outcome.stats.inside_points, 29 * 29);
    }

    #[test]
    fn test_nearest_fallback_when_cell_is_empty() {
        let chs = vec![ch(10.3, 110.3, 42.0), ch(12.0, 112.0, 7.0)];
        let shs = vec![sh(10.3, 110.3, 95.0)];
        let outcome = interpolate(&chs, &shs, &region(), &GridSpec::default());
        assert!(outcome.points.iter().all(|p| p.ch == 42.0 && p.sh == 95.0));
        assert_eq!(outcome.stats.exact_lookups, 0);
        assert!(outcome.stats.nearest_lookups > 0);
    }

    #[test]
    fn test_missing_variable_drops_points() {
        let chs = vec![ch(10.0, 110.0, 42.0)];
        let outcome = interpolate(&chs, &[], &region(), &GridSpec::default());
        assert!(outcome.points.is_empty());
        assert_eq!(outcome.stats.dropped_points, outcome.stats.inside_points);
    }

    #[test]
    fn test_empty_region_index_yields_nothing() {
        let empty = RegionIndex::build(vec![]).index;
        let outcome = interpolate(&[ch(0.0, 0.0, 1.0)], &[sh(0.0, 0.0, 1.0)], &empty, &GridSpec::default());
        assert!(outcome.points.is_empty());
        assert_eq!(outcome.stats.lattice_points, 0);
    }
}
