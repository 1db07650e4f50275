//! Pairing of independently sourced CH and SH point sets.
//!
//! Two strategies:
//! - by shared cell identifier (exact string match)
//! - by coordinate tolerance (first SH point within `ε` on both axes)
//!
//! CH points without a counterpart are dropped; nothing partial is emitted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::logging::{self, Stage};
use crate::model::{ChPoint, MATCH_TOLERANCE_DEG, MatchedPoint, ShPoint};

/// How CH points find their SH partner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MatchStrategy {
    CellId,
    Coordinate { tolerance: f64 },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy::Coordinate {
            tolerance: MATCH_TOLERANCE_DEG,
        }
    }
}

/// Matched points plus how many CH points found no partner.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub points: Vec<MatchedPoint>,
    pub unmatched: usize,
}

/// Pair CH points with SH points using the given strategy.
pub fn match_points(ch: &[ChPoint], sh: &[ShPoint], strategy: MatchStrategy) -> MatchOutcome {
    let points = match strategy {
        MatchStrategy::CellId => match_by_cell_id(ch, sh),
        MatchStrategy::Coordinate { tolerance } => match_by_coordinate(ch, sh, tolerance),
    };
    let unmatched = ch.len() - points.len();
    logging::log_row_summary(Stage::Matching, None, ch.len(), points.len(), unmatched);
    MatchOutcome { points, unmatched }
}

/// Match on `cell_id`. When several SH points share an id the first one wins.
pub fn match_by_cell_id(ch: &[ChPoint], sh: &[ShPoint]) -> Vec<MatchedPoint> {
    let mut by_id: HashMap<&str, &ShPoint> = HashMap::with_capacity(sh.len());
    for s in sh {
        if let Some(id) = s.cell_id.as_deref().filter(|id| !id.is_empty()) {
            by_id.entry(id).or_insert(s);
        }
    }

    ch.iter()
        .filter_map(|c| {
            let id = c.cell_id.as_deref().filter(|id| !id.is_empty())?;
            let s = by_id.get(id)?;
            Some(MatchedPoint {
                point: c.point,
                ch: c.ch,
                sh: s.sh,
            })
        })
        .collect()
}

/// Match on coordinates: the first SH point (in input order) with
/// `|Δlat| < tolerance` and `|Δlon| < tolerance`.
pub fn match_by_coordinate(ch: &[ChPoint], sh: &[ShPoint], tolerance: f64) -> Vec<MatchedPoint> {
    ch.iter()
        .filter_map(|c| {
            let s = sh.iter().find(|s| {
                (s.point.lat - c.point.lat).abs() < tolerance
                    && (s.point.lon - c.point.lon).abs() < tolerance
            })?;
            Some(MatchedPoint {
                point: c.point,
                ch: c.ch,
                sh: s.sh,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;

    fn ch(lat: f64, lon: f64, value: f64, id: Option<&str>) -> ChPoint {
        ChPoint {
            point: GeoPoint { lat, lon },
            ch: value,
            cell_id: id.map(str::to_string),
        }
    }

    fn sh(lat: f64, lon: f64, value: f64, id: Option<&str>) -> ShPoint {
        ShPoint {
            point: GeoPoint { lat, lon },
            sh: value,
            cell_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_coordinate_match_within_tolerance() {
        let chs = vec![ch(10.0001, 110.0001, 20.0, None)];
        let shs = vec![sh(10.0, 110.0, 90.0, None)];

        let matched = match_by_coordinate(&chs, &shs, 0.001);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].ch, 20.0);
        assert_eq!(matched[0].sh, 90.0);
        assert_eq!(matched[0].point.lat, 10.0001, "CH coordinates are kept");

        let strict = match_by_coordinate(&chs, &shs, 0.00001);
        assert!(strict.is_empty(), "0.0001° apart must not match under 0.00001°");
    }

    #[test]
    fn test_coordinate_match_takes_first_candidate() {
        let chs = vec![ch(0.0, 0.0, 1.0, None)];
        let shs = vec![
            sh(5.0, 5.0, 10.0, None),
            sh(0.0005, 0.0, 20.0, None),
            sh(0.0, 0.0, 30.0, None),
        ];
        let matched = match_by_coordinate(&chs, &shs, 0.001);
        assert_eq!(matched[0].sh, 20.0, "first in SH order wins, not the closest");
    }

    #[test]
    fn test_tolerance_is_strict() {
        let chs = vec![ch(0.0, 0.0, 1.0, None)];
        let shs = vec![sh(0.5, 0.0, 10.0, None)];
        assert!(match_by_coordinate(&chs, &shs, 0.5).is_empty());
    }

    #[test]
    fn test_cell_id_match_drops_missing_ids() {
        let chs = vec![
            ch(0.0, 0.0, 1.0, Some("A")),
            ch(0.0, 0.0, 2.0, None),
            ch(0.0, 0.0, 3.0, Some("Z")),
            ch(0.0, 0.0, 4.0, Some("")),
        ];
        let shs = vec![
            sh(9.0, 9.0, 100.0, Some("A")),
            sh(9.0, 9.0, 200.0, Some("A")),
            sh(9.0, 9.0, 300.0, Some("")),
        ];
        let outcome = match_points(&chs, &shs, MatchStrategy::CellId);
        assert_eq!(outcome.points.len(), 1);
        assert_eq!(outcome.points[0].sh, 100.0, "first SH with the id wins");
        assert_eq!(outcome.unmatched, 3);
    }

    #[test]
    fn test_default_strategy_is_100m_coordinate_match() {
        assert_eq!(
            MatchStrategy::default(),
            MatchStrategy::Coordinate { tolerance: 0.001 }
        );
    }
}
