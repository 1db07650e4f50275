//! Per-region aggregation of matched points against a threshold profile.
//!
//! Each region is evaluated independently against its own geometry, so a
//! point inside two overlapping regions counts towards both. Regions are
//! processed in parallel; output order follows the region index.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::alert::thresholds::evaluate_region;
use crate::logging::{self, Stage};
use crate::model::{MatchedPoint, RegionFlags, ThresholdProfile};
use crate::regions::RegionIndex;

/// Flags for every region in `regions`, in index order.
pub fn aggregate(points: &[MatchedPoint], regions: &RegionIndex, profile: &ThresholdProfile) -> Vec<RegionFlags> {
    let flags: Vec<RegionFlags> = regions
        .features()
        .par_iter()
        .map(|feature| {
            let inside: Vec<&MatchedPoint> = points.iter().filter(|p| feature.contains(&p.point)).collect();
            evaluate_region(&feature.name, &inside, profile)
        })
        .collect();

    for f in flags.iter().filter(|f| f.n_total == 0) {
        logging::debug(Stage::Aggregate, Some(&f.region), "no points inside region");
    }
    logging::info(
        Stage::Aggregate,
        None,
        &format!(
            "Aggregated {} points over {} regions with profile {}",
            points.len(),
            flags.len(),
            profile.name
        ),
    );

    flags
}

/// Key aggregated flags by region name.
pub fn by_region(flags: Vec<RegionFlags>) -> BTreeMap<String, RegionFlags> {
    flags.into_iter().map(|f| (f.region.clone(), f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;
    use crate::regions::RegionFeature;

    fn mp(lat: f64, lon: f64, ch: f64, sh: f64) -> MatchedPoint {
        MatchedPoint {
            point: GeoPoint { lat, lon },
            ch,
            sh,
        }
    }

    fn index() -> RegionIndex {
        RegionIndex::build(vec![
            RegionFeature::rectangle("North", 1.0, 0.0, 2.0, 1.0),
            RegionFeature::rectangle("South", 0.0, 0.0, 1.0, 1.0),
            RegionFeature::rectangle("Empty", 5.0, 5.0, 6.0, 6.0),
        ])
        .index
    }

    #[test]
    fn test_points_are_counted_per_region() {
        let points = vec![
            mp(1.5, 0.5, 50.0, 60.0),
            mp(1.6, 0.5, 50.0, 100.0),
            mp(0.5, 0.5, 400.0, 130.0),
            mp(9.0, 9.0, 50.0, 60.0),
        ];
        let flags = aggregate(&points, &index(), &ThresholdProfile::monthly());

        let names: Vec<&str> = flags.iter().map(|f| f.region.as_str()).collect();
        assert_eq!(names, vec!["North", "South", "Empty"], "index order is kept");

        assert_eq!(flags[0].n_total, 2);
        assert_eq!(flags[0].ch_low_pct, 100.0);
        assert_eq!(flags[0].sh_bn_pct, 50.0);
        assert!(flags[0].ch_low && flags[0].sh_bn && !flags[0].ch_high);

        assert_eq!(flags[1].n_total, 1);
        assert!(flags[1].ch_high && flags[1].sh_an);
    }

    #[test]
    fn test_region_without_points_is_all_false() {
        let flags = aggregate(&[mp(0.5, 0.5, 50.0, 60.0)], &index(), &ThresholdProfile::monthly());
        assert_eq!(flags[2], RegionFlags::empty("Empty"));
    }

    #[test]
    fn test_n_total_matches_independent_containment_count() {
        let regions = index();
        let points: Vec<MatchedPoint> = (0..40)
            .map(|i| mp(i as f64 * 0.05 + 0.01, 0.5, 10.0, 90.0))
            .collect();
        let flags = aggregate(&points, &regions, &ThresholdProfile::dasarian());

        for (feature, f) in regions.features().iter().zip(&flags) {
            let expected = points.iter().filter(|p| feature.contains(&p.point)).count();
            assert_eq!(f.n_total as usize, expected, "conservation for {}", feature.name);
        }
    }

    #[test]
    fn test_border_points_count_once_across_adjacent_regions() {
        let points: Vec<MatchedPoint> = (0..5).map(|i| mp(1.0, i as f64 * 0.2, 10.0, 90.0)).collect();
        let flags = aggregate(&points, &index(), &ThresholdProfile::monthly());

        let total: u32 = flags.iter().map(|f| f.n_total).sum();
        assert_eq!(total, 5, "every border point lands in exactly one region");
        assert_eq!(flags[0].n_total, 5, "lat 1.0 is the south edge of North");
    }

    #[test]
    fn test_by_region_keys_on_name() {
        let map = by_region(aggregate(&[], &index(), &ThresholdProfile::monthly()));
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("South"));
    }
}
