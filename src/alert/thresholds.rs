//! Rainfall threshold profiles and per-region flag evaluation.
//!
//! Two profiles are in use. Monthly periods (and the monthly forecasts) cut
//! CH at 100 mm / 301 mm; dasarian (10-day) periods cut at 49 mm / 151 mm.
//! SH bands are shared: below normal is 0–84 %, above normal is 116 % and up.
//!
//! A flag is raised when its bucket holds strictly more than
//! `area_percent` (10 %) of the region's points.

use crate::model::{DEFAULT_AREA_PERCENT, MatchedPoint, RegionFlags, ThresholdProfile, ValueRange};

/// Upper end reported for the open-ended SH above-normal band.
pub const SH_AN_REPORTED_MAX: f64 = 999.0;

impl ThresholdProfile {
    /// Monthly profile: CH low 0–100 mm, CH high ≥ 301 mm.
    pub fn monthly() -> Self {
        Self {
            name: "monthly".to_string(),
            ch_low: ValueRange::new(0.0, 100.0),
            ch_high: 301.0,
            sh_bn: ValueRange::new(0.0, 84.0),
            sh_an: ValueRange::new(116.0, SH_AN_REPORTED_MAX),
            area_percent: DEFAULT_AREA_PERCENT,
        }
    }

    /// Dasarian profile: CH low 0–49 mm, CH high ≥ 151 mm.
    pub fn dasarian() -> Self {
        Self {
            name: "dasarian".to_string(),
            ch_low: ValueRange::new(0.0, 49.0),
            ch_high: 151.0,
            ..Self::monthly()
        }
    }

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "monthly" | "bulanan" => Some(Self::monthly()),
            "dasarian" => Some(Self::dasarian()),
            _ => None,
        }
    }

    /// Checks that ranges are ordered and the area percentage is usable.
    pub fn validate(&self) -> Result<(), String> {
        for (label, range) in [("ch_low", self.ch_low), ("sh_bn", self.sh_bn), ("sh_an", self.sh_an)] {
            if !(range.lo.is_finite() && range.hi.is_finite()) || range.lo > range.hi {
                return Err(format!("profile {}: {} range [{}, {}] is invalid", self.name, label, range.lo, range.hi));
            }
        }
        if !self.ch_high.is_finite() {
            return Err(format!("profile {}: ch_high must be finite", self.name));
        }
        if !(0.0..100.0).contains(&self.area_percent) {
            return Err(format!("profile {}: area_percent must be in [0, 100)", self.name));
        }
        Ok(())
    }
}

/// `true` iff `percent` strictly exceeds `limit`.
pub fn exceeds(percent: f64, limit: f64) -> bool {
    percent > limit
}

/// Share of `count` in `total`, in percent. `total` must be non-zero.
fn percent(count: usize, total: usize) -> f64 {
    count as f64 * 100.0 / total as f64
}

/// Compute bucket percentages and flags for the points of one region.
///
/// An empty point set gives all-zero, all-false flags.
pub fn evaluate_region(region: &str, points: &[&MatchedPoint], profile: &ThresholdProfile) -> RegionFlags {
    let n_total = points.len();
    if n_total == 0 {
        return RegionFlags::empty(region);
    }

    let ch_low = points.iter().filter(|p| profile.ch_low.contains(p.ch)).count();
    let ch_high = points.iter().filter(|p| p.ch >= profile.ch_high).count();
    let sh_bn = points.iter().filter(|p| profile.sh_bn.contains(p.sh)).count();
    let sh_an = points.iter().filter(|p| p.sh >= profile.sh_an.lo).count();

    let ch_low_pct = percent(ch_low, n_total);
    let ch_high_pct = percent(ch_high, n_total);
    let sh_bn_pct = percent(sh_bn, n_total);
    let sh_an_pct = percent(sh_an, n_total);

    RegionFlags {
        region: region.to_string(),
        n_total: n_total as u32,
        ch_low_pct,
        ch_high_pct,
        sh_bn_pct,
        sh_an_pct,
        ch_low: exceeds(ch_low_pct, profile.area_percent),
        ch_high: exceeds(ch_high_pct, profile.area_percent),
        sh_bn: exceeds(sh_bn_pct, profile.area_percent),
        sh_an: exceeds(sh_an_pct, profile.area_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;

    fn pts(values: &[(f64, f64)]) -> Vec<MatchedPoint> {
        values
            .iter()
            .map(|&(ch, sh)| MatchedPoint {
                point: GeoPoint { lat: 0.0, lon: 0.0 },
                ch,
                sh,
            })
            .collect()
    }

    #[test]
    fn test_three_point_scenario_monthly() {
        let points = pts(&[(50.0, 100.0), (50.0, 100.0), (500.0, 100.0)]);
        let refs: Vec<&MatchedPoint> = points.iter().collect();
        let flags = evaluate_region("R", &refs, &ThresholdProfile::monthly());

        assert_eq!(flags.n_total, 3);
        assert!((flags.ch_low_pct - 66.666).abs() < 0.01);
        assert!((flags.ch_high_pct - 33.333).abs() < 0.01);
        assert!(flags.ch_low);
        assert!(flags.ch_high);
        assert!(!flags.sh_bn, "SH 100 % is normal");
        assert!(!flags.sh_an);
    }

    #[test]
    fn test_exactly_ten_percent_does_not_flag() {
        // 1 of 10 points is low: exactly 10.0 %.
        let mut values = vec![(200.0, 100.0); 9];
        values.push((10.0, 100.0));
        let points = pts(&values);
        let refs: Vec<&MatchedPoint> = points.iter().collect();
        let flags = evaluate_region("R", &refs, &ThresholdProfile::monthly());
        assert_eq!(flags.ch_low_pct, 10.0);
        assert!(!flags.ch_low, "10.0 % must not exceed 10 %");
    }

    #[test]
    fn test_just_over_ten_percent_flags() {
        // 1001 of 10000 points: 10.01 %.
        let mut values = vec![(100.0, 60.0); 1001];
        values.extend(std::iter::repeat_n((100.0, 100.0), 8999));
        let points = pts(&values);
        let refs: Vec<&MatchedPoint> = points.iter().collect();
        let flags = evaluate_region("R", &refs, &ThresholdProfile::monthly());
        assert!((flags.sh_bn_pct - 10.01).abs() < 1e-9);
        assert!(flags.sh_bn);
    }

    #[test]
    fn test_dasarian_profile_uses_lower_cut_lines() {
        let points = pts(&[(60.0, 120.0), (160.0, 120.0)]);
        let refs: Vec<&MatchedPoint> = points.iter().collect();

        let dasarian = evaluate_region("R", &refs, &ThresholdProfile::dasarian());
        assert!(!dasarian.ch_low, "60 mm is above the dasarian low band");
        assert!(dasarian.ch_high, "160 mm ≥ 151 mm");
        assert!(dasarian.sh_an);

        let monthly = evaluate_region("R", &refs, &ThresholdProfile::monthly());
        assert!(monthly.ch_low, "60 mm is inside the monthly low band");
        assert!(!monthly.ch_high);
    }

    #[test]
    fn test_empty_region_is_all_zero() {
        let flags = evaluate_region("Kosong", &[], &ThresholdProfile::monthly());
        assert_eq!(flags, RegionFlags::empty("Kosong"));
    }

    #[test]
    fn test_builtin_lookup_and_validation() {
        assert_eq!(ThresholdProfile::builtin("Dasarian"), Some(ThresholdProfile::dasarian()));
        assert!(ThresholdProfile::builtin("weekly").is_none());
        assert!(ThresholdProfile::monthly().validate().is_ok());

        let mut broken = ThresholdProfile::monthly();
        broken.ch_low = ValueRange::new(100.0, 0.0);
        assert!(broken.validate().is_err());
    }
}
