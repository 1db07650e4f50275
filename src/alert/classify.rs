//! Dry/wet scoring and early-warning categories.
//!
//! Each side (dry, wet) has a fixed list of 18 boolean indicators drawn from
//! global climate drivers, manual per-region inputs and the region flags of
//! the five monitoring periods. The score is the number of indicators that
//! are set; the score maps to a class 0..=3 by fixed bands, and the pair of
//! classes maps to a combined category through a fixed 4×4 table.
//!
//! Missing inputs count as `false`; classification never fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Category, Period, RegionFlags};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Global climate-driver toggles, shared by all regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalIndicators {
    pub el_nino: bool,
    pub la_nina: bool,
    pub iod_positive: bool,
    pub iod_negative: bool,
}

/// Manual per-region inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionToggles {
    /// Consecutive dry days (HTH) at the extreme level.
    pub hth_extreme: bool,
    pub dry_season: bool,
    /// Drought prediction indicator (PDKM).
    pub pdkm: bool,
    pub drought_prediction: bool,
    pub dry_continues_month: bool,
    pub dry_continues_dasarian: bool,

    /// Extreme daily rainfall observed.
    pub extreme_rain: bool,
    pub wet_season: bool,
    /// High-rainfall prediction indicator (PDCHT).
    pub pdcht: bool,
    pub excess_rain_prediction: bool,
    pub wet_continues_month: bool,
    pub wet_continues_dasarian: bool,
}

/// Everything the classifier looks at for one region.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorInputs<'a> {
    pub global: &'a GlobalIndicators,
    pub toggles: &'a RegionToggles,
    pub periods: &'a BTreeMap<Period, RegionFlags>,
}

// ---------------------------------------------------------------------------
// Indicator lists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    ElNino,
    LaNina,
    IodPositive,
    IodNegative,
    HthExtreme,
    DrySeason,
    Pdkm,
    DroughtPrediction,
    DryContinuesMonth,
    DryContinuesDasarian,
    ExtremeRain,
    WetSeason,
    Pdcht,
    ExcessRainPrediction,
    WetContinuesMonth,
    WetContinuesDasarian,
    ChLow(Period),
    ShBn(Period),
    ChHigh(Period),
    ShAn(Period),
}

pub const DRY_INDICATORS: [Indicator; 18] = [
    Indicator::ElNino,
    Indicator::IodPositive,
    Indicator::HthExtreme,
    Indicator::DrySeason,
    Indicator::ChLow(Period::Month),
    Indicator::ChLow(Period::Dasarian),
    Indicator::ShBn(Period::Month),
    Indicator::ShBn(Period::Dasarian),
    Indicator::Pdkm,
    Indicator::ChLow(Period::Forecast1),
    Indicator::ShBn(Period::Forecast1),
    Indicator::ChLow(Period::Forecast2),
    Indicator::ShBn(Period::Forecast2),
    Indicator::ChLow(Period::Forecast3),
    Indicator::ShBn(Period::Forecast3),
    Indicator::DroughtPrediction,
    Indicator::DryContinuesMonth,
    Indicator::DryContinuesDasarian,
];

pub const WET_INDICATORS: [Indicator; 18] = [
    Indicator::LaNina,
    Indicator::IodNegative,
    Indicator::ExtremeRain,
    Indicator::WetSeason,
    Indicator::ChHigh(Period::Month),
    Indicator::ChHigh(Period::Dasarian),
    Indicator::ShAn(Period::Month),
    Indicator::ShAn(Period::Dasarian),
    Indicator::Pdcht,
    Indicator::ChHigh(Period::Forecast1),
    Indicator::ShAn(Period::Forecast1),
    Indicator::ChHigh(Period::Forecast2),
    Indicator::ShAn(Period::Forecast2),
    Indicator::ChHigh(Period::Forecast3),
    Indicator::ShAn(Period::Forecast3),
    Indicator::ExcessRainPrediction,
    Indicator::WetContinuesMonth,
    Indicator::WetContinuesDasarian,
];

impl Indicator {
    pub fn is_set(self, inputs: &IndicatorInputs<'_>) -> bool {
        let g = inputs.global;
        let t = inputs.toggles;
        let flag = |period: Period, pick: fn(&RegionFlags) -> bool| {
            inputs.periods.get(&period).is_some_and(pick)
        };
        match self {
            Indicator::ElNino => g.el_nino,
            Indicator::LaNina => g.la_nina,
            Indicator::IodPositive => g.iod_positive,
            Indicator::IodNegative => g.iod_negative,
            Indicator::HthExtreme => t.hth_extreme,
            Indicator::DrySeason => t.dry_season,
            Indicator::Pdkm => t.pdkm,
            Indicator::DroughtPrediction => t.drought_prediction,
            Indicator::DryContinuesMonth => t.dry_continues_month,
            Indicator::DryContinuesDasarian => t.dry_continues_dasarian,
            Indicator::ExtremeRain => t.extreme_rain,
            Indicator::WetSeason => t.wet_season,
            Indicator::Pdcht => t.pdcht,
            Indicator::ExcessRainPrediction => t.excess_rain_prediction,
            Indicator::WetContinuesMonth => t.wet_continues_month,
            Indicator::WetContinuesDasarian => t.wet_continues_dasarian,
            Indicator::ChLow(p) => flag(p, |f| f.ch_low),
            Indicator::ShBn(p) => flag(p, |f| f.sh_bn),
            Indicator::ChHigh(p) => flag(p, |f| f.ch_high),
            Indicator::ShAn(p) => flag(p, |f| f.sh_an),
        }
    }

    /// Stable label used in reports, e.g. `ch_low[dasarian]`.
    pub fn label(self) -> String {
        match self {
            Indicator::ElNino => "el_nino".to_string(),
            Indicator::LaNina => "la_nina".to_string(),
            Indicator::IodPositive => "iod_positive".to_string(),
            Indicator::IodNegative => "iod_negative".to_string(),
            Indicator::HthExtreme => "hth_extreme".to_string(),
            Indicator::DrySeason => "dry_season".to_string(),
            Indicator::Pdkm => "pdkm".to_string(),
            Indicator::DroughtPrediction => "drought_prediction".to_string(),
            Indicator::DryContinuesMonth => "dry_continues_month".to_string(),
            Indicator::DryContinuesDasarian => "dry_continues_dasarian".to_string(),
            Indicator::ExtremeRain => "extreme_rain".to_string(),
            Indicator::WetSeason => "wet_season".to_string(),
            Indicator::Pdcht => "pdcht".to_string(),
            Indicator::ExcessRainPrediction => "excess_rain_prediction".to_string(),
            Indicator::WetContinuesMonth => "wet_continues_month".to_string(),
            Indicator::WetContinuesDasarian => "wet_continues_dasarian".to_string(),
            Indicator::ChLow(p) => format!("ch_low[{}]", p),
            Indicator::ShBn(p) => format!("sh_bn[{}]", p),
            Indicator::ChHigh(p) => format!("ch_high[{}]", p),
            Indicator::ShAn(p) => format!("sh_an[{}]", p),
        }
    }
}

// ---------------------------------------------------------------------------
// Score → class → category
// ---------------------------------------------------------------------------

/// Lower bounds (inclusive) of classes 3, 2 and 1. Anything lower is class 0.
pub const CLASS_BANDS: [(u32, u8); 3] = [(16, 3), (12, 2), (8, 1)];

/// Combined category indexed by `[dry_class][wet_class]`.
///
/// The worse side wins, except that equal non-zero classes escalate by one
/// step (capped at Awas).
pub const COMBINED_CATEGORY: [[Category; 4]; 4] = [
    [Category::Aman, Category::Waspada, Category::Siaga, Category::Awas],
    [Category::Waspada, Category::Siaga, Category::Siaga, Category::Awas],
    [Category::Siaga, Category::Siaga, Category::Awas, Category::Awas],
    [Category::Awas, Category::Awas, Category::Awas, Category::Awas],
];

pub fn class_for_score(score: u32) -> u8 {
    CLASS_BANDS
        .iter()
        .find(|(lower, _)| score >= *lower)
        .map(|&(_, class)| class)
        .unwrap_or(0)
}

pub fn combined_category(dry_class: u8, wet_class: u8) -> Category {
    COMBINED_CATEGORY[dry_class.min(3) as usize][wet_class.min(3) as usize]
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub region: String,
    pub dry_score: u32,
    pub dry_class: u8,
    pub dry_category: Category,
    pub wet_score: u32,
    pub wet_class: u8,
    pub wet_category: Category,
    /// `(dry_class, dry_class * 10 + wet_class)`.
    pub combined_class: (u8, u8),
    pub combined_category: Category,
    /// Labels of the dry-side indicators that were set.
    pub dry_indicators: Vec<String>,
    /// Labels of the wet-side indicators that were set.
    pub wet_indicators: Vec<String>,
}

fn active(list: &[Indicator], inputs: &IndicatorInputs<'_>) -> Vec<String> {
    list.iter().filter(|i| i.is_set(inputs)).map(|i| i.label()).collect()
}

/// Score and classify a single region.
pub fn classify_region(region: &str, inputs: &IndicatorInputs<'_>) -> ClassificationResult {
    let dry_indicators = active(&DRY_INDICATORS, inputs);
    let wet_indicators = active(&WET_INDICATORS, inputs);

    let dry_score = dry_indicators.len() as u32;
    let wet_score = wet_indicators.len() as u32;
    let dry_class = class_for_score(dry_score);
    let wet_class = class_for_score(wet_score);

    ClassificationResult {
        region: region.to_string(),
        dry_score,
        dry_class,
        dry_category: Category::from_class(dry_class),
        wet_score,
        wet_class,
        wet_category: Category::from_class(wet_class),
        combined_class: (dry_class, dry_class * 10 + wet_class),
        combined_category: combined_category(dry_class, wet_class),
        dry_indicators,
        wet_indicators,
    }
}

/// Classify every region in `regions`.
///
/// `flags` holds the aggregated flags per period, keyed by region. A region
/// missing from a period, or from `toggles`, contributes `false` for those
/// indicators.
pub fn classify_regions(
    regions: &[&str],
    flags: &BTreeMap<Period, BTreeMap<String, RegionFlags>>,
    global: &GlobalIndicators,
    toggles: &BTreeMap<String, RegionToggles>,
) -> BTreeMap<String, ClassificationResult> {
    let none = RegionToggles::default();

    regions
        .iter()
        .map(|&region| {
            let periods: BTreeMap<Period, RegionFlags> = flags
                .iter()
                .filter_map(|(period, by_region)| by_region.get(region).map(|f| (*period, f.clone())))
                .collect();
            let inputs = IndicatorInputs {
                global,
                toggles: toggles.get(region).unwrap_or(&none),
                periods: &periods,
            };
            (region.to_string(), classify_region(region, &inputs))
        })
        .collect()
}
