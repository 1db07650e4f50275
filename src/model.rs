/// Core data types for the rainfall anomaly monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// geo-tagged CH/SH observations, matched points, per-region flags, the
/// threshold configuration and the severity categories. It contains no I/O
/// and no algorithmic logic beyond small constructors and validators.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Grid resolution constants
// ---------------------------------------------------------------------------

/// Resolution of the coarse source grid, in degrees.
pub const PARENT_RESOLUTION_DEG: f64 = 0.05;

/// Resolution of the dense target grid, in degrees.
pub const FINE_RESOLUTION_DEG: f64 = 0.01;

/// Margin added around the region bounding box before laying out the lattice.
pub const GRID_PADDING_DEG: f64 = 0.05;

/// Floating-point slack used when testing parent-cell membership.
pub const CELL_TOLERANCE_DEG: f64 = 0.001;

/// Default coordinate tolerance for CH/SH matching (about 100 m).
pub const MATCH_TOLERANCE_DEG: f64 = 0.001;

/// Percentage of a region's points a bucket must strictly exceed to raise its flag.
pub const DEFAULT_AREA_PERCENT: f64 = 10.0;

// ---------------------------------------------------------------------------
// Point types
// ---------------------------------------------------------------------------

/// A WGS84 coordinate. Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Builds a validated coordinate. Returns `None` when either axis is
    /// non-finite or out of range.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }
}

/// A rainfall (Curah Hujan) observation, in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChPoint {
    pub point: GeoPoint,
    pub ch: f64,
    pub cell_id: Option<String>,
}

/// A rain-character (Sifat Hujan) observation, in percent of normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShPoint {
    pub point: GeoPoint,
    pub sh: f64,
    pub cell_id: Option<String>,
}

/// A location carrying both a CH and an SH value.
///
/// Produced by the matcher, the grid interpolator, or directly from a
/// combined table. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedPoint {
    pub point: GeoPoint,
    pub ch: f64,
    pub sh: f64,
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// An inclusive numeric range `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub lo: f64,
    pub hi: f64,
}

impl ValueRange {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// Threshold configuration for one kind of monitoring period.
///
/// `ch_high` and `sh_an.lo` are lower bounds only; `sh_an.hi` is kept for
/// reporting and is not used when counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub name: String,
    pub ch_low: ValueRange,
    pub ch_high: f64,
    pub sh_bn: ValueRange,
    pub sh_an: ValueRange,
    /// A flag is raised when its bucket holds strictly more than this
    /// percentage of the region's points.
    #[serde(default = "default_area_percent")]
    pub area_percent: f64,
}

fn default_area_percent() -> f64 {
    DEFAULT_AREA_PERCENT
}

// ---------------------------------------------------------------------------
// Aggregation output
// ---------------------------------------------------------------------------

/// Per-region bucket percentages and flags for one monitoring period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFlags {
    pub region: String,
    pub n_total: u32,
    pub ch_low_pct: f64,
    pub ch_high_pct: f64,
    pub sh_bn_pct: f64,
    pub sh_an_pct: f64,
    pub ch_low: bool,
    pub ch_high: bool,
    pub sh_bn: bool,
    pub sh_an: bool,
}

impl RegionFlags {
    /// Flags for a region that received no points: all counts zero, all flags false.
    pub fn empty(region: &str) -> Self {
        Self {
            region: region.to_string(),
            n_total: 0,
            ch_low_pct: 0.0,
            ch_high_pct: 0.0,
            sh_bn_pct: 0.0,
            sh_an_pct: 0.0,
            ch_low: false,
            ch_high: false,
            sh_bn: false,
            sh_an: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Monitoring periods
// ---------------------------------------------------------------------------

/// The monitoring periods a classification draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Current month (observed).
    Month,
    /// Current dasarian (observed).
    Dasarian,
    /// Forecast for the next month.
    Forecast1,
    /// Forecast for two months ahead.
    Forecast2,
    /// Forecast for three months ahead.
    Forecast3,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::Month,
        Period::Dasarian,
        Period::Forecast1,
        Period::Forecast2,
        Period::Forecast3,
    ];

    /// Name of the built-in threshold profile this period uses by default.
    pub fn default_profile(self) -> &'static str {
        match self {
            Period::Dasarian => "dasarian",
            _ => "monthly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::Month => "month",
            Period::Dasarian => "dasarian",
            Period::Forecast1 => "forecast_1",
            Period::Forecast2 => "forecast_2",
            Period::Forecast3 => "forecast_3",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Severity categories
// ---------------------------------------------------------------------------

/// Early-warning categories, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Aman,
    Waspada,
    Siaga,
    Awas,
}

impl Category {
    /// Ordinal class 0..=3.
    pub fn class(self) -> u8 {
        match self {
            Category::Aman => 0,
            Category::Waspada => 1,
            Category::Siaga => 2,
            Category::Awas => 3,
        }
    }

    /// Inverse of [`Category::class`]; classes above 3 saturate at `Awas`.
    pub fn from_class(class: u8) -> Self {
        match class {
            0 => Category::Aman,
            1 => Category::Waspada,
            2 => Category::Siaga,
            _ => Category::Awas,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Aman => write!(f, "Aman"),
            Category::Waspada => write!(f, "Waspada"),
            Category::Siaga => write!(f, "Siaga"),
            Category::Awas => write!(f, "Awas"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Whole-document failures when loading region boundaries.
#[derive(Debug, PartialEq)]
pub enum RegionError {
    /// The boundary file could not be read.
    Io(String),
    /// The document is not valid JSON.
    Json(String),
    /// The document is JSON but not a GeoJSON FeatureCollection.
    NotFeatureCollection,
}

impl std::fmt::Display for RegionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionError::Io(msg) => write!(f, "Boundary I/O error: {}", msg),
            RegionError::Json(msg) => write!(f, "Boundary JSON error: {}", msg),
            RegionError::NotFeatureCollection => {
                write!(f, "Boundary document is not a GeoJSON FeatureCollection")
            }
        }
    }
}

impl std::error::Error for RegionError {}

/// A single region feature whose geometry could not be turned into polygons.
///
/// The feature is skipped; the rest of the index is still built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryError {
    pub region: String,
    pub reason: String,
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid geometry for region {}: {}", self.region, self.reason)
    }
}

impl std::error::Error for GeometryError {}

/// Errors raised while loading or validating the run configuration.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
