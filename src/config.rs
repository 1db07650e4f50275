/// Run configuration for the rainfall monitoring service.
///
/// Loaded from a TOML file (default `rainmon.toml`, overridable through the
/// `RAINMON_CONFIG` environment variable, which may come from a `.env` file).
/// Relative input paths are resolved against the directory of the config
/// file so a run can be started from anywhere.
///
/// ```toml
/// [regions]
/// path = "batas_kabupaten.geojson"
/// name_property = "WADMKK"
///
/// [[periods]]
/// period = "month"
/// mode = "coordinate"
/// ch_file = "ch_bulanan.csv"
/// sh_file = "sh_bulanan.csv"
///
/// [indicators]
/// el_nino = true
///
/// [indicators.regions."Kab. Bogor"]
/// dry_season = true
/// ```

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alert::classify::{GlobalIndicators, RegionToggles};
use crate::analysis::grid::GridSpec;
use crate::analysis::matching::MatchStrategy;
use crate::ingest::{ColumnMapping, CombinedColumns};
use crate::logging::LogLevel;
use crate::model::{ConfigError, MATCH_TOLERANCE_DEG, Period, ThresholdProfile, ValueRange};

pub const DEFAULT_CONFIG_PATH: &str = "rainmon.toml";

pub const ENV_CONFIG: &str = "RAINMON_CONFIG";
pub const ENV_LOG_LEVEL: &str = "RAINMON_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "RAINMON_LOG_FILE";

// ---------------------------------------------------------------------------
// Configuration sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub regions: RegionsConfig,
    #[serde(default)]
    pub grid: GridSpec,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
    #[serde(default)]
    pub periods: Vec<PeriodConfig>,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,

    /// Directory relative paths are resolved against. Set by `load`.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionsConfig {
    /// GeoJSON FeatureCollection with one feature per region.
    pub path: PathBuf,
    /// Feature property holding the region name. Falls back to the usual
    /// Indonesian administrative boundary properties when absent.
    #[serde(default)]
    pub name_property: Option<String>,
}

/// Partial overrides of a built-in threshold profile. Unset fields keep the
/// built-in value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    pub ch_low: Option<ValueRange>,
    pub ch_high: Option<f64>,
    pub sh_bn: Option<ValueRange>,
    pub sh_an: Option<ValueRange>,
    pub area_percent: Option<f64>,
}

impl ProfileOverride {
    pub fn apply(&self, base: ThresholdProfile) -> ThresholdProfile {
        ThresholdProfile {
            name: base.name,
            ch_low: self.ch_low.unwrap_or(base.ch_low),
            ch_high: self.ch_high.unwrap_or(base.ch_high),
            sh_bn: self.sh_bn.unwrap_or(base.sh_bn),
            sh_an: self.sh_an.unwrap_or(base.sh_an),
            area_percent: self.area_percent.unwrap_or(base.area_percent),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    pub monthly: ProfileOverride,
    pub dasarian: ProfileOverride,
}

/// How a period's point set is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Separate CH and SH tables paired by coordinate tolerance.
    #[default]
    Coordinate,
    /// Separate CH and SH tables paired by a shared cell identifier.
    CellId,
    /// Coarse CH and SH grids block-filled onto the fine lattice.
    Grid,
    /// One table already carrying CH and SH side by side.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub period: Period,
    /// Threshold profile name; defaults to the period's usual profile.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub mode: InputMode,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub ch_file: Option<PathBuf>,
    #[serde(default)]
    pub sh_file: Option<PathBuf>,
    #[serde(default)]
    pub combined_file: Option<PathBuf>,
    #[serde(default = "default_ch_columns")]
    pub ch_columns: ColumnMapping,
    #[serde(default = "default_sh_columns")]
    pub sh_columns: ColumnMapping,
    #[serde(default)]
    pub combined_columns: CombinedColumns,
}

fn default_tolerance() -> f64 {
    MATCH_TOLERANCE_DEG
}

fn default_ch_columns() -> ColumnMapping {
    ColumnMapping::new("lat", "lon", "ch")
}

fn default_sh_columns() -> ColumnMapping {
    ColumnMapping::new("lat", "lon", "sh")
}

impl PeriodConfig {
    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or(self.period.default_profile())
    }

    /// Pairing strategy for the two separate-table modes.
    pub fn match_strategy(&self) -> Option<MatchStrategy> {
        match self.mode {
            InputMode::Coordinate => Some(MatchStrategy::Coordinate {
                tolerance: self.tolerance,
            }),
            InputMode::CellId => Some(MatchStrategy::CellId),
            InputMode::Grid | InputMode::Combined => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(flatten)]
    pub global: GlobalIndicators,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionToggles>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> LogLevel {
        LogLevel::parse(&self.level).unwrap_or(LogLevel::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the JSON report is written. Printed to stdout when unset.
    pub report_path: Option<PathBuf>,
    /// Print the text summary table after the run.
    pub print_table: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: None,
            print_table: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl RunConfig {
    /// Parse configuration text. Relative paths resolve against the current
    /// directory.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Apply `RAINMON_LOG_LEVEL` / `RAINMON_LOG_FILE` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Ok(file) = env::var(ENV_LOG_FILE) {
            self.logging.file = Some(file).filter(|f| !f.is_empty());
        }
    }

    /// Resolve a configured path against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// The threshold profile named `name`, with configured overrides applied.
    pub fn profile(&self, name: &str) -> Result<ThresholdProfile, ConfigError> {
        let base = ThresholdProfile::builtin(name)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown threshold profile '{}'", name)))?;
        let overrides = match base.name.as_str() {
            "dasarian" => &self.thresholds.dasarian,
            _ => &self.thresholds.monthly,
        };
        Ok(overrides.apply(base))
    }

    /// Reject configurations that would produce meaningless results.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("regions.path is empty".to_string()));
        }

        validate_grid(&self.grid)?;

        for name in ["monthly", "dasarian"] {
            self.profile(name)?.validate().map_err(ConfigError::Invalid)?;
        }

        let mut seen = HashSet::new();
        for period in &self.periods {
            if !seen.insert(period.period) {
                return Err(ConfigError::Invalid(format!("period {} is configured twice", period.period)));
            }
            self.profile(period.profile_name())?;
            validate_period(period)?;
        }

        Ok(())
    }
}

/// Path of the configuration file: `RAINMON_CONFIG` or `rainmon.toml`.
pub fn config_path_from_env() -> PathBuf {
    env::var(ENV_CONFIG)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn validate_grid(grid: &GridSpec) -> Result<(), ConfigError> {
    if !positive(grid.parent_resolution) || !positive(grid.fine_resolution) {
        return Err(ConfigError::Invalid("grid resolutions must be positive".to_string()));
    }
    if grid.fine_resolution >= grid.parent_resolution {
        return Err(ConfigError::Invalid(format!(
            "grid.fine_resolution ({}) must be smaller than grid.parent_resolution ({})",
            grid.fine_resolution, grid.parent_resolution
        )));
    }
    if !(grid.padding.is_finite() && grid.padding >= 0.0) || !(grid.cell_tolerance.is_finite() && grid.cell_tolerance >= 0.0) {
        return Err(ConfigError::Invalid("grid padding and cell_tolerance must be non-negative".to_string()));
    }
    Ok(())
}

fn validate_period(period: &PeriodConfig) -> Result<(), ConfigError> {
    let missing = |what: &str| ConfigError::Invalid(format!("period {}: {} is required in {:?} mode", period.period, what, period.mode));

    match period.mode {
        InputMode::Combined => {
            if period.combined_file.is_none() {
                return Err(missing("combined_file"));
            }
        }
        InputMode::Coordinate | InputMode::CellId | InputMode::Grid => {
            if period.ch_file.is_none() {
                return Err(missing("ch_file"));
            }
            if period.sh_file.is_none() {
                return Err(missing("sh_file"));
            }
        }
    }

    if period.mode == InputMode::Coordinate && !positive(period.tolerance) {
        return Err(ConfigError::Invalid(format!("period {}: tolerance must be positive", period.period)));
    }
    if period.mode == InputMode::CellId
        && (period.ch_columns.cell_id.is_none() || period.sh_columns.cell_id.is_none())
    {
        return Err(missing("ch_columns.cell_id and sh_columns.cell_id"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
