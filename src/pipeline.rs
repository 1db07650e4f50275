//! Shared run logic: period inputs → matched points → region flags →
//! classification.
//!
//! The core (`run_period`, `classify`, `run`) works on parsed points and a
//! built region index, so it is pure and repeatable: the same inputs always
//! give the same flags and classes. `run_from_config` is the file-reading
//! front-end used by the binary.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::alert::classify::{ClassificationResult, classify_regions};
use crate::analysis::aggregate::{aggregate, by_region};
use crate::analysis::grid::{GridSpec, GridStats, interpolate};
use crate::analysis::matching::{MatchStrategy, match_points};
use crate::config::{IndicatorConfig, InputMode, PeriodConfig, RunConfig};
use crate::ingest::csv_file;
use crate::ingest::{ParsedPoints, Row, parse_ch_points, parse_matched_points, parse_sh_points};
use crate::logging::{self, Stage};
use crate::model::{
    ChPoint, ConfigError, GeometryError, MatchedPoint, Period, RegionError, RegionFlags, ShPoint,
    ThresholdProfile,
};
use crate::regions::{IndexBuild, RegionIndex};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Regions(RegionError),
    /// An input table for `period` could not be read at all.
    Input { period: Period, message: String },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "{}", e),
            PipelineError::Regions(e) => write!(f, "{}", e),
            PipelineError::Input { period, message } => {
                write!(f, "Input error for period {}: {}", period, message)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Config(e)
    }
}

impl From<RegionError> for PipelineError {
    fn from(e: RegionError) -> Self {
        PipelineError::Regions(e)
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Where a period's matched points come from.
#[derive(Debug, Clone)]
pub enum PeriodSource {
    /// Separate CH and SH point sets paired by `strategy`.
    Separate {
        ch: Vec<ChPoint>,
        sh: Vec<ShPoint>,
        strategy: MatchStrategy,
    },
    /// Coarse CH and SH grids block-filled onto the fine lattice.
    Grid {
        ch: Vec<ChPoint>,
        sh: Vec<ShPoint>,
        spec: GridSpec,
    },
    /// Points that already carry both values.
    Combined(Vec<MatchedPoint>),
}

#[derive(Debug, Clone)]
pub struct PeriodInput {
    pub period: Period,
    pub profile: ThresholdProfile,
    pub source: PeriodSource,
    /// Rows dropped while reading and parsing the input tables.
    pub rows_rejected: usize,
}

impl PeriodInput {
    pub fn new(period: Period, profile: ThresholdProfile, source: PeriodSource) -> Self {
        Self {
            period,
            profile,
            source,
            rows_rejected: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodDiagnostics {
    pub rows_rejected: usize,
    /// Points that reached aggregation.
    pub matched_points: usize,
    /// CH points without an SH partner.
    pub unmatched: usize,
    /// Matched points inside no region.
    pub outside_regions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodResult {
    pub period: Period,
    pub profile: String,
    /// One entry per indexed region, in index order.
    pub flags: Vec<RegionFlags>,
    pub diagnostics: PeriodDiagnostics,
}

/// Everything a run computed.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub region_names: Vec<String>,
    pub periods: Vec<PeriodResult>,
    pub classifications: BTreeMap<String, ClassificationResult>,
    pub skipped_regions: Vec<GeometryError>,
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// Produce matched points for one period and aggregate them per region.
pub fn run_period(input: &PeriodInput, regions: &RegionIndex) -> PeriodResult {
    let mut diagnostics = PeriodDiagnostics {
        rows_rejected: input.rows_rejected,
        ..PeriodDiagnostics::default()
    };

    let points = match &input.source {
        PeriodSource::Separate { ch, sh, strategy } => {
            let outcome = match_points(ch, sh, *strategy);
            diagnostics.unmatched = outcome.unmatched;
            outcome.points
        }
        PeriodSource::Grid { ch, sh, spec } => {
            let outcome = interpolate(ch, sh, regions, spec);
            diagnostics.grid = Some(outcome.stats);
            outcome.points
        }
        PeriodSource::Combined(points) => points.clone(),
    };

    diagnostics.matched_points = points.len();
    diagnostics.outside_regions = points.iter().filter(|p| !regions.contains_any(&p.point)).count();
    if diagnostics.outside_regions > 0 {
        logging::debug(
            Stage::Aggregate,
            Some(input.period.label()),
            &format!("{} points fall outside every region", diagnostics.outside_regions),
        );
    }

    let flags = aggregate(&points, regions, &input.profile);

    PeriodResult {
        period: input.period,
        profile: input.profile.name.clone(),
        flags,
        diagnostics,
    }
}

/// Classify every indexed region from the period results.
///
/// Periods that were not run count as all-false for every region.
pub fn classify(
    periods: &[PeriodResult],
    regions: &RegionIndex,
    indicators: &IndicatorConfig,
) -> BTreeMap<String, ClassificationResult> {
    let flags: BTreeMap<Period, BTreeMap<String, RegionFlags>> = periods
        .iter()
        .map(|p| (p.period, by_region(p.flags.clone())))
        .collect();

    for name in indicators.regions.keys() {
        if !regions.region_names().contains(&name.as_str()) {
            logging::warn(Stage::Classify, Some(name), "indicator toggles given for unknown region");
        }
    }

    let results = classify_regions(&regions.region_names(), &flags, &indicators.global, &indicators.regions);

    for result in results.values() {
        logging::debug(
            Stage::Classify,
            Some(&result.region),
            &format!(
                "dry {} ({}), wet {} ({}), combined {}",
                result.dry_score, result.dry_category, result.wet_score, result.wet_category, result.combined_category
            ),
        );
    }
    logging::info(Stage::Classify, None, &format!("Classified {} regions", results.len()));

    results
}

/// Run every period and classify the regions.
pub fn run(inputs: &[PeriodInput], regions: &IndexBuild, indicators: &IndicatorConfig) -> RunOutput {
    let periods: Vec<PeriodResult> = inputs.iter().map(|input| run_period(input, &regions.index)).collect();
    let classifications = classify(&periods, &regions.index, indicators);

    RunOutput {
        region_names: regions.index.region_names().into_iter().map(String::from).collect(),
        periods,
        classifications,
        skipped_regions: regions.skipped.clone(),
    }
}

// ---------------------------------------------------------------------------
// File front-end
// ---------------------------------------------------------------------------

fn read_table(config: &RunConfig, period: Period, path: &Path) -> Result<(Vec<Row>, usize), PipelineError> {
    let resolved = config.resolve(path);
    let table = csv_file::read_rows(&resolved).map_err(|message| PipelineError::Input { period, message })?;
    if table.unreadable > 0 {
        logging::warn(
            Stage::Ingest,
            Some(&resolved.display().to_string()),
            &format!("{} malformed CSV records skipped", table.unreadable),
        );
    }
    Ok((table.rows, table.unreadable))
}

fn report_parse<T>(period: Period, what: &str, parsed: &ParsedPoints<T>) {
    let subject = format!("{}/{}", period, what);
    logging::log_row_summary(
        Stage::Ingest,
        Some(&subject),
        parsed.rows_read(),
        parsed.points.len(),
        parsed.rejected_count(),
    );
    for rejection in &parsed.rejected {
        logging::debug(Stage::Ingest, Some(&subject), &format!("row {}: {}", rejection.index, rejection.reason));
    }
}

fn required<'a>(period: &PeriodConfig, file: &'a Option<std::path::PathBuf>, name: &str) -> Result<&'a Path, PipelineError> {
    file.as_deref().ok_or_else(|| {
        PipelineError::Config(ConfigError::Invalid(format!("period {}: {} is not set", period.period, name)))
    })
}

/// Read and parse the input tables of one configured period.
pub fn load_period_input(config: &RunConfig, period: &PeriodConfig) -> Result<PeriodInput, PipelineError> {
    let profile = config.profile(period.profile_name())?;

    if period.mode == InputMode::Combined {
        let path = required(period, &period.combined_file, "combined_file")?;
        let (rows, unreadable) = read_table(config, period.period, path)?;
        let parsed = parse_matched_points(&rows, &period.combined_columns);
        report_parse(period.period, "combined", &parsed);

        return Ok(PeriodInput {
            period: period.period,
            profile,
            rows_rejected: unreadable + parsed.rejected_count(),
            source: PeriodSource::Combined(parsed.points),
        });
    }

    let (ch_rows, ch_unreadable) = read_table(config, period.period, required(period, &period.ch_file, "ch_file")?)?;
    let (sh_rows, sh_unreadable) = read_table(config, period.period, required(period, &period.sh_file, "sh_file")?)?;
    let ch = parse_ch_points(&ch_rows, &period.ch_columns);
    let sh = parse_sh_points(&sh_rows, &period.sh_columns);
    report_parse(period.period, "ch", &ch);
    report_parse(period.period, "sh", &sh);

    let rows_rejected = ch_unreadable + sh_unreadable + ch.rejected_count() + sh.rejected_count();
    let source = match period.match_strategy() {
        Some(strategy) => PeriodSource::Separate {
            ch: ch.points,
            sh: sh.points,
            strategy,
        },
        None => PeriodSource::Grid {
            ch: ch.points,
            sh: sh.points,
            spec: config.grid,
        },
    };

    Ok(PeriodInput {
        period: period.period,
        profile,
        source,
        rows_rejected,
    })
}

/// Load regions and every configured period, then run.
pub fn run_from_config(config: &RunConfig) -> Result<RunOutput, PipelineError> {
    let regions_path = config.resolve(&config.regions.path);
    let regions = RegionIndex::load(&regions_path, config.regions.name_property.as_deref())?;
    if regions.index.is_empty() {
        logging::warn(Stage::Regions, None, "no usable regions; every classification will be empty");
    }

    let inputs = config
        .periods
        .iter()
        .map(|period| load_period_input(config, period))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(run(&inputs, &regions, &config.indicators))
}
