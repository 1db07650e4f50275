//! Run report: JSON document plus a fixed-width terminal summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::classify::ClassificationResult;
use crate::model::{Category, GeometryError, Period, RegionFlags};
use crate::pipeline::{PeriodDiagnostics, RunOutput};

// ============================================================================
// Report Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub region_count: usize,
    pub periods: Vec<PeriodReport>,
    /// Classification per region, in region index order.
    pub classifications: Vec<ClassificationResult>,
    pub diagnostics: RunDiagnostics,
    pub summary: CategorySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub profile: String,
    pub flags: BTreeMap<String, RegionFlags>,
    pub diagnostics: PeriodDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunDiagnostics {
    pub skipped_regions: Vec<GeometryError>,
    pub rows_rejected: usize,
    pub unmatched_points: usize,
    pub points_outside_regions: usize,
    /// Periods that were not configured; their indicators count as false.
    pub missing_periods: Vec<Period>,
}

/// Number of regions per combined category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub aman: usize,
    pub waspada: usize,
    pub siaga: usize,
    pub awas: usize,
}

impl CategorySummary {
    fn add(&mut self, category: Category) {
        match category {
            Category::Aman => self.aman += 1,
            Category::Waspada => self.waspada += 1,
            Category::Siaga => self.siaga += 1,
            Category::Awas => self.awas += 1,
        }
    }
}

// ============================================================================
// Building
// ============================================================================

pub fn build_report(output: &RunOutput) -> Report {
    build_report_at(output, Utc::now())
}

/// Build a report stamped with `timestamp`.
pub fn build_report_at(output: &RunOutput, timestamp: DateTime<Utc>) -> Report {
    let periods: Vec<PeriodReport> = output
        .periods
        .iter()
        .map(|p| PeriodReport {
            period: p.period,
            profile: p.profile.clone(),
            flags: p.flags.iter().map(|f| (f.region.clone(), f.clone())).collect(),
            diagnostics: p.diagnostics.clone(),
        })
        .collect();

    let classifications: Vec<ClassificationResult> = output
        .region_names
        .iter()
        .filter_map(|name| output.classifications.get(name).cloned())
        .collect();

    let mut summary = CategorySummary::default();
    for c in &classifications {
        summary.add(c.combined_category);
    }

    let diagnostics = RunDiagnostics {
        skipped_regions: output.skipped_regions.clone(),
        rows_rejected: periods.iter().map(|p| p.diagnostics.rows_rejected).sum(),
        unmatched_points: periods.iter().map(|p| p.diagnostics.unmatched).sum(),
        points_outside_regions: periods.iter().map(|p| p.diagnostics.outside_regions).sum(),
        missing_periods: Period::ALL
            .into_iter()
            .filter(|period| !periods.iter().any(|p| p.period == *period))
            .collect(),
    };

    Report {
        generated_at: timestamp.to_rfc3339(),
        region_count: output.region_names.len(),
        periods,
        classifications,
        diagnostics,
        summary,
    }
}

pub fn to_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

// ============================================================================
// Text Table
// ============================================================================

const RULE: &str = "══════════════════════════════════════════════════════════════════════════";

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        let mut short: String = name.chars().take(width.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

/// Fixed-width table of scores and categories, one line per region.
pub fn render_table(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("RAINFALL EARLY WARNING  ({})\n", report.generated_at));
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "{:<28} {:>4} {:<8} {:>4} {:<8} {:>5} {:<8}\n",
        "Region", "Dry", "", "Wet", "", "Code", "Combined"
    ));

    for c in &report.classifications {
        out.push_str(&format!(
            "{:<28} {:>4} {:<8} {:>4} {:<8} {:>5} {:<8}\n",
            truncate(&c.region, 28),
            c.dry_score,
            c.dry_category.to_string(),
            c.wet_score,
            c.wet_category.to_string(),
            format!("{:02}", c.combined_class.1),
            c.combined_category.to_string(),
        ));
    }

    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "Aman: {}  Waspada: {}  Siaga: {}  Awas: {}\n",
        report.summary.aman, report.summary.waspada, report.summary.siaga, report.summary.awas
    ));

    let d = &report.diagnostics;
    out.push_str(&format!(
        "Rows rejected: {}  Unmatched: {}  Outside regions: {}  Regions skipped: {}\n",
        d.rows_rejected,
        d.unmatched_points,
        d.points_outside_regions,
        d.skipped_regions.len()
    ));
    if !d.missing_periods.is_empty() {
        let names: Vec<&str> = d.missing_periods.iter().map(|p| p.label()).collect();
        out.push_str(&format!("Periods not configured: {}\n", names.join(", ")));
    }
    out.push_str(RULE);
    out.push('\n');

    out
}

pub fn print_summary(report: &Report) {
    print!("{}", render_table(report));
}
