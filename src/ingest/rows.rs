//! Point parsing and validation.
//!
//! Turns uniform string-keyed rows (whatever the CSV/XLSX front-end produced)
//! into typed points. Bad rows are skipped, never fatal: every skipped row is
//! recorded as a `RowRejection` so callers can count and report them.
//!
//! - column lookup is case-insensitive and ignores a UTF-8 BOM
//! - numbers accept a decimal comma (`"12,5"`) when no dot is present
//! - coordinates outside WGS84 bounds reject the row
//! - input order is preserved and duplicates are kept

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ChPoint, GeoPoint, MatchedPoint, ShPoint};

/// One input row: column name → raw cell text.
pub type Row = HashMap<String, String>;

/// Which columns hold the coordinates and the single measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_lat")]
    pub lat: String,
    #[serde(default = "default_lon")]
    pub lon: String,
    pub value: String,
    #[serde(default)]
    pub cell_id: Option<String>,
}

impl ColumnMapping {
    pub fn new(lat: &str, lon: &str, value: &str) -> Self {
        Self {
            lat: lat.to_string(),
            lon: lon.to_string(),
            value: value.to_string(),
            cell_id: None,
        }
    }

    pub fn with_cell_id(mut self, column: &str) -> Self {
        self.cell_id = Some(column.to_string());
        self
    }
}

/// Columns of a table that carries CH and SH side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedColumns {
    #[serde(default = "default_lat")]
    pub lat: String,
    #[serde(default = "default_lon")]
    pub lon: String,
    #[serde(default = "default_ch")]
    pub ch: String,
    #[serde(default = "default_sh")]
    pub sh: String,
}

impl Default for CombinedColumns {
    fn default() -> Self {
        Self {
            lat: default_lat(),
            lon: default_lon(),
            ch: default_ch(),
            sh: default_sh(),
        }
    }
}

fn default_lat() -> String {
    "lat".to_string()
}

fn default_lon() -> String {
    "lon".to_string()
}

fn default_ch() -> String {
    "ch".to_string()
}

fn default_sh() -> String {
    "sh".to_string()
}

/// A row that was dropped during parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    /// Zero-based position of the row in the input sequence.
    pub index: usize,
    pub reason: String,
}

/// Parse output: accepted points in input order plus the rows that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPoints<T> {
    pub points: Vec<T>,
    pub rejected: Vec<RowRejection>,
}

impl<T> ParsedPoints<T> {
    pub fn rows_read(&self) -> usize {
        self.points.len() + self.rejected.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Parse rainfall rows.
pub fn parse_ch_points(rows: &[Row], columns: &ColumnMapping) -> ParsedPoints<ChPoint> {
    parse_rows(rows, |row| {
        let point = parse_coordinate(row, &columns.lat, &columns.lon)?;
        let ch = parse_number(row, &columns.value)?;
        Ok(ChPoint {
            point,
            ch,
            cell_id: parse_cell_id(row, columns.cell_id.as_deref()),
        })
    })
}

/// Parse rain-character rows.
pub fn parse_sh_points(rows: &[Row], columns: &ColumnMapping) -> ParsedPoints<ShPoint> {
    parse_rows(rows, |row| {
        let point = parse_coordinate(row, &columns.lat, &columns.lon)?;
        let sh = parse_number(row, &columns.value)?;
        Ok(ShPoint {
            point,
            sh,
            cell_id: parse_cell_id(row, columns.cell_id.as_deref()),
        })
    })
}

/// Parse rows that already carry both CH and SH.
pub fn parse_matched_points(rows: &[Row], columns: &CombinedColumns) -> ParsedPoints<MatchedPoint> {
    parse_rows(rows, |row| {
        let point = parse_coordinate(row, &columns.lat, &columns.lon)?;
        let ch = parse_number(row, &columns.ch)?;
        let sh = parse_number(row, &columns.sh)?;
        Ok(MatchedPoint { point, ch, sh })
    })
}

fn parse_rows<T, F>(rows: &[Row], mut parse: F) -> ParsedPoints<T>
where
    F: FnMut(&Row) -> Result<T, String>,
{
    let mut points = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        if is_empty_row(row) {
            rejected.push(RowRejection {
                index,
                reason: "Empty row.".to_string(),
            });
            continue;
        }

        match parse(row) {
            Ok(point) => points.push(point),
            Err(reason) => rejected.push(RowRejection { index, reason }),
        }
    }

    ParsedPoints { points, rejected }
}

fn is_empty_row(row: &Row) -> bool {
    row.values().all(|v| v.trim().is_empty())
}

fn parse_coordinate(row: &Row, lat_column: &str, lon_column: &str) -> Result<GeoPoint, String> {
    let lat = parse_number(row, lat_column)?;
    let lon = parse_number(row, lon_column)?;
    GeoPoint::new(lat, lon).ok_or_else(|| format!("Coordinate out of range: lat={lat}, lon={lon}."))
}

fn parse_cell_id(row: &Row, column: Option<&str>) -> Option<String> {
    let column = column?;
    get_field(row, column).map(str::to_string)
}

fn parse_number(row: &Row, column: &str) -> Result<f64, String> {
    let raw = get_field(row, column).ok_or_else(|| format!("Missing value: `{column}`."))?;
    let value = parse_decimal(raw).ok_or_else(|| format!("Invalid number in `{column}`: '{raw}'."))?;
    if !value.is_finite() {
        return Err(format!("Non-finite number in `{column}`."));
    }
    Ok(value)
}

/// Looks up a column by name, first exactly, then case-insensitively.
/// When several headers differ only in case, the lexically smallest wins.
/// Blank cells count as missing.
fn get_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    let value = match row.get(column) {
        Some(v) => Some(v),
        None => {
            let wanted = normalize_header_name(column);
            row.iter()
                .filter(|(k, _)| normalize_header_name(k) == wanted)
                .min_by(|a, b| a.0.cmp(b.0))
                .map(|(_, v)| v)
        }
    };
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_decimal(s: &str) -> Option<f64> {
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    if !s.contains('.') && s.matches(',').count() == 1 {
        return s.replace(',', ".").parse::<f64>().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_case_colliding_headers_resolve_the_same_way_every_time() {
        let mapping = ColumnMapping::new("lat", "lon", "ch");
        for _ in 0..50 {
            let rows = vec![row(&[("LAT", "1"), ("Lat", "2"), ("lon", "106.8"), ("ch", "10")])];
            let parsed = parse_ch_points(&rows, &mapping);
            assert_eq!(parsed.points.len(), 1);
            assert_eq!(parsed.points[0].point.lat, 1.0, "\"LAT\" sorts before \"Lat\"");
        }

        let exact = vec![row(&[("LAT", "1"), ("lat", "3"), ("lon", "106.8"), ("ch", "10")])];
        assert_eq!(parse_ch_points(&exact, &mapping).points[0].point.lat, 3.0, "an exact header match wins");
    }

    #[test]
    fn test_valid_rows_parse_in_order() {
        let rows = vec![
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "120")]),
            row(&[("lat", "-6.6"), ("lon", "106.9"), ("ch", "80.5")]),
        ];
        let parsed = parse_ch_points(&rows, &ColumnMapping::new("lat", "lon", "ch"));
        assert_eq!(parsed.points.len(), 2);
        assert_eq!(parsed.points[0].ch, 120.0);
        assert_eq!(parsed.points[1].point.lat, -6.6);
        assert_eq!(parsed.rejected_count(), 0);
    }

    #[test]
    fn test_malformed_rows_are_dropped_not_fatal() {
        let rows = vec![
            row(&[("lat", "abc"), ("lon", "106.8"), ("ch", "120")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "")]),
            row(&[("lat", ""), ("lon", ""), ("ch", "")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "NaN")]),
            row(&[("lat", "95"), ("lon", "106.8"), ("ch", "10")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "10")]),
        ];
        let parsed = parse_ch_points(&rows, &ColumnMapping::new("lat", "lon", "ch"));
        assert_eq!(parsed.points.len(), 1, "only the last row is valid");
        assert_eq!(parsed.rejected_count(), 5);
        assert_eq!(parsed.rows_read(), 6);
        let indices: Vec<usize> = parsed.rejected.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicate_coordinates_are_kept() {
        let rows = vec![
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("sh", "90")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("sh", "110")]),
        ];
        let parsed = parse_sh_points(&rows, &ColumnMapping::new("lat", "lon", "sh"));
        assert_eq!(parsed.points.len(), 2);
    }

    #[test]
    fn test_column_lookup_ignores_case_and_bom() {
        let rows = vec![row(&[("\u{feff}LAT", "-6.5"), ("Lon", "106.8"), ("CH", "12,5")])];
        let parsed = parse_ch_points(&rows, &ColumnMapping::new("lat", "lon", "ch"));
        assert_eq!(parsed.points.len(), 1);
        assert_eq!(parsed.points[0].ch, 12.5, "decimal comma should be accepted");
    }

    #[test]
    fn test_cell_id_is_optional_and_blank_means_none() {
        let columns = ColumnMapping::new("lat", "lon", "ch").with_cell_id("id");
        let rows = vec![
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "1"), ("id", "C-01")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "1"), ("id", " ")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "1")]),
        ];
        let parsed = parse_ch_points(&rows, &columns);
        assert_eq!(parsed.points[0].cell_id.as_deref(), Some("C-01"));
        assert_eq!(parsed.points[1].cell_id, None);
        assert_eq!(parsed.points[2].cell_id, None);
    }

    #[test]
    fn test_combined_rows_require_both_values() {
        let rows = vec![
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "50"), ("sh", "90")]),
            row(&[("lat", "-6.5"), ("lon", "106.8"), ("ch", "50")]),
        ];
        let parsed = parse_matched_points(&rows, &CombinedColumns::default());
        assert_eq!(parsed.points.len(), 1);
        assert_eq!(parsed.points[0].sh, 90.0);
        assert_eq!(parsed.rejected[0].index, 1);
    }

    #[test]
    fn test_thousands_separator_is_not_a_decimal_comma() {
        assert_eq!(parse_decimal("1,234,5"), None);
        assert_eq!(parse_decimal("1.5"), Some(1.5));
    }
}
