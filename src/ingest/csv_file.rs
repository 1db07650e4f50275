//! CSV front-end: file → uniform rows.
//!
//! Only the binary reads files; the core works on `Row` maps. Spreadsheet
//! exports in the field use either `,` or `;` as delimiter, so the delimiter
//! is sniffed from the header line.

use std::fs;
use std::path::Path;

use super::rows::Row;

/// Rows read from a CSV source, plus records the CSV reader itself rejected.
#[derive(Debug, Clone)]
pub struct CsvRows {
    pub rows: Vec<Row>,
    pub unreadable: usize,
}

/// Read a CSV file into rows keyed by header name.
pub fn read_rows(path: &Path) -> Result<CsvRows, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to open CSV '{}': {e}", path.display()))?;
    rows_from_str(&text)
}

/// Parse CSV text into rows keyed by header name.
pub fn rows_from_str(text: &str) -> Result<CsvRows, String> {
    let delimiter = sniff_delimiter(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| format!("Failed to read CSV headers: {e}"))?
        .clone();

    let mut rows = Vec::new();
    let mut unreadable = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(_) => {
                unreadable += 1;
                continue;
            }
        };

        // Short records leave trailing columns absent; the row parser
        // treats absent and blank the same way.
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(CsvRows { rows, unreadable })
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let commas = header.matches(',').count();
    let semicolons = header.matches(';').count();
    if semicolons > commas { b';' } else { b',' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_delimited_rows() {
        let csv = "lat,lon,ch\n-6.5,106.8,120\n-6.6,106.9,80\n";
        let parsed = rows_from_str(csv).expect("valid CSV");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].get("ch").map(String::as_str), Some("120"));
    }

    #[test]
    fn test_semicolon_delimited_rows_with_decimal_comma() {
        let csv = "lat;lon;ch\n-6,5;106,8;12,5\n";
        let parsed = rows_from_str(csv).expect("valid CSV");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].get("lat").map(String::as_str), Some("-6,5"));
    }

    #[test]
    fn test_short_records_keep_leading_columns() {
        let csv = "lat,lon,ch\n-6.5,106.8\n";
        let parsed = rows_from_str(csv).expect("flexible reader accepts short rows");
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.rows[0].get("ch").is_none());
    }
}
