//! CSV ingest for a single dated series.
//!
//! Expected schema: a `date` column and a `value` column (case-insensitive,
//! extra columns ignored). The loader is deliberately thin:
//!
//! - **Strict schema** for the two required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - rows are sorted chronologically; duplicate dates keep the first row

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::Series;
use crate::error::{CurveError, Result};

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the cleaned series plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: Series,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a `date,value` CSV file.
pub fn load_series(path: &Path) -> Result<IngestedSeries> {
    let file = File::open(path)
        .map_err(|e| CurveError::Io(format!("failed to open CSV '{}': {e}", path.display())))?;
    read_series(file)
}

/// Parse `date,value` CSV from any reader.
pub fn read_series<R: Read>(reader: R) -> Result<IngestedSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| CurveError::Io(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for required in ["date", "value"] {
        if !header_map.contains_key(required) {
            return Err(CurveError::Io(format!("missing required column: `{required}`")));
        }
    }

    let mut rows: Vec<(NaiveDate, f64)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &header_map));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by_key(|(date, _)| *date);
    let before = rows.len();
    rows.dedup_by_key(|(date, _)| *date);
    if rows.len() < before {
        tracing::warn!(dropped = before - rows.len(), "duplicate dates dropped during ingest");
    }
    if !row_errors.is_empty() {
        tracing::warn!(skipped = row_errors.len(), "rows skipped during ingest");
    }

    Ok(IngestedSeries {
        series: Series::new(rows)?,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> std::result::Result<(NaiveDate, f64), String> {
    let date = parse_date(get_required(record, header_map, "date")?)?;
    let raw = get_required(record, header_map, "value")?;
    let value = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid value '{raw}'"))?;
    Ok((date, value))
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> std::result::Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required value: `{name}`"))
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sorts_and_skips_bad_rows() {
        let csv = "Date,Value,note\n\
                   2020-07-01,14,\n\
                   2020-01-01,10,first\n\
                   2020-04-01,,missing\n\
                   2020-10-01,abc,\n\
                   01/04/2020,12,\n";
        let out = read_series(csv.as_bytes()).unwrap();
        assert_eq!(out.rows_read, 5);
        assert_eq!(out.row_errors.len(), 2);
        assert_eq!(out.row_errors[0].line, 4);
        assert_eq!(out.series.values(), vec![10.0, 12.0, 14.0]);
        assert_eq!(out.series.points()[1].date, NaiveDate::from_ymd_opt(2020, 4, 1).unwrap());
    }

    #[test]
    fn missing_value_column_is_an_error() {
        let err = read_series("date,amount\n2020-01-01,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CurveError::Io(_)));
        assert!(err.to_string().contains("`value`"));
    }

    #[test]
    fn bom_prefixed_header_is_accepted() {
        let out = read_series("\u{feff}date,value\n2021-01-01,3.5\n".as_bytes()).unwrap();
        assert_eq!(out.series.len(), 1);
    }
}
