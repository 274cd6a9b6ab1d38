//! Export fitted models to JSON and per-period results to CSV.
//!
//! Both exports are meant to be easy to consume in spreadsheets or downstream
//! scripts; the JSON document can be deserialized back into `ModelExport`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FitConfig, FitResult, FittedEquation};
use crate::error::{CurveError, Result};
use crate::fit::StageReport;
use crate::models::CompositeModel;
use crate::report::PeriodResidual;

/// Self-describing JSON document for one fitted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelExport {
    pub generated_at: chrono::NaiveDateTime,
    pub config: FitConfig,
    pub model: CompositeModel,
    pub fit: FitResult,
    pub equation: FittedEquation,
    pub history: Vec<StageReport>,
}

/// Serialize `export` as pretty JSON.
pub fn write_model_json(path: &Path, export: &ModelExport) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| CurveError::Io(format!("failed to create export JSON '{}': {e}", path.display())))?;
    write_model_json_to(file, export)
}

pub fn write_model_json_to<W: Write>(writer: W, export: &ModelExport) -> Result<()> {
    serde_json::to_writer_pretty(writer, export)
        .map_err(|e| CurveError::Io(format!("failed to write export JSON: {e}")))
}

/// Read a previously exported model.
pub fn read_model_json(path: &Path) -> Result<ModelExport> {
    let file = File::open(path)
        .map_err(|e| CurveError::Io(format!("failed to open model JSON '{}': {e}", path.display())))?;
    read_model_json_from(file)
}

/// Parse a model export; malformed instance layouts are rejected here.
pub fn read_model_json_from<R: Read>(reader: R) -> Result<ModelExport> {
    serde_json::from_reader(reader).map_err(|e| CurveError::Io(format!("failed to parse model JSON: {e}")))
}

/// Write per-period observed/predicted/residual rows to a CSV file.
pub fn write_residuals_csv(path: &Path, rows: &[PeriodResidual]) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| CurveError::Io(format!("failed to create export CSV '{}': {e}", path.display())))?;
    write_residuals_csv_to(file, rows)
}

pub fn write_residuals_csv_to<W: Write>(writer: W, rows: &[PeriodResidual]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in rows {
        wtr.serialize(r)
            .map_err(|e| CurveError::Io(format!("failed to write export CSV row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| CurveError::Io(format!("failed to flush export CSV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn residual_csv_has_header_and_rows() {
        let rows = vec![PeriodResidual {
            index: 0,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            observed: 10.0,
            predicted: 9.5,
            residual: 0.5,
        }];
        let mut buf = Vec::new();
        write_residuals_csv_to(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("index,date,observed,predicted,residual"));
        assert_eq!(lines.next(), Some("0,2020-01-01,10.0,9.5,0.5"));
    }

    #[test]
    fn model_json_reloads() {
        let fit = FitResult {
            parameters: Vec::new(),
            converged: true,
            objective: 0.0,
            r_squared: 1.0,
            constraint: 0.15,
            method: None,
            attempts: Vec::new(),
        };
        let export = ModelExport {
            generated_at: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap(),
            config: FitConfig::default(),
            model: CompositeModel::new(Default::default()),
            fit,
            equation: FittedEquation {
                equation: "0".to_string(),
                r_squared: 1.0,
                parameters: Vec::new(),
                predicted: vec![1.0],
            },
            history: Vec::new(),
        };
        let mut buf = Vec::new();
        write_model_json_to(&mut buf, &export).unwrap();
        let back: ModelExport = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, export);
    }

    #[test]
    fn tampered_model_json_is_rejected() {
        let mut model = CompositeModel::new(Default::default());
        model
            .append(crate::models::CurveLayer::competition(), &[1.0], &[crate::domain::Bound::new(0.0, 2.0)])
            .unwrap();
        let export = ModelExport {
            generated_at: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap(),
            config: FitConfig::default(),
            model,
            fit: FitResult {
                parameters: vec![1.0],
                converged: true,
                objective: 0.0,
                r_squared: 1.0,
                constraint: 0.15,
                method: None,
                attempts: Vec::new(),
            },
            equation: FittedEquation {
                equation: "-(1^2 / 1000) * x^((1000 / 1500) / 3)".to_string(),
                r_squared: 1.0,
                parameters: vec![1.0],
                predicted: vec![0.0],
            },
            history: Vec::new(),
        };
        let mut buf = Vec::new();
        write_model_json_to(&mut buf, &export).unwrap();
        assert_eq!(read_model_json_from(buf.as_slice()).unwrap(), export);

        let mut value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        value["model"]["instances"][0]["range"]["end"] = serde_json::json!(3);
        let tampered = serde_json::to_vec(&value).unwrap();
        let err = read_model_json_from(tampered.as_slice()).unwrap_err();
        assert!(matches!(err, CurveError::Io(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
