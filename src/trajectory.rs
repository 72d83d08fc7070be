//! Trajectory loading
//!
//! Reads the embedding table (JSON array or JSON lines), resolves the
//! configured columns, keeps the selected rows and orders them by the
//! order key.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ColumnNames;
use crate::planner::gaussian_filter1d;

#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("expected a JSON array of row objects")]
    NotATable,
    #[error("row {row}: expected an object")]
    NotAnObject { row: usize },
    #[error("row {row}: missing column '{column}'")]
    MissingColumn { row: usize, column: String },
    #[error("row {row}: column '{column}' {reason}")]
    InvalidValue {
        row: usize,
        column: String,
        reason: String,
    },
}

/// One observation in embedding space
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRecord {
    pub label: String,
    pub position: [f64; 3],
    pub frame_index: u64,
    pub order: i64,
}

impl TrajectoryRecord {
    pub fn new(label: impl Into<String>, position: [f64; 3], frame_index: u64, order: i64) -> Self {
        Self {
            label: label.into(),
            position,
            frame_index,
            order,
        }
    }
}

/// Load, filter, order and optionally smooth a trajectory table
pub fn load(
    path: &Path,
    columns: &ColumnNames,
    select: &BTreeMap<String, String>,
    position_sigma: Option<f64>,
) -> Result<Vec<TrajectoryRecord>, TrajectoryError> {
    let content = std::fs::read_to_string(path).map_err(|source| TrajectoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_lines = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
    let rows = if is_lines {
        parse_json_lines(&content)?
    } else {
        parse_json_table(&content)?
    };
    tracing::debug!("Read {} rows from {}", rows.len(), path.display());

    let mut records = from_rows(&rows, columns, select)?;
    sort_by_order(&mut records);
    if let Some(sigma) = position_sigma {
        smooth_positions(&mut records, sigma);
    }

    tracing::info!(
        "Loaded {} of {} rows from {}",
        records.len(),
        rows.len(),
        path.display()
    );
    Ok(records)
}

fn parse_json_table(content: &str) -> Result<Vec<Value>, TrajectoryError> {
    let value: Value = serde_json::from_str(content).map_err(|source| TrajectoryError::Json {
        line: source.line(),
        source,
    })?;
    match value {
        Value::Array(rows) => Ok(rows),
        _ => Err(TrajectoryError::NotATable),
    }
}

fn parse_json_lines(content: &str) -> Result<Vec<Value>, TrajectoryError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| TrajectoryError::Json { line: i + 1, source })
        })
        .collect()
}

/// Convert raw rows into records, dropping rows that fail the `select` filter
pub fn from_rows(
    rows: &[Value],
    columns: &ColumnNames,
    select: &BTreeMap<String, String>,
) -> Result<Vec<TrajectoryRecord>, TrajectoryError> {
    let mut records = Vec::with_capacity(rows.len());

    for (row, value) in rows.iter().enumerate() {
        let object = value
            .as_object()
            .ok_or(TrajectoryError::NotAnObject { row })?;

        if !matches_selection(object, select) {
            continue;
        }

        let label = text_field(object, row, &columns.label)?;
        let frame = integer_field(object, row, &columns.frame)?;
        let frame_index = u64::try_from(frame).map_err(|_| TrajectoryError::InvalidValue {
            row,
            column: columns.frame.clone(),
            reason: format!("must be non-negative, got {}", frame),
        })?;
        let order = integer_field(object, row, &columns.order)?;
        let position = [
            float_field(object, row, &columns.x)?,
            float_field(object, row, &columns.y)?,
            float_field(object, row, &columns.z)?,
        ];

        records.push(TrajectoryRecord {
            label,
            position,
            frame_index,
            order,
        });
    }

    Ok(records)
}

fn matches_selection(object: &Map<String, Value>, select: &BTreeMap<String, String>) -> bool {
    select.iter().all(|(column, wanted)| {
        object
            .get(column)
            .and_then(value_text)
            .is_some_and(|text| &text == wanted)
    })
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field<'a>(
    object: &'a Map<String, Value>,
    row: usize,
    column: &str,
) -> Result<&'a Value, TrajectoryError> {
    match object.get(column) {
        Some(Value::Null) | None => Err(TrajectoryError::MissingColumn {
            row,
            column: column.to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn text_field(object: &Map<String, Value>, row: usize, column: &str) -> Result<String, TrajectoryError> {
    let value = field(object, row, column)?;
    value_text(value).ok_or_else(|| TrajectoryError::InvalidValue {
        row,
        column: column.to_string(),
        reason: format!("is not a label: {}", value),
    })
}

fn integer_field(object: &Map<String, Value>, row: usize, column: &str) -> Result<i64, TrajectoryError> {
    let value = field(object, row, column)?;
    let invalid = || TrajectoryError::InvalidValue {
        row,
        column: column.to_string(),
        reason: format!("is not an integer: {}", value),
    };

    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    // Integral floats show up when the table went through a float column
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(invalid()),
    }
}

fn float_field(object: &Map<String, Value>, row: usize, column: &str) -> Result<f64, TrajectoryError> {
    let value = field(object, row, column)?;
    match value.as_f64() {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(TrajectoryError::InvalidValue {
            row,
            column: column.to_string(),
            reason: format!("is not a finite number: {}", value),
        }),
    }
}

/// Stable sort by the order key
pub fn sort_by_order(records: &mut [TrajectoryRecord]) {
    records.sort_by_key(|r| r.order);
}

/// Gaussian-smooth each position axis over the whole trajectory
pub fn smooth_positions(records: &mut [TrajectoryRecord], sigma: f64) {
    if sigma <= 0.0 || records.is_empty() {
        return;
    }
    for axis in 0..3 {
        let values: Vec<f64> = records.iter().map(|r| r.position[axis]).collect();
        let smoothed = gaussian_filter1d(&values, sigma);
        for (record, value) in records.iter_mut().zip(smoothed) {
            record.position[axis] = value;
        }
    }
    tracing::debug!("Smoothed {} positions with sigma={}", records.len(), sigma);
}

/// Labels in order of first appearance
pub fn unique_labels(records: &[TrajectoryRecord]) -> Vec<&str> {
    let mut seen = Vec::new();
    for record in records {
        if !seen.contains(&record.label.as_str()) {
            seen.push(record.label.as_str());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn row(state: &str, frame: i64, x: f64) -> Value {
        json!({ "state": state, "fmCam1": frame, "comp0": x, "comp1": 0.5, "comp2": -0.25, "animal": "a1" })
    }

    #[test]
    fn test_from_rows_maps_columns() {
        let rows = vec![row("run_left", 3, 1.0), row("idle", 4, 2.0)];
        let records = from_rows(&rows, &ColumnNames::default(), &BTreeMap::new()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], TrajectoryRecord::new("run_left", [1.0, 0.5, -0.25], 3, 3));
        assert_eq!(records[1].label, "idle");
    }

    #[test]
    fn test_select_filters_rows() {
        let mut other = row("run_left", 5, 0.0);
        other["animal"] = json!("a2");
        let rows = vec![row("run_left", 3, 1.0), other];
        let select = BTreeMap::from([("animal".to_string(), "a1".to_string())]);

        let records = from_rows(&rows, &ColumnNames::default(), &select).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].frame_index, 3);
    }

    #[test]
    fn test_missing_position_is_an_error() {
        let mut bad = row("run_left", 3, 1.0);
        bad.as_object_mut().unwrap().remove("comp1");
        let err = from_rows(&[row("idle", 1, 0.0), bad], &ColumnNames::default(), &BTreeMap::new())
            .unwrap_err();
        match err {
            TrajectoryError::MissingColumn { row, column } => {
                assert_eq!(row, 1);
                assert_eq!(column, "comp1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_frame_and_fractional_order_rejected() {
        let err = from_rows(&[row("idle", -1, 0.0)], &ColumnNames::default(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidValue { row: 0, .. }));

        let mut fractional = row("idle", 1, 0.0);
        fractional["fmCam1"] = json!(1.5);
        let err = from_rows(&[fractional], &ColumnNames::default(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidValue { .. }));
    }

    #[test]
    fn test_integral_float_frame_and_numeric_label() {
        let value = json!({ "state": 7, "fmCam1": 12.0, "comp0": 0.0, "comp1": 0.0, "comp2": 0.0 });
        let records = from_rows(&[value], &ColumnNames::default(), &BTreeMap::new()).unwrap();
        assert_eq!(records[0].label, "7");
        assert_eq!(records[0].frame_index, 12);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![
            TrajectoryRecord::new("b", [0.0; 3], 0, 2),
            TrajectoryRecord::new("a", [0.0; 3], 1, 1),
            TrajectoryRecord::new("c", [0.0; 3], 2, 2),
        ];
        sort_by_order(&mut records);
        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_smooth_positions_keeps_constant_axes() {
        let mut records: Vec<_> = (0..60)
            .map(|i| TrajectoryRecord::new("a", [i as f64, 2.0, -1.0], i, i as i64))
            .collect();
        smooth_positions(&mut records, 3.0);
        for record in &records {
            assert_relative_eq!(record.position[1], 2.0, epsilon = 1e-12);
            assert_relative_eq!(record.position[2], -1.0, epsilon = 1e-12);
        }
        // interior of a linear ramp is unchanged by a symmetric kernel
        assert_relative_eq!(records[30].position[0], 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_load_json_lines_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.jsonl");
        let lines = [row("b", 9, 0.0), row("a", 2, 0.0)]
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, lines).unwrap();

        let records = load(&path, &ColumnNames::default(), &BTreeMap::new(), None).unwrap();
        assert_eq!(records[0].order, 2);
        assert_eq!(records[1].order, 9);
    }

    #[test]
    fn test_load_rejects_non_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.json");
        std::fs::write(&path, r#"{"state": "a"}"#).unwrap();
        let err = load(&path, &ColumnNames::default(), &BTreeMap::new(), None).unwrap_err();
        assert!(matches!(err, TrajectoryError::NotATable));
    }

    #[test]
    fn test_unique_labels_in_appearance_order() {
        let records = vec![
            TrajectoryRecord::new("run", [0.0; 3], 0, 0),
            TrajectoryRecord::new("drink", [0.0; 3], 1, 1),
            TrajectoryRecord::new("run", [0.0; 3], 2, 2),
        ];
        assert_eq!(unique_labels(&records), vec!["run", "drink"]);
    }
}
