//! Trace ingest.
//!
//! Two input shapes are supported:
//!
//! - **Tidy CSV**: one header row, a time column and an intensity column
//!   (names configurable, matched case-insensitively, BOM tolerant).
//! - **Instrument text export**: a free-form header block ending in a
//!   `Chromatogram Data:` line, one column-title line, then tab-separated
//!   `time  step  value` rows. Numbers may carry apostrophe thousands
//!   separators and a detached minus sign (`- 1.23`).
//!
//! Bad rows are skipped and reported as [`RowError`]s; the resulting series must
//! still form a valid [`Trace`].

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Trace;
use crate::error::{ChromError, Result};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the validated trace plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedTrace {
    pub trace: Trace,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// One data row of the instrument text export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentRow {
    pub time: f64,
    pub step: f64,
    pub value: f64,
}

const DATA_MARKER: &str = "Chromatogram Data:";

/// Load a tidy CSV trace.
pub fn load_trace_csv(path: &Path, time_column: &str, intensity_column: &str) -> Result<IngestedTrace> {
    let file = File::open(path).map_err(|e| ChromError::Io {
        path: path.display().to_string(),
        message: format!("failed to open trace CSV: {e}"),
    })?;
    read_trace_csv(file, time_column, intensity_column).map_err(|e| match e {
        ChromError::InvalidInput(message) | ChromError::Parse { message, .. } => ChromError::Parse {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Parse a tidy CSV trace from any reader.
pub fn read_trace_csv<R: std::io::Read>(reader: R, time_column: &str, intensity_column: &str) -> Result<IngestedTrace> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ChromError::invalid(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let time_idx = require_column(&header_map, time_column)?;
    let intensity_idx = require_column(&header_map, intensity_column)?;

    let mut time = Vec::new();
    let mut intensity = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match (parse_field(&record, time_idx), parse_field(&record, intensity_idx)) {
            (Ok(t), Ok(y)) => {
                time.push(t);
                intensity.push(y);
            }
            (Err(e), _) | (_, Err(e)) => row_errors.push(RowError { line, message: e }),
        }
    }

    let trace = Trace::new(time, intensity)?;
    Ok(IngestedTrace {
        trace,
        row_errors,
        rows_read,
    })
}

/// Load a trace from either input shape: `.txt` files are read as instrument
/// exports (time and value columns), anything else as tidy CSV.
pub fn load_trace(path: &Path, time_column: &str, intensity_column: &str) -> Result<IngestedTrace> {
    let is_export = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if !is_export {
        return load_trace_csv(path, time_column, intensity_column);
    }
    let rows = load_instrument_export(path)?;
    let rows_read = rows.len();
    let (time, intensity): (Vec<f64>, Vec<f64>) = rows.into_iter().map(|r| (r.time, r.value)).unzip();
    let trace = Trace::new(time, intensity).map_err(|e| ChromError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(IngestedTrace {
        trace,
        row_errors: Vec::new(),
        rows_read,
    })
}

/// Read an instrument text export.
pub fn load_instrument_export(path: &Path) -> Result<Vec<InstrumentRow>> {
    let text = std::fs::read_to_string(path).map_err(|e| ChromError::Io {
        path: path.display().to_string(),
        message: format!("failed to read instrument export: {e}"),
    })?;
    parse_instrument_export(&text).map_err(|e| ChromError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

pub fn parse_instrument_export(text: &str) -> Result<Vec<InstrumentRow>> {
    let mut lines = text.lines().enumerate();
    if !lines.by_ref().any(|(_, l)| l.trim() == DATA_MARKER) {
        return Err(ChromError::invalid(format!("no `{DATA_MARKER}` line found")));
    }
    // Column titles.
    lines.next();

    let mut rows = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(ChromError::invalid(format!(
                "line {}: expected 3 tab-separated columns, got {}",
                idx + 1,
                fields.len()
            )));
        }
        let parse = |s: &str| {
            parse_instrument_number(s)
                .ok_or_else(|| ChromError::invalid(format!("line {}: invalid number `{}`", idx + 1, s.trim())))
        };
        rows.push(InstrumentRow {
            time: parse(fields[0])?,
            step: parse(fields[1])?,
            value: parse(fields[2])?,
        });
    }
    Ok(rows)
}

/// `1'234.5` → 1234.5, `- 0.25` → -0.25.
fn parse_instrument_number(s: &str) -> Option<f64> {
    let cleaned = s.trim().replace('\'', "").replace("- ", "-");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// File stem up to the first underscore (`1mM_glu_run2.csv` → `1mM`).
pub fn sample_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_').next().unwrap_or_default().trim().to_string()
}

/// Concentration encoded as `<number>mM` in a file name, if any.
pub fn concentration_from_name(name: &str) -> Option<f64> {
    let end = name.find("mM")?;
    let head = &name[..end];
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, _)| i)?;
    head[start..].parse::<f64>().ok()
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| ChromError::invalid(format!("missing required column `{name}`")))
}

fn parse_field(record: &StringRecord, idx: usize) -> std::result::Result<f64, String> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Err(format!("missing value in column {}", idx + 1));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("invalid number `{raw}` in column {}", idx + 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_bom_and_bad_rows() {
        let data = "\u{feff}Time_Min,Intensity_mV\n0.0,1.0\n0.1,abc\n0.2,3.0\n0.3,4.0\n";
        let out = read_trace_csv(data.as_bytes(), "time_min", "intensity_mV").unwrap();
        assert_eq!(out.rows_read, 4);
        assert_eq!(out.trace.len(), 3);
        assert_eq!(out.row_errors.len(), 1);
        assert_eq!(out.row_errors[0].line, 3);
    }

    #[test]
    fn missing_column_is_reported() {
        let data = "t,y\n0,1\n";
        let err = read_trace_csv(data.as_bytes(), "time_min", "intensity_mV").unwrap_err();
        assert!(err.to_string().contains("time_min"));
    }

    #[test]
    fn instrument_export_numbers_are_normalised() {
        let text = "Sample: std\nDetector A\nChromatogram Data:\nTime (min)\tStep (s)\tValue (mAU)\n\
                    0.000\t0.20\t1'234.5\n0.003\t0.20\t- 0.25\n\n";
        let rows = parse_instrument_export(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, 1234.5);
        assert_eq!(rows[1].value, -0.25);
        assert_eq!(rows[1].time, 0.003);
    }

    #[test]
    fn load_trace_dispatches_on_extension() {
        let dir = std::env::temp_dir().join(format!("hplc-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let txt = dir.join("1mM_run.txt");
        std::fs::write(&txt, "Chromatogram Data:\nTime\tStep\tValue\n0.0\t0.2\t1\n0.1\t0.2\t2\n0.2\t0.2\t- 1\n").unwrap();
        let csv = dir.join("1mM_run.csv");
        std::fs::write(&csv, "time_min,intensity_mV\n0.0,1\n0.1,2\n0.2,3\n").unwrap();

        let a = load_trace(&txt, "time_min", "intensity_mV").unwrap();
        assert_eq!(a.trace.intensity(), &[1.0, 2.0, -1.0]);
        let b = load_trace(&csv, "time_min", "intensity_mV").unwrap();
        assert_eq!(b.trace.intensity(), &[1.0, 2.0, 3.0]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn instrument_export_without_marker_fails() {
        assert!(parse_instrument_export("a\tb\tc\n1\t2\t3\n").is_err());
    }

    #[test]
    fn names_and_concentrations() {
        assert_eq!(sample_name(Path::new("cal/2.5mM_glu_run1.csv")), "2.5mM");
        assert_eq!(concentration_from_name("2.5mM"), Some(2.5));
        assert_eq!(concentration_from_name("std_10mM"), Some(10.0));
        assert_eq!(concentration_from_name("blank"), None);
        assert_eq!(concentration_from_name("mM"), None);
    }
}
