//! CSV exports.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts:
//! one row per peak, per window, per quantified peak, or per converted sample.

use std::path::Path;

use serde::Serialize;

use crate::calibration::Quantitation;
use crate::domain::{FittedPeak, PeakWindow, Trace};
use crate::error::{ChromError, Result};
use crate::io::ingest::InstrumentRow;

#[derive(Debug, Serialize)]
struct PeakRecord<'a> {
    sample: &'a str,
    window_id: usize,
    peak_index: usize,
    retention_time: f64,
    seed_location: f64,
    amplitude: f64,
    scale: f64,
    skew: f64,
    area: f64,
}

#[derive(Debug, Serialize)]
struct WindowRecord<'a> {
    sample: &'a str,
    window_id: usize,
    start_index: usize,
    end_index: usize,
    time_start: f64,
    time_end: f64,
    candidates: usize,
    baseline_height: f64,
}

#[derive(Debug, Serialize)]
struct ConvertedRecord {
    time_min: f64,
    step: f64,
    #[serde(rename = "intensity_mV")]
    intensity_mv: f64,
}

fn write_records<T: Serialize>(path: &Path, what: &str, records: impl IntoIterator<Item = T>) -> Result<()> {
    let io_err = |message: String| ChromError::Io {
        path: path.display().to_string(),
        message,
    };
    let mut writer = csv::Writer::from_path(path).map_err(|e| io_err(format!("failed to create {what} CSV: {e}")))?;
    for r in records {
        writer
            .serialize(r)
            .map_err(|e| io_err(format!("failed to write {what} CSV row: {e}")))?;
    }
    writer.flush().map_err(|e| io_err(format!("failed to flush {what} CSV: {e}")))
}

/// Fitted peaks, one row per peak, for any number of samples.
pub fn write_peaks_csv(path: &Path, samples: &[(String, Vec<FittedPeak>)]) -> Result<()> {
    let rows = samples.iter().flat_map(|(sample, peaks)| {
        peaks.iter().map(move |p| PeakRecord {
            sample,
            window_id: p.window_id,
            peak_index: p.peak_index,
            retention_time: p.location,
            seed_location: p.seed_location,
            amplitude: p.amplitude,
            scale: p.scale,
            skew: p.skew,
            area: p.area,
        })
    });
    write_records(path, "peaks", rows)
}

pub fn write_windows_csv(path: &Path, samples: &[(String, Vec<PeakWindow>)]) -> Result<()> {
    let rows = samples.iter().flat_map(|(sample, windows)| {
        windows.iter().map(move |w| WindowRecord {
            sample,
            window_id: w.id,
            start_index: w.start,
            end_index: w.end,
            time_start: w.time.first().copied().unwrap_or(f64::NAN),
            time_end: w.time.last().copied().unwrap_or(f64::NAN),
            candidates: w.candidates.len(),
            baseline_height: w.baseline_height,
        })
    });
    write_records(path, "windows", rows)
}

pub fn write_quantitation_csv(path: &Path, rows: &[Quantitation]) -> Result<()> {
    write_records(path, "concentrations", rows)
}

/// Tidy CSV of an instrument export (`time_min,step,intensity_mV`).
pub fn write_converted_csv(path: &Path, rows: &[InstrumentRow]) -> Result<()> {
    write_records(
        path,
        "converted trace",
        rows.iter().map(|r| ConvertedRecord {
            time_min: r.time,
            step: r.step,
            intensity_mv: r.value,
        }),
    )
}

/// A trace as tidy CSV (`time_min,intensity_mV`).
pub fn write_trace_csv(path: &Path, trace: &Trace) -> Result<()> {
    #[derive(Serialize)]
    struct TraceRecord {
        time_min: f64,
        #[serde(rename = "intensity_mV")]
        intensity_mv: f64,
    }
    write_records(
        path,
        "trace",
        trace
            .time()
            .iter()
            .zip(trace.intensity())
            .map(|(&time_min, &intensity_mv)| TraceRecord { time_min, intensity_mv }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::load_trace_csv;

    #[test]
    fn converted_csv_reads_back_as_a_trace() {
        let dir = std::env::temp_dir().join(format!("hplc-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("converted.csv");
        let rows: Vec<InstrumentRow> = (0..5)
            .map(|i| InstrumentRow {
                time: i as f64 * 0.1,
                step: 0.1,
                value: i as f64,
            })
            .collect();
        write_converted_csv(&path, &rows).unwrap();

        let back = load_trace_csv(&path, "time_min", "intensity_mV").unwrap();
        assert_eq!(back.trace.len(), 5);
        assert_eq!(back.trace.intensity()[4], 4.0);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn trace_csv_round_trips() {
        let dir = std::env::temp_dir().join(format!("hplc-trace-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trace.csv");
        let trace = Trace::new(vec![0.0, 0.5, 1.0], vec![1.5, -2.0, 0.25]).unwrap();
        write_trace_csv(&path, &trace).unwrap();
        let back = load_trace_csv(&path, "time_min", "intensity_mV").unwrap();
        assert_eq!(back.trace, trace);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn peak_rows_carry_the_sample_name() {
        let dir = std::env::temp_dir().join(format!("hplc-peaks-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("peaks.csv");
        let peak = FittedPeak {
            window_id: 2,
            peak_index: 1,
            seed_location: 3.3,
            amplitude: 5.0,
            location: 3.29,
            scale: 0.1,
            skew: 0.5,
            area: 1.25,
        };
        write_peaks_csv(&path, &[("std".to_string(), vec![peak])]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("sample,window_id,peak_index,retention_time"));
        assert!(lines.next().unwrap().starts_with("std,2,1,3.29"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
