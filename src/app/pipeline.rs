//! Shared pipeline logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> crop -> baseline -> segmentation -> mixture fit -> calibration / resolution
//!
//! The command handlers in `app` then focus on presentation (printing and exports).

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::calibration::{
    CalibrationSample, CalibrationSet, MatchedCalibration, Quantitation, assign_compounds, fit_curves,
    quantify_sample, validate_calibration_matches,
};
use crate::domain::{BaselineResult, CalibrationFile, CompoundTable, FitReport, QuantifyConfig, Segmentation, Trace};
use crate::error::{AppError, Result};
use crate::fit::{FitOptions, fit_windows, mixture_components};
use crate::io::{concentration_from_name, load_trace, sample_name};
use crate::math::{ReplicateStats, replicate_stats};
use crate::signal::{BaselineOptions, SegmentOptions, estimate_baseline_with, segment};

/// How far to take a trace through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Baseline and segmentation only (peak positions).
    SegmentOnly,
    /// Everything up to fitted peaks.
    Fit,
}

/// A trace after baseline removal and segmentation.
#[derive(Debug, Clone)]
pub struct SegmentedTrace {
    /// The analysed trace (after cropping and first-sample correction).
    pub trace: Trace,
    pub baseline: BaselineResult,
    pub segmentation: Segmentation,
}

/// All computed outputs for one trace.
#[derive(Debug, Clone)]
pub struct TraceRun {
    pub sample: String,
    pub segmented: SegmentedTrace,
    pub fit: FitReport,
    /// Rows skipped during ingest.
    pub skipped_rows: usize,
}

impl TraceRun {
    /// Sum of all fitted peaks over the analysed time axis.
    pub fn mixture(&self) -> Vec<f64> {
        let time = self.segmented.trace.time();
        let mut total = vec![0.0; time.len()];
        for component in mixture_components(time, &self.fit.peaks) {
            for (acc, v) in total.iter_mut().zip(component) {
                *acc += v;
            }
        }
        total
    }
}

/// Apply the optional time window and first-sample offset.
pub fn prepare_trace(trace: &Trace, cfg: &QuantifyConfig) -> Result<Trace> {
    let trace = match cfg.time_window {
        Some((start, end)) => trace.crop(start, end)?,
        None => trace.clone(),
    };
    if !cfg.zero_first_sample {
        return Ok(trace);
    }
    let first = trace.intensity()[0];
    trace.with_intensity(trace.intensity().iter().map(|v| v - first).collect())
}

/// Baseline removal; zero iterations leaves the trace untouched.
pub fn remove_baseline(trace: &Trace, cfg: &QuantifyConfig) -> BaselineResult {
    if cfg.baseline_iterations == 0 {
        return BaselineResult {
            baseline: vec![0.0; trace.len()],
            corrected: trace.intensity().to_vec(),
            shift: 0.0,
        };
    }
    estimate_baseline_with(
        trace.intensity(),
        &BaselineOptions {
            iterations: cfg.baseline_iterations,
            shift_negative: cfg.shift_negative,
        },
    )
}

pub fn segment_trace(trace: &Trace, cfg: &QuantifyConfig) -> Result<SegmentedTrace> {
    let trace = prepare_trace(trace, cfg)?;
    let baseline = remove_baseline(&trace, cfg);

    if baseline.is_flat() {
        warn!("corrected trace is flat; no peaks to segment");
        return Ok(SegmentedTrace {
            trace,
            baseline,
            segmentation: Segmentation::default(),
        });
    }

    let corrected = trace.with_intensity(baseline.corrected.clone())?;
    let segmentation = segment(&corrected, &SegmentOptions::from(cfg))?;
    debug!(
        windows = segmentation.windows.len(),
        candidates = segmentation.candidate_count(),
        overlaps = segmentation.overlaps.len(),
        "segmented trace"
    );
    Ok(SegmentedTrace {
        trace,
        baseline,
        segmentation,
    })
}

/// Run one in-memory trace through the pipeline.
pub fn process_trace(sample: &str, trace: &Trace, cfg: &QuantifyConfig, mode: RunMode) -> Result<TraceRun> {
    let segmented = segment_trace(trace, cfg)?;
    let fit = match mode {
        RunMode::SegmentOnly => FitReport::default(),
        RunMode::Fit => fit_windows(&segmented.segmentation.windows, &FitOptions::from(cfg)),
    };
    Ok(TraceRun {
        sample: sample.to_string(),
        segmented,
        fit,
        skipped_rows: 0,
    })
}

/// Load and process one file. Errors carry the file name.
pub fn process_file(path: &Path, cfg: &QuantifyConfig, mode: RunMode) -> std::result::Result<TraceRun, AppError> {
    let sample = sample_name(path);
    let span = info_span!("trace", sample = %sample);
    let _enter = span.enter();

    let context = path.display().to_string();
    let ingested =
        load_trace(path, &cfg.time_column, &cfg.intensity_column).map_err(|e| AppError::with_context(&context, e))?;
    for row in &ingested.row_errors {
        debug!(line = row.line, "skipped row: {}", row.message);
    }
    if !ingested.row_errors.is_empty() {
        warn!(
            skipped = ingested.row_errors.len(),
            rows = ingested.rows_read,
            "some rows could not be parsed"
        );
    }

    let mut run =
        process_trace(&sample, &ingested.trace, cfg, mode).map_err(|e| AppError::with_context(&context, e))?;
    run.skipped_rows = ingested.row_errors.len();
    info!(
        windows = run.segmented.segmentation.windows.len(),
        peaks = run.fit.peaks.len(),
        failed_windows = run.fit.failures.len(),
        "processed trace"
    );
    Ok(run)
}

/// Process every file independently, in parallel, keeping input order.
pub fn process_files(
    paths: &[PathBuf],
    cfg: &QuantifyConfig,
    mode: RunMode,
) -> Vec<(PathBuf, std::result::Result<TraceRun, AppError>)> {
    paths
        .par_iter()
        .map(|p| (p.clone(), process_file(p, cfg, mode)))
        .collect()
}

/// Result of building calibration curves from standards.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub samples: Vec<CalibrationSample>,
    pub matched: MatchedCalibration,
    pub set: CalibrationSet,
    /// Area spread of the internal standard across all standards, when requested.
    pub internal_standard: Option<(String, Option<ReplicateStats>)>,
    /// Runs that could not be used as standards, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Build curves from fitted calibration standards.
///
/// A run is a standard when its sample name encodes a concentration
/// (`<number>mM`); other runs are reported in `skipped`.
pub fn calibrate_runs(runs: &[TraceRun], table: &CompoundTable, internal_standard: Option<&str>) -> CalibrationOutcome {
    let mut samples = Vec::with_capacity(runs.len());
    let mut skipped = Vec::new();
    for run in runs {
        match concentration_from_name(&run.sample) {
            Some(concentration) => samples.push(CalibrationSample {
                name: run.sample.clone(),
                concentration,
                peaks: run.fit.peaks.clone(),
            }),
            None => {
                warn!(sample = %run.sample, "no `<number>mM` in sample name; not used as a standard");
                skipped.push((run.sample.clone(), "no concentration in sample name".to_string()));
            }
        }
    }

    let matched = validate_calibration_matches(&samples, table);
    for issue in &matched.issues {
        warn!(compound = issue.compound(), "{}", issue.to_error());
    }
    let set = fit_curves(&matched.points);

    let internal_standard = internal_standard.map(|name| {
        let areas = internal_standard_areas(&samples, table, name);
        (name.to_string(), replicate_stats(&areas))
    });

    CalibrationOutcome {
        samples,
        matched,
        set,
        internal_standard,
        skipped,
    }
}

/// Area of the single peak matching `compound` in each sample that has exactly one.
fn internal_standard_areas(samples: &[CalibrationSample], table: &CompoundTable, compound: &str) -> Vec<f64> {
    samples
        .iter()
        .filter_map(|s| {
            let matches: Vec<f64> = assign_compounds(&s.peaks, table)
                .into_iter()
                .zip(s.peaks.iter())
                .filter(|(c, _)| c.is_some_and(|c| c.name == compound))
                .map(|(_, p)| p.area)
                .collect();
            match matches.as_slice() {
                [area] => Some(*area),
                _ => None,
            }
        })
        .collect()
}

/// Identify and quantify the peaks of unknown samples with a saved calibration.
pub fn measure_runs(runs: &[TraceRun], calibration: &CalibrationFile) -> Result<Vec<Quantitation>> {
    let table = calibration.compound_table()?;
    Ok(runs
        .iter()
        .flat_map(|run| quantify_sample(&run.sample, &run.fit.peaks, &table, &calibration.curves))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Compound, FittedPeak};

    fn peak(location: f64, area: f64) -> FittedPeak {
        FittedPeak {
            window_id: 1,
            peak_index: 1,
            seed_location: location,
            amplitude: 1.0,
            location,
            scale: 0.1,
            skew: 0.0,
            area,
        }
    }

    fn run(sample: &str, peaks: Vec<FittedPeak>) -> TraceRun {
        let trace = Trace::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]).unwrap();
        TraceRun {
            sample: sample.to_string(),
            segmented: SegmentedTrace {
                baseline: remove_baseline(&trace, &QuantifyConfig::default()),
                trace,
                segmentation: Segmentation::default(),
            },
            fit: FitReport {
                peaks,
                failures: Vec::new(),
            },
            skipped_rows: 0,
        }
    }

    fn table() -> CompoundTable {
        CompoundTable::new(
            vec![
                Compound { name: "glu".to_string(), retention_time: 1.4 },
                Compound { name: "istd".to_string(), retention_time: 5.0 },
            ],
            0.05,
        )
        .unwrap()
    }

    #[test]
    fn prepare_crops_and_zeroes() {
        let trace = Trace::new((0..10).map(f64::from).collect(), (0..10).map(|i| f64::from(i) + 5.0).collect()).unwrap();
        let cfg = QuantifyConfig {
            time_window: Some((2.0, 5.0)),
            zero_first_sample: true,
            ..QuantifyConfig::default()
        };
        let out = prepare_trace(&trace, &cfg).unwrap();
        assert_eq!(out.time(), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out.intensity(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn flat_trace_yields_no_windows() {
        let trace = Trace::new((0..50).map(f64::from).collect(), vec![3.0; 50]).unwrap();
        let out = process_trace("flat", &trace, &QuantifyConfig::default(), RunMode::Fit).unwrap();
        assert!(out.segmented.segmentation.windows.is_empty());
        assert!(out.fit.peaks.is_empty());
        assert!(out.mixture().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn calibration_uses_named_standards_only() {
        let runs = vec![
            run("1mM", vec![peak(1.41, 100.0), peak(5.0, 50.0)]),
            run("2mM", vec![peak(1.39, 200.0), peak(5.01, 54.0)]),
            run("3mM", vec![peak(1.40, 300.0), peak(4.99, 46.0)]),
            run("blank", vec![peak(5.0, 50.0)]),
        ];
        let out = calibrate_runs(&runs, &table(), Some("istd"));
        assert_eq!(out.samples.len(), 3);
        assert_eq!(out.skipped.len(), 1);

        let glu = out.set.curve("glu").unwrap();
        assert!((glu.slope - 100.0).abs() < 1e-9);
        assert!(glu.intercept.abs() < 1e-9);
        assert!(out.set.curve("istd").is_some());
        assert!(out.matched.issues.is_empty());

        let (name, stats) = out.internal_standard.unwrap();
        assert_eq!(name, "istd");
        let stats = stats.unwrap();
        assert_eq!(stats.n, 3);
        assert!((stats.mean - 50.0).abs() < 1e-9);
    }

    #[test]
    fn measure_resolves_matched_peaks() {
        let runs = vec![run("1mM", vec![peak(1.41, 100.0)]), run("2mM", vec![peak(1.40, 200.0)])];
        let cal = calibrate_runs(&runs, &table(), None);
        let file = crate::io::calibration_file(&table(), cal.set.curves.clone());

        let unknown = vec![run("unknown", vec![peak(1.4, 250.0), peak(9.0, 10.0)])];
        let rows = measure_runs(&unknown, &file).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].compound.as_deref(), Some("glu"));
        assert!((rows[0].concentration.unwrap() - 2.5).abs() < 1e-9);
        assert!(rows[1].compound.is_none());
    }
}
