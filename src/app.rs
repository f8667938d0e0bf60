//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - sets up logging and loads `.env`
//! - parses CLI arguments
//! - runs the trace pipeline over the input files
//! - prints reports/plots
//! - writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{
    CalibrateArgs, Command, CompoundArgs, ConvertArgs, FitArgs, MeasureArgs, PeaksArgs, PlotArgs, QuantifyArgs,
    SimulateArgs, TraceArgs,
};
use crate::domain::{BoundsPolicy, CompoundTable, QuantifyConfig};
use crate::error::AppError;

use self::pipeline::{RunMode, TraceRun};

pub mod pipeline;

/// Entry point for the `hplc` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Quantify(args) => handle_quantify(args),
        Command::Peaks(args) => handle_peaks(args),
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Measure(args) => handle_measure(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Convert(args) => handle_convert(args),
    }
}

/// Logs go to stderr (stdout carries the reports). `RUST_LOG` overrides the `info` default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_quantify(args: QuantifyArgs) -> Result<(), AppError> {
    let table = load_table(&args.compounds)?;
    let config = quantify_config_from_args(&args.trace, Some(&args.fit), seed_positions(&args.compounds, table.as_ref()))?;
    let runs = successful_runs(pipeline::process_files(&args.trace.files, &config, RunMode::Fit))?;

    for run in &runs {
        println!("{}", crate::report::format_trace_summary(run));
        if let Some(table) = &table {
            let rows = crate::calibration::quantify_sample(&run.sample, &run.fit.peaks, table, &[]);
            let identified: Vec<_> = rows.into_iter().filter(|r| r.compound.is_some()).collect();
            if !identified.is_empty() {
                println!("Identified compounds:");
                println!("{}", crate::report::format_quantitation(&identified));
            }
        }
        print_plot(run, &args.plot);
    }

    if let Some(path) = &args.export_peaks {
        export_peaks(path, &runs)?;
    }
    if let Some(path) = &args.export_windows {
        export_windows(path, &runs)?;
    }
    Ok(())
}

fn handle_peaks(args: PeaksArgs) -> Result<(), AppError> {
    let table = load_table(&args.compounds)?;
    let config = quantify_config_from_args(&args.trace, None, seed_positions(&args.compounds, table.as_ref()))?;
    let runs = successful_runs(pipeline::process_files(&args.trace.files, &config, RunMode::SegmentOnly))?;

    for run in &runs {
        println!("{}", crate::report::format_segmentation(run));
    }
    if let Some(path) = &args.export_windows {
        export_windows(path, &runs)?;
    }
    Ok(())
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let table = load_table(&args.compounds)?
        .ok_or_else(|| AppError::new(2, "calibrate needs a compound table (--compounds or HPLC_COMPOUNDS)."))?;
    let config = quantify_config_from_args(&args.trace, Some(&args.fit), seed_positions(&args.compounds, Some(&table)))?;
    let runs = successful_runs(pipeline::process_files(&args.trace.files, &config, RunMode::Fit))?;

    let outcome = pipeline::calibrate_runs(&runs, &table, args.internal_standard.as_deref());
    println!("{}", crate::report::format_calibration(&outcome));
    if outcome.set.curves.is_empty() {
        return Err(AppError::new(3, "No compound could be calibrated."));
    }

    let file = crate::io::calibration_file(&table, outcome.set.curves.clone());
    crate::io::write_calibration_json(&args.output, &file)?;
    info!(path = %args.output.display(), curves = file.curves.len(), "wrote calibration");

    if let Some(path) = &args.export_peaks {
        export_peaks(path, &runs)?;
    }
    Ok(())
}

fn handle_measure(args: MeasureArgs) -> Result<(), AppError> {
    let calibration = crate::io::read_calibration_json(&args.calibration)?;
    let table = calibration.compound_table()?;
    let positions = args.seed_compounds.then(|| table.retention_times());
    let config = quantify_config_from_args(&args.trace, Some(&args.fit), positions)?;
    let runs = successful_runs(pipeline::process_files(&args.trace.files, &config, RunMode::Fit))?;

    let rows = pipeline::measure_runs(&runs, &calibration)?;
    println!("{}", crate::report::format_quantitation(&rows));

    if let Some(path) = &args.output {
        crate::io::write_quantitation_csv(path, &rows)?;
    }
    if let Some(path) = &args.export_peaks {
        export_peaks(path, &runs)?;
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let mut spec = crate::data::SimulationSpec {
        t_end: args.t_end,
        n_samples: args.samples,
        noise_sd: args.noise,
        amplitude_scale: args.scale,
        seed: args.seed,
        ..crate::data::SimulationSpec::default()
    };
    if !args.peaks.is_empty() {
        spec.peaks = args
            .peaks
            .iter()
            .map(|p| crate::data::parse_peak(p))
            .collect::<crate::error::Result<_>>()?;
    }

    let sim = crate::data::generate_trace(&spec)?;
    crate::io::write_trace_csv(&args.output, &sim.trace)?;
    info!(path = %args.output.display(), samples = sim.trace.len(), peaks = sim.peaks.len(), "wrote synthetic trace");

    if args.plot.plot {
        let plot = crate::plot::render_trace_plot(
            sim.trace.time(),
            sim.trace.intensity(),
            None,
            &[],
            args.plot.width,
            args.plot.height,
        );
        println!("{plot}");
    }
    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<(), AppError> {
    let mut failed = 0usize;
    for input in &args.files {
        let output = converted_path(input, args.out_dir.as_deref());
        let result = crate::io::load_instrument_export(input)
            .and_then(|rows| crate::io::write_converted_csv(&output, &rows).map(|()| rows.len()));
        match result {
            Ok(rows) => info!(input = %input.display(), output = %output.display(), rows, "converted"),
            Err(err) => {
                warn!(input = %input.display(), error = %err, "conversion failed");
                failed += 1;
            }
        }
    }
    if failed == args.files.len() {
        return Err(AppError::new(2, "No file could be converted."));
    }
    Ok(())
}

/// Build the pipeline configuration from parsed flags.
///
/// `positions` (from a compound table) takes precedence over `--positions`.
pub fn quantify_config_from_args(
    args: &TraceArgs,
    fit: Option<&FitArgs>,
    positions: Option<Vec<f64>>,
) -> Result<QuantifyConfig, AppError> {
    let time_window = match args.time_window.as_deref() {
        None => None,
        Some(&[start, end]) => Some((start, end)),
        Some(_) => return Err(AppError::new(2, "--time-window needs START and END.")),
    };
    let defaults = QuantifyConfig::default();
    let (bounds, max_iter) = match fit {
        Some(f) => (
            f.bounds.as_deref().map(BoundsPolicy::parse).transpose()?.unwrap_or_default(),
            f.max_iter,
        ),
        None => (defaults.bounds, defaults.max_iter),
    };

    Ok(QuantifyConfig {
        time_column: args.time_column.clone(),
        intensity_column: args.intensity_column.clone(),
        time_window,
        zero_first_sample: args.zero_first,
        baseline_iterations: args.baseline_iterations,
        shift_negative: !args.no_negative_shift,
        prominence: args.prominence,
        rel_height: args.rel_height,
        buffer: args.buffer,
        manual_positions: positions.or_else(|| args.positions.clone()),
        window_baseline_correction: args.window_baseline,
        bounds,
        max_iter,
    })
}

fn load_table(args: &CompoundArgs) -> Result<Option<CompoundTable>, AppError> {
    match &args.compounds {
        None => Ok(None),
        Some(path) => Ok(Some(crate::io::load_compounds(path, args.rt_tolerance)?)),
    }
}

fn seed_positions(args: &CompoundArgs, table: Option<&CompoundTable>) -> Option<Vec<f64>> {
    if !args.seed_compounds {
        return None;
    }
    if table.is_none() {
        warn!("--seed-compounds given without a compound table; using detected peaks");
    }
    table.map(CompoundTable::retention_times)
}

/// Log failed files and keep going; fail only when nothing was processed.
fn successful_runs(results: Vec<(PathBuf, Result<TraceRun, AppError>)>) -> Result<Vec<TraceRun>, AppError> {
    let total = results.len();
    let mut runs = Vec::with_capacity(total);
    let mut last_err = None;
    for (path, result) in results {
        match result {
            Ok(run) => runs.push(run),
            Err(err) => {
                warn!(file = %path.display(), "{err}");
                last_err = Some(err);
            }
        }
    }
    match last_err {
        Some(err) if runs.is_empty() => Err(err),
        _ => {
            if runs.len() < total {
                warn!(processed = runs.len(), total, "some files failed");
            }
            Ok(runs)
        }
    }
}

fn print_plot(run: &TraceRun, args: &PlotArgs) {
    if !args.plot {
        return;
    }
    let mixture = run.mixture();
    let plot = crate::plot::render_trace_plot(
        run.segmented.trace.time(),
        &run.segmented.baseline.corrected,
        Some(&mixture),
        &run.fit.peaks,
        args.width,
        args.height,
    );
    println!("{plot}");
}

fn export_peaks(path: &Path, runs: &[TraceRun]) -> Result<(), AppError> {
    let rows: Vec<_> = runs.iter().map(|r| (r.sample.clone(), r.fit.peaks.clone())).collect();
    Ok(crate::io::write_peaks_csv(path, &rows)?)
}

fn export_windows(path: &Path, runs: &[TraceRun]) -> Result<(), AppError> {
    let rows: Vec<_> = runs
        .iter()
        .map(|r| (r.sample.clone(), r.segmented.segmentation.windows.clone()))
        .collect();
    Ok(crate::io::write_windows_csv(path, &rows)?)
}

fn converted_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let name = format!(
        "{}.csv",
        input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default()
    );
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};

    fn trace_args(argv: &[&str]) -> (TraceArgs, FitArgs) {
        let mut full = vec!["hplc", "quantify"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Quantify(a) => (a.trace, a.fit),
            _ => unreachable!(),
        }
    }

    #[test]
    fn config_from_args_maps_flags() {
        let (trace, fit) = trace_args(&[
            "a.csv",
            "--time-window",
            "1",
            "9",
            "--no-negative-shift",
            "--bounds",
            "0,0.03,0,-10,1000,0.03,0.1,10",
            "--positions",
            "2.5",
        ]);
        let cfg = quantify_config_from_args(&trace, Some(&fit), None).unwrap();
        assert_eq!(cfg.time_window, Some((1.0, 9.0)));
        assert!(!cfg.shift_negative);
        assert!(matches!(cfg.bounds, BoundsPolicy::Custom(_)));
        assert_eq!(cfg.manual_positions, Some(vec![2.5]));

        let cfg = quantify_config_from_args(&trace, None, Some(vec![1.4, 3.3])).unwrap();
        assert_eq!(cfg.manual_positions, Some(vec![1.4, 3.3]));
        assert_eq!(cfg.bounds, BoundsPolicy::Default);
    }

    #[test]
    fn bad_bounds_are_input_errors() {
        let (trace, fit) = trace_args(&["a.csv", "--bounds", "1,2,3"]);
        let err = quantify_config_from_args(&trace, Some(&fit), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn converted_path_swaps_extension() {
        assert_eq!(converted_path(Path::new("d/run1.txt"), None), PathBuf::from("d/run1.csv"));
        assert_eq!(
            converted_path(Path::new("d/run1.txt"), Some(Path::new("out"))),
            PathBuf::from("out/run1.csv")
        );
    }
}
