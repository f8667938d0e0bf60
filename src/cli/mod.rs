//! Command-line parsing for the HPLC quantification tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the signal-processing/fitting code.
//!
//! Flags that tend to be fixed per lab setup also read `HPLC_*` environment
//! variables (a `.env` file in the working directory is loaded at startup).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "hplc", version, about = "HPLC chromatogram peak fitting and quantification")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Remove the baseline, fit every peak and print a per-trace report.
    Quantify(QuantifyArgs),
    /// Print peak windows and candidate positions without fitting.
    Peaks(PeaksArgs),
    /// Fit calibration standards (`<number>mM` in the file name) and save curves as JSON.
    Calibrate(CalibrateArgs),
    /// Quantify unknown samples with a saved calibration.
    Measure(MeasureArgs),
    /// Write a synthetic chromatogram (skew-normal peaks on a drifting baseline).
    Simulate(SimulateArgs),
    /// Convert instrument text exports to tidy CSV.
    Convert(ConvertArgs),
}

/// Input and preprocessing options shared by every trace-processing command.
#[derive(Debug, Args, Clone)]
pub struct TraceArgs {
    /// Trace files (tidy CSV, or `.txt` instrument exports).
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Time column name (case-insensitive).
    #[arg(long, env = "HPLC_TIME_COLUMN", default_value = "time_min")]
    pub time_column: String,

    /// Intensity column name (case-insensitive).
    #[arg(long, env = "HPLC_INTENSITY_COLUMN", default_value = "intensity_mV")]
    pub intensity_column: String,

    /// Analyse only `START <= t <= END`.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub time_window: Option<Vec<f64>>,

    /// Subtract the first intensity from the whole trace before baseline removal.
    #[arg(long)]
    pub zero_first: bool,

    /// Baseline clipping iterations (0 disables baseline removal).
    #[arg(long, env = "HPLC_BASELINE_ITERATIONS", default_value_t = 80)]
    pub baseline_iterations: usize,

    /// Do not shift negative backgrounds before clipping.
    #[arg(long)]
    pub no_negative_shift: bool,

    /// Minimum peak prominence, relative to the tallest sample (0..=1).
    #[arg(long, env = "HPLC_PROMINENCE", default_value_t = 1e-3)]
    pub prominence: f64,

    /// Relative height at which peak widths (and windows) are measured (0..=1).
    #[arg(long, default_value_t = 1.0)]
    pub rel_height: f64,

    /// Samples of padding on each side of a peak window.
    #[arg(long, env = "HPLC_BUFFER", default_value_t = 100)]
    pub buffer: usize,

    /// Comma-separated peak positions (time units) instead of automatic detection.
    #[arg(long, value_delimiter = ',', value_name = "T1,T2,..")]
    pub positions: Option<Vec<f64>>,

    /// Subtract each window's baseline height before fitting.
    #[arg(long)]
    pub window_baseline: bool,
}

/// Mixture-fit options.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Custom bounds `aLo,tLo,sLo,kLo,aHi,tHi,sHi,kHi` (amplitude factors, time
    /// offsets around the seed, scale and skew limits).
    #[arg(long, allow_hyphen_values = true)]
    pub bounds: Option<String>,

    /// Optimizer iteration cap per window.
    #[arg(long, env = "HPLC_MAX_ITER", default_value_t = 10_000)]
    pub max_iter: usize,
}

/// Compound table options.
#[derive(Debug, Args, Clone)]
pub struct CompoundArgs {
    /// Compound table CSV (`name,retention_time`).
    #[arg(long, env = "HPLC_COMPOUNDS")]
    pub compounds: Option<PathBuf>,

    /// Retention-time match tolerance (time units).
    #[arg(long, env = "HPLC_RT_TOLERANCE", default_value_t = 0.05)]
    pub rt_tolerance: f64,

    /// Seed the fit at the compound retention times instead of detected peaks.
    #[arg(long)]
    pub seed_compounds: bool,
}

/// Terminal plot options.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Render an ASCII plot of the corrected trace and the fitted mixture.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct QuantifyArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    #[command(flatten)]
    pub fit: FitArgs,

    #[command(flatten)]
    pub compounds: CompoundArgs,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export fitted peaks to CSV.
    #[arg(long)]
    pub export_peaks: Option<PathBuf>,

    /// Export peak windows to CSV.
    #[arg(long)]
    pub export_windows: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PeaksArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    #[command(flatten)]
    pub compounds: CompoundArgs,

    /// Export peak windows to CSV.
    #[arg(long)]
    pub export_windows: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    #[command(flatten)]
    pub fit: FitArgs,

    #[command(flatten)]
    pub compounds: CompoundArgs,

    /// Report area mean/SD/CV of this compound across the standards.
    #[arg(long)]
    pub internal_standard: Option<String>,

    /// Calibration JSON to write.
    #[arg(long, short = 'o', default_value = "calibration.json")]
    pub output: PathBuf,

    /// Export fitted peaks of the standards to CSV.
    #[arg(long)]
    pub export_peaks: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct MeasureArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    #[command(flatten)]
    pub fit: FitArgs,

    /// Calibration JSON produced by `hplc calibrate`.
    #[arg(long, env = "HPLC_CALIBRATION")]
    pub calibration: PathBuf,

    /// Seed the fit at the calibrated compound retention times.
    #[arg(long)]
    pub seed_compounds: bool,

    /// Write concentrations to CSV.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Export fitted peaks to CSV.
    #[arg(long)]
    pub export_peaks: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Peak as `amplitude,location,scale,skew` (repeatable; defaults to three peaks).
    #[arg(long = "peak", allow_hyphen_values = true)]
    pub peaks: Vec<String>,

    /// Run length (minutes).
    #[arg(long, default_value_t = 15.0)]
    pub t_end: f64,

    /// Number of samples.
    #[arg(long, default_value_t = 4501)]
    pub samples: usize,

    /// Gaussian noise standard deviation.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// Multiply every amplitude (simulates a dilution series).
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV (`time_min,intensity_mV`).
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    #[command(flatten)]
    pub plot: PlotArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    /// Instrument text exports.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory for the converted CSVs (defaults to next to each input).
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantify_defaults() {
        let cli = Cli::try_parse_from(["hplc", "quantify", "a.csv", "b.csv"]).unwrap();
        let Command::Quantify(args) = cli.command else {
            panic!("expected quantify");
        };
        assert_eq!(args.trace.files.len(), 2);
        assert_eq!(args.trace.buffer, 100);
        assert_eq!(args.trace.rel_height, 1.0);
        assert_eq!(args.fit.max_iter, 10_000);
        assert!(!args.plot.plot);
    }

    #[test]
    fn positions_and_window_parse() {
        let cli = Cli::try_parse_from([
            "hplc",
            "peaks",
            "a.csv",
            "--positions",
            "1.43,3.29",
            "--time-window",
            "0.5",
            "12",
        ])
        .unwrap();
        let Command::Peaks(args) = cli.command else {
            panic!("expected peaks");
        };
        assert_eq!(args.trace.positions, Some(vec![1.43, 3.29]));
        assert_eq!(args.trace.time_window, Some(vec![0.5, 12.0]));
    }

    #[test]
    fn negative_bounds_are_accepted() {
        let cli = Cli::try_parse_from([
            "hplc",
            "quantify",
            "a.csv",
            "--bounds",
            "0,0.03,0,-10,1000,0.03,0.1,10",
        ])
        .unwrap();
        let Command::Quantify(args) = cli.command else {
            panic!("expected quantify");
        };
        assert_eq!(args.fit.bounds.as_deref(), Some("0,0.03,0,-10,1000,0.03,0.1,10"));
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["hplc", "quantify"]).is_err());
    }
}
