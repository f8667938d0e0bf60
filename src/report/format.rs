//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the numerical core stays free of presentation concerns
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::{CalibrationOutcome, TraceRun};
use crate::calibration::Quantitation;
use crate::domain::{FittedPeak, PeakWindow};

/// Trace-level summary: input stats, segmentation diagnostics and fitted peaks.
pub fn format_trace_summary(run: &TraceRun) -> String {
    let mut out = String::new();
    let seg = &run.segmented;
    let time = seg.trace.time();

    out.push_str(&format!("=== hplc - {} ===\n", run.sample));
    out.push_str(&format!(
        "Samples: n={} | t=[{:.3}, {:.3}] min | step={:.5} min\n",
        seg.trace.len(),
        time.first().copied().unwrap_or(f64::NAN),
        time.last().copied().unwrap_or(f64::NAN),
        seg.trace.mean_step(),
    ));
    if run.skipped_rows > 0 {
        out.push_str(&format!("Skipped rows: {}\n", run.skipped_rows));
    }
    out.push_str(&format!("Baseline shift: {:.4}\n", seg.baseline.shift));
    out.push_str(&format!(
        "Windows: {} | candidates={} | overlaps={} | discarded at t0={}\n",
        seg.segmentation.windows.len(),
        seg.segmentation.candidate_count(),
        seg.segmentation.overlaps.len(),
        seg.segmentation.discarded_at_boundary,
    ));
    for o in &seg.segmentation.overlaps {
        out.push_str(&format!(
            "  (overlap) windows {} and {} share samples [{}, {}); kept in {}\n",
            o.earlier, o.later, o.start, o.end, o.later
        ));
    }

    out.push_str("\nFitted peaks:\n");
    out.push_str(&format_peak_table(&run.fit.peaks));
    for f in &run.fit.failures {
        out.push_str(&format!("  (window {} failed) {}\n", f.window_id, f.error));
    }
    out
}

/// Peak positions per window, without fitting.
pub fn format_segmentation(run: &TraceRun) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== hplc peaks - {} ===\n", run.sample));
    out.push_str(&format_window_table(&run.segmented.segmentation.windows));
    if run.segmented.segmentation.discarded_at_boundary > 0 {
        out.push_str(&format!(
            "({} position(s) at the first sample discarded)\n",
            run.segmented.segmentation.discarded_at_boundary
        ));
    }
    out
}

fn format_window_table(windows: &[PeakWindow]) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        format!("{:>6} {:>10} {:>10} {:>10} {:<}", "window", "t_start", "t_end", "base", "candidates"),
    );
    push_row(&mut out, format!("{:-<6} {:-<10} {:-<10} {:-<10} {:-<10}", "", "", "", "", ""));
    for w in windows {
        let cands: Vec<String> = w.candidates.iter().map(|c| format!("{:.3}", c.location)).collect();
        push_row(
            &mut out,
            format!(
                "{:>6} {:>10.3} {:>10.3} {:>10.3} {}",
                w.id,
                w.time.first().copied().unwrap_or(f64::NAN),
                w.time.last().copied().unwrap_or(f64::NAN),
                w.baseline_height,
                cands.join(", "),
            ),
        );
    }
    out
}

fn format_peak_table(peaks: &[FittedPeak]) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        format!(
            "{:>4} {:>6} {:>10} {:>12} {:>10} {:>8} {:>12}",
            "peak", "window", "rt", "amplitude", "scale", "skew", "area"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<4} {:-<6} {:-<10} {:-<12} {:-<10} {:-<8} {:-<12}", "", "", "", "", "", "", ""),
    );
    for p in peaks {
        push_row(
            &mut out,
            format!(
                "{:>4} {:>6} {:>10.4} {:>12.4} {:>10.4} {:>8.3} {:>12.4}",
                p.peak_index, p.window_id, p.location, p.amplitude, p.scale, p.skew, p.area
            ),
        );
    }
    out
}

/// Calibration curves, excluded compounds and internal-standard spread.
pub fn format_calibration(outcome: &CalibrationOutcome) -> String {
    let mut out = String::new();
    out.push_str("=== hplc calibrate ===\n");
    let levels: Vec<String> = outcome
        .samples
        .iter()
        .map(|s| format!("{}={}", s.name, s.concentration))
        .collect();
    out.push_str(&format!("Standards: {} [{}]\n", outcome.samples.len(), levels.join(", ")));
    for (sample, reason) in &outcome.skipped {
        out.push_str(&format!("  (skipped {sample}) {reason}\n"));
    }

    out.push_str("\nCurves (area = slope * conc + intercept):\n");
    push_row(
        &mut out,
        format!("{:<20} {:>12} {:>12} {:>8} {:>4}", "compound", "slope", "intercept", "r2", "n"),
    );
    push_row(&mut out, format!("{:-<20} {:-<12} {:-<12} {:-<8} {:-<4}", "", "", "", "", ""));
    for c in &outcome.set.curves {
        push_row(
            &mut out,
            format!(
                "{:<20} {:>12.4} {:>12.4} {:>8.5} {:>4}",
                truncate(&c.compound, 20),
                c.slope,
                c.intercept,
                c.r_squared,
                c.n_points
            ),
        );
    }
    for issue in &outcome.matched.issues {
        out.push_str(&format!("  (excluded) {}\n", issue.to_error()));
    }
    for (compound, err) in &outcome.set.failures {
        out.push_str(&format!("  (failed {compound}) {err}\n"));
    }

    if let Some((name, stats)) = &outcome.internal_standard {
        out.push_str(&format!("\nInternal standard `{name}`: "));
        match stats {
            Some(s) => out.push_str(&format!(
                "n={} mean={:.4} sd={:.4} cv={:.2}%\n",
                s.n, s.mean, s.std_dev, s.cv_percent
            )),
            None => out.push_str("no single-match peaks\n"),
        }
    }
    out
}

/// Identified peaks with their concentrations; unidentified peaks are listed too.
pub fn format_quantitation(rows: &[Quantitation]) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        format!(
            "{:<16} {:>4} {:>10} {:>12} {:<20} {:>12} {:<}",
            "sample", "peak", "rt", "area", "compound", "conc", "note"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<16} {:-<4} {:-<10} {:-<12} {:-<20} {:-<12} {:-<4}", "", "", "", "", "", "", ""),
    );
    for r in rows {
        let conc = r.concentration.map(|c| format!("{c:.4}")).unwrap_or_else(|| "-".to_string());
        push_row(
            &mut out,
            format!(
                "{:<16} {:>4} {:>10.4} {:>12.4} {:<20} {:>12} {}",
                truncate(&r.sample, 16),
                r.peak_index,
                r.retention_time,
                r.area,
                truncate(r.compound.as_deref().unwrap_or("-"), 20),
                conc,
                r.note.as_deref().unwrap_or(""),
            ),
        );
    }
    out
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
