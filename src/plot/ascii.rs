//! ASCII plotting of a chromatogram for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - (baseline-corrected) signal samples: `o`
//! - inferred mixture (sum of fitted peaks): `-` line
//! - fitted retention times: `^` on the axis row under the grid

use crate::domain::FittedPeak;

/// Render the signal, optionally with the fitted mixture and peak markers.
///
/// `mixture` must be index-aligned with `time` when given.
pub fn render_trace_plot(
    time: &[f64],
    signal: &[f64],
    mixture: Option<&[f64]>,
    peaks: &[FittedPeak],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let (t_min, t_max) = time_range(time).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = y_range(signal, mixture).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so samples overlay it.
    if let Some(mix) = mixture {
        let points: Vec<(f64, f64)> = time.iter().copied().zip(mix.iter().copied()).collect();
        draw_curve(&mut grid, &points, t_min, t_max, y_min, y_max);
    }

    for (&t, &y) in time.iter().zip(signal.iter()) {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.3}, {t_max:.3}] min | y=[{y_min:.2}, {y_max:.2}] mV\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    if !peaks.is_empty() {
        let mut axis = vec![' '; width];
        for p in peaks {
            if p.location.is_finite() {
                axis[map_x(p.location, t_min, t_max, width)] = '^';
            }
        }
        out.push_str(&axis.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn time_range(time: &[f64]) -> Option<(f64, f64)> {
    let (first, last) = (*time.first()?, *time.last()?);
    (first.is_finite() && last.is_finite() && last > first).then_some((first, last))
}

fn y_range(signal: &[f64], mixture: Option<&[f64]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &y in signal.iter().chain(mixture.unwrap_or(&[]).iter()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) if (x0, y0) != (x, yy) => draw_line(grid, x0, y0, x, yy, '-'),
            Some(_) => {}
            None => grid[yy][x] = '-',
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let time = [0.0, 1.0, 2.0, 3.0, 4.0];
        let signal = [0.0, 0.0, 4.0, 0.0, 0.0];
        let peak = FittedPeak {
            window_id: 1,
            peak_index: 1,
            seed_location: 2.0,
            amplitude: 4.0,
            location: 2.0,
            scale: 0.3,
            skew: 0.0,
            area: 3.0,
        };

        let txt = render_trace_plot(&time, &signal, None, &[peak], 10, 5);
        let expected = concat!(
            "Plot: t=[0.000, 4.000] min | y=[-0.20, 4.20] mV\n",
            "     o    \n",
            "          \n",
            "          \n",
            "          \n",
            "o o    o o\n",
            "     ^    \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn mixture_is_drawn_under_samples() {
        let time = [0.0, 1.0, 2.0, 3.0, 4.0];
        let signal = [0.0, 0.0, 4.0, 0.0, 0.0];
        let mixture = [0.0, 1.0, 4.0, 1.0, 0.0];
        let txt = render_trace_plot(&time, &signal, Some(&mixture), &[], 10, 5);
        assert!(txt.contains('-'));
        assert_eq!(txt.lines().count(), 6);
        assert!(txt.lines().nth(1).unwrap().contains('o'));
    }
}
