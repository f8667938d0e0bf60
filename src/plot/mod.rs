//! Terminal plots.

pub mod ascii;

pub use ascii::render_trace_plot;
