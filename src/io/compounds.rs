//! Compound table CSV (`name,retention_time`).

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{Compound, CompoundTable};
use crate::error::{ChromError, Result};

#[derive(Debug, Deserialize)]
struct CompoundRow {
    name: String,
    retention_time: f64,
}

/// Load a compound table; `tolerance` is the retention-time match window.
pub fn load_compounds(path: &Path, tolerance: f64) -> Result<CompoundTable> {
    let file = File::open(path).map_err(|e| ChromError::Io {
        path: path.display().to_string(),
        message: format!("failed to open compound table: {e}"),
    })?;
    read_compounds(file, tolerance).map_err(|e| match e {
        ChromError::InvalidInput(message) => ChromError::Parse {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

pub fn read_compounds<R: std::io::Read>(reader: R, tolerance: f64) -> Result<CompoundTable> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut compounds = Vec::new();
    for (idx, row) in reader.deserialize::<CompoundRow>().enumerate() {
        let row = row.map_err(|e| ChromError::invalid(format!("compound table line {}: {e}", idx + 2)))?;
        compounds.push(Compound {
            name: row.name,
            retention_time: row.retention_time,
        });
    }
    if compounds.is_empty() {
        return Err(ChromError::invalid("compound table is empty"));
    }
    CompoundTable::new(compounds, tolerance)
}
