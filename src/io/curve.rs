//! Read/write calibration JSON files.
//!
//! A calibration file is the portable result of `hplc calibrate`:
//! - the compound table it was built with (names, retention times, tolerance)
//! - one line per successfully calibrated compound
//! - the tool name and a UTC timestamp
//!
//! The schema is defined by `domain::CalibrationFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CalibrationCurve, CalibrationFile, CompoundTable};
use crate::error::{ChromError, Result};

pub const TOOL_NAME: &str = "hplc-quant";

pub fn calibration_file(table: &CompoundTable, curves: Vec<CalibrationCurve>) -> CalibrationFile {
    CalibrationFile {
        tool: TOOL_NAME.to_string(),
        generated_at: Utc::now(),
        rt_tolerance: table.tolerance,
        compounds: table.compounds().to_vec(),
        curves,
    }
}

pub fn write_calibration_json(path: &Path, calibration: &CalibrationFile) -> Result<()> {
    let file = File::create(path).map_err(|e| ChromError::Io {
        path: path.display().to_string(),
        message: format!("failed to create calibration JSON: {e}"),
    })?;
    serde_json::to_writer_pretty(file, calibration).map_err(|e| ChromError::Io {
        path: path.display().to_string(),
        message: format!("failed to write calibration JSON: {e}"),
    })
}

pub fn read_calibration_json(path: &Path) -> Result<CalibrationFile> {
    let file = File::open(path).map_err(|e| ChromError::Io {
        path: path.display().to_string(),
        message: format!("failed to open calibration JSON: {e}"),
    })?;
    serde_json::from_reader(file).map_err(|e| ChromError::Parse {
        path: path.display().to_string(),
        message: format!("invalid calibration JSON: {e}"),
    })
}

impl CalibrationFile {
    /// Rebuild the compound table stored in this file.
    pub fn compound_table(&self) -> Result<CompoundTable> {
        CompoundTable::new(self.compounds.clone(), self.rt_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Compound;

    #[test]
    fn json_round_trip_keeps_curves_and_table() {
        let table = CompoundTable::new(
            vec![Compound {
                name: "glutamine".to_string(),
                retention_time: 3.293,
            }],
            0.05,
        )
        .unwrap();
        let curve = CalibrationCurve {
            compound: "glutamine".to_string(),
            slope: 120.5,
            intercept: -3.0,
            r_squared: 0.998,
            n_points: 5,
        };
        let file = calibration_file(&table, vec![curve.clone()]);

        let dir = std::env::temp_dir().join(format!("hplc-curve-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("calibration.json");
        write_calibration_json(&path, &file).unwrap();
        let back = read_calibration_json(&path).unwrap();

        assert_eq!(back.tool, TOOL_NAME);
        assert_eq!(back.curves, vec![curve]);
        assert_eq!(back.compound_table().unwrap(), table);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
