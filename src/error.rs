//! Error types.
//!
//! - [`ChromError`] is the library taxonomy returned by the numerical core and
//!   the I/O helpers.
//! - [`AppError`] is what the binary reports: a message plus a process exit code.
//!
//! Exit codes:
//! - 2: invalid input / configuration / file errors
//! - 3: not enough data (calibration levels, matched peaks, usable rows)
//! - 4: numerical failure (non-convergence, undefined division)

use thiserror::Error;

/// Convenience alias for library results.
pub type Result<T> = std::result::Result<T, ChromError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChromError {
    /// Malformed trace, time window or out-of-range parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The optimizer gave up on one window. Recoverable: the window is skipped.
    #[error("fit did not converge for window {window} after {iterations} iterations: {reason}")]
    FitNonConvergence {
        window: usize,
        iterations: usize,
        reason: String,
    },

    /// Fewer than two concentration levels, or duplicate/missing peak matches.
    #[error("insufficient calibration data for `{compound}`: {reason}")]
    InsufficientCalibrationData { compound: String, reason: String },

    /// A calibration line with zero slope cannot be inverted.
    #[error("cannot resolve concentration for `{compound}`: calibration slope is {slope}")]
    DivisionUndefined { compound: String, slope: f64 },

    /// File could not be read or written.
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    /// File was readable but its content could not be parsed.
    #[error("{path}: {message}")]
    Parse { path: String, message: String },
}

impl ChromError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ChromError::InvalidInput(message.into())
    }

    /// Process exit code used when this error reaches `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            ChromError::InvalidInput(_) | ChromError::Io { .. } | ChromError::Parse { .. } => 2,
            ChromError::InsufficientCalibrationData { .. } => 3,
            ChromError::FitNonConvergence { .. } | ChromError::DivisionUndefined { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Attach a sample/file name to an error coming out of the core.
    pub fn with_context(context: &str, err: ChromError) -> Self {
        Self::new(err.exit_code(), format!("{context}: {err}"))
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ChromError> for AppError {
    fn from(err: ChromError) -> Self {
        Self::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
