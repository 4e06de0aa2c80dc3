//! Application error type.
//!
//! `AppError` wraps the instrument error from `smu-core` together with the
//! failures that only exist at the application layer: loading the config
//! file, writing the CSV export and initialising logging.
//!
//! By using `#[from]`, each underlying error converts with `?`. The binary
//! adds context with `anyhow` on top of this.

use smu_core::SmuError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application-level error.
#[derive(Error, Debug)]
pub enum AppError {
    /// Instrument, session or driver failure
    #[error(transparent)]
    Instrument(#[from] SmuError),

    /// Config file could not be read or deserialised
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Config values parsed but are not usable
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// File I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export
    #[cfg(feature = "storage_csv")]
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// Tracing subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Requested functionality was compiled out
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(Box::new(err))
    }
}
