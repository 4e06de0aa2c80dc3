//! # smu-sweep
//!
//! Application layer for running IV sweeps on Keithley source-measure units.
//! Instrument access lives in the `smu-core` and `smu-driver-keithley`
//! crates; this crate adds configuration, logging, export and the
//! orchestration used by the `smu-sweep` binary.
//!
//! ## Crate Structure
//!
//! - **`config`**: Figment-based settings (TOML file plus `SMU_SWEEP_` env
//!   overrides) and their validation.
//! - **`error`**: `AppError`, wrapping `SmuError` and application failures.
//! - **`export`**: `SweepRecord` rows and CSV export.
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`run`**: session acquisition, driver attachment, setup and sweep.

pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod run;

pub use config::Settings;
pub use error::{AppError, AppResult};
pub use run::SweepReport;
