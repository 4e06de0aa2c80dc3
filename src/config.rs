//! Configuration using Figment.
//!
//! Settings are loaded from:
//! 1. a TOML file (`config/sweep.toml` by default)
//! 2. environment variables prefixed with `SMU_SWEEP_`, using `__` between
//!    section and key (e.g. `SMU_SWEEP_INSTRUMENT__ADDRESS`)
//!
//! Every section has defaults, so an empty file is a valid configuration: a
//! Keithley 2400 on the first discovered port, default setup, and a five
//! point sweep from -1 V to 1 V.
//!
//! # Example
//! ```toml
//! [instrument]
//! driver = "keithley2614b"
//! address = "TCPIP::192.168.1.50::5025::SOCKET"
//!
//! [instrument.options]
//! channel = "b"
//!
//! [sweep]
//! start = -2.0
//! stop = 2.0
//! points = 41
//! ```

use crate::error::{AppError, AppResult};
use crate::logging::{parse_log_level, OutputFormat};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use smu_core::{SessionSettings, SetupConfig, SmuResult, SweepPlan};
use std::path::{Path, PathBuf};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sweep.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SMU_SWEEP_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logging
    pub application: ApplicationConfig,
    /// Which instrument and how to reach it
    pub instrument: InstrumentConfig,
    /// Measurement setup
    pub setup: SetupConfig,
    /// Set-points
    pub sweep: SweepSpec,
    /// Simulated instrument
    pub simulation: SimulationConfig,
    /// Result export
    pub output: OutputConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
    /// Emit span open/close events
    pub log_span_events: bool,
    /// Include source file and line in log lines
    pub log_file_and_line: bool,
    /// ANSI colours (pretty format only)
    pub log_ansi: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Pretty,
            log_span_events: false,
            log_file_and_line: false,
            log_ansi: true,
        }
    }
}

/// Instrument selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Driver type, `keithley2400` or `keithley2614b`
    pub driver: String,
    /// Explicit address; when absent the first discovered port is used
    pub address: Option<String>,
    /// Link parameters
    pub session: SessionSettings,
    /// Driver-specific options, validated by the driver factory
    pub options: toml::Table,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            driver: "keithley2400".to_string(),
            address: None,
            session: SessionSettings::default(),
            options: toml::Table::new(),
        }
    }
}

/// Set-point specification.
///
/// An explicit `levels` list takes precedence over the linear range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSpec {
    /// Explicit set-points, in order
    pub levels: Option<Vec<f64>>,
    /// First level of a linear sweep
    pub start: f64,
    /// Last level of a linear sweep
    pub stop: f64,
    /// Number of levels in a linear sweep
    pub points: usize,
    /// Sweep back to `start` after reaching `stop`
    pub dual: bool,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            levels: None,
            start: -1.0,
            stop: 1.0,
            points: 5,
            dual: false,
        }
    }
}

impl SweepSpec {
    /// Build the set-point plan.
    pub fn plan(&self) -> SmuResult<SweepPlan> {
        match &self.levels {
            Some(levels) => SweepPlan::new(levels.clone()),
            None if self.dual => SweepPlan::dual(self.start, self.stop, self.points),
            None => SweepPlan::linear(self.start, self.stop, self.points),
        }
    }
}

/// Simulated instrument (`sweep --simulate`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Use the simulator even without `--simulate`
    pub enabled: bool,
    /// Load resistance in ohms
    pub resistance_ohms: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resistance_ohms: 1000.0,
        }
    }
}

/// Result export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the sweep to this CSV file
    pub csv_path: Option<PathBuf>,
}

impl Settings {
    /// Load from the default path if it exists, else defaults plus environment.
    pub fn load() -> AppResult<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::figment(None).extract()?)
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// The file must exist; environment variables override its values.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Validation(format!(
                "config file '{}' not found",
                path.display()
            )));
        }
        Ok(Self::figment(Some(path)).extract()?)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::new();
        let figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        parse_log_level(&self.application.log_level)?;

        let factory = smu_driver_keithley::factory(&self.instrument.driver)?;
        factory.validate(&toml::Value::Table(self.instrument.options.clone()))?;

        let session = &self.instrument.session;
        if session.timeout_ms == 0 {
            return Err(AppError::Validation(
                "instrument.session.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if session.baud_rate == 0 {
            return Err(AppError::Validation(
                "instrument.session.baud_rate must be greater than 0".to_string(),
            ));
        }
        if session.terminator.is_empty() {
            return Err(AppError::Validation(
                "instrument.session.terminator must not be empty".to_string(),
            ));
        }

        self.setup.validate()?;
        self.sweep.plan()?;

        let ohms = self.simulation.resistance_ohms;
        if !(ohms.is_finite() && ohms > 0.0) {
            return Err(AppError::Validation(format!(
                "simulation.resistance_ohms must be positive, got {}",
                ohms
            )));
        }

        Ok(())
    }
}
