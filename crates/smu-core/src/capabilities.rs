//! Source-measure unit capability.
//!
//! A [`SourceMeter`] wraps an open [`crate::session::Session`] and knows the
//! instrument's command dialect. The application drives it in a fixed order:
//!
//! 1. `setup(&SetupConfig)` - output off, then functions, ranges and delay
//! 2. `sweep(&levels)` - output on, one reading per level, output off
//!
//! Drivers keep no state that outlives a call except the functions chosen in
//! the last successful `setup`.

use crate::error::{SmuError, SmuResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantity the instrument sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFunction {
    /// Force voltage
    #[default]
    Voltage,
    /// Force current
    Current,
}

/// Quantity the instrument measures and displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureFunction {
    /// Measure current
    #[default]
    Current,
    /// Measure voltage
    Voltage,
}

impl fmt::Display for SourceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFunction::Voltage => write!(f, "voltage"),
            SourceFunction::Current => write!(f, "current"),
        }
    }
}

impl fmt::Display for MeasureFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureFunction::Current => write!(f, "current"),
            MeasureFunction::Voltage => write!(f, "voltage"),
        }
    }
}

/// Measurement configuration applied by [`SourceMeter::setup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Source function
    pub source: SourceFunction,
    /// Measurement function
    pub measure: MeasureFunction,
    /// Voltage measurement range (V)
    pub voltage_range: f64,
    /// Current measurement range (A)
    pub current_range: f64,
    /// Settling delay between sourcing and measuring (s)
    pub delay_s: f64,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            source: SourceFunction::Voltage,
            measure: MeasureFunction::Current,
            voltage_range: 2.0,
            current_range: 0.1,
            delay_s: 0.0,
        }
    }
}

impl SetupConfig {
    /// Check ranges and delay before anything is sent to the instrument.
    pub fn validate(&self) -> SmuResult<()> {
        if !(self.voltage_range.is_finite() && self.voltage_range > 0.0) {
            return Err(SmuError::Configuration(format!(
                "voltage_range must be positive, got {}",
                self.voltage_range
            )));
        }
        if !(self.current_range.is_finite() && self.current_range > 0.0) {
            return Err(SmuError::Configuration(format!(
                "current_range must be positive, got {}",
                self.current_range
            )));
        }
        if !(self.delay_s.is_finite() && self.delay_s >= 0.0) {
            return Err(SmuError::Configuration(format!(
                "delay_s must be zero or positive, got {}",
                self.delay_s
            )));
        }
        Ok(())
    }
}

/// Capability: source levels and read back one value per level.
///
/// # Contract
/// - `setup` issues exactly six writes, output-off first, and nothing else
/// - `sweep` returns one reading per level, in level order, or an error
/// - Output is off when `sweep` returns, whether it succeeded or not
/// - Calls on one instrument are serialised
#[async_trait]
pub trait SourceMeter: Send + Sync {
    /// Query the identification string (`*IDN?`).
    async fn identify(&self) -> SmuResult<String>;

    /// Apply the measurement configuration.
    ///
    /// Stops at the first failed write; the instrument may then be partially
    /// configured.
    async fn setup(&self, config: &SetupConfig) -> SmuResult<()>;

    /// Run a sweep over `levels` and return the measured values.
    ///
    /// An empty slice is valid: output is enabled and disabled, nothing is
    /// measured. On the first failure the sweep aborts and the error is
    /// returned; readings taken so far are discarded.
    async fn sweep(&self, levels: &[f64]) -> SmuResult<Vec<f64>>;

    /// Turn the output off.
    async fn disable_output(&self) -> SmuResult<()>;
}
