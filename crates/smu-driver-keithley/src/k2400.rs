//! Keithley 2400-series SourceMeter (SCPI).
//!
//! Protocol reference: Keithley 2400 Series User's Manual, section 18.
//!
//! - Commands are SCPI with `:` prefixes, newline terminated
//! - `:READ?` triggers one measurement and returns five comma-separated
//!   elements: `voltage,current,resistance,timestamp,status`
//! - Instruments configured with `:FORM:ELEM` for a single element return a
//!   bare number instead
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use smu_driver_keithley::Keithley2400Driver;
//!
//! let smu = Keithley2400Driver::new(session);
//! smu.setup(&SetupConfig::default()).await?;
//! let currents = smu.sweep(&[-1.0, 0.0, 1.0]).await?;
//! ```

use crate::command_set::CommandSet;
use crate::driver::SourceMeterDriver;
use futures::future::BoxFuture;
use serde::Deserialize;
use smu_core::driver::{parse_options, DriverFactory};
use smu_core::response::parse_field;
use smu_core::{MeasureFunction, Session, SmuResult, SourceFunction, SourceMeter};
use std::sync::Arc;

// =============================================================================
// Scpi2400 - CommandSet implementation
// =============================================================================

/// SCPI dialect of the 2400 series.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scpi2400;

impl Scpi2400 {
    fn mnemonic_source(function: SourceFunction) -> &'static str {
        match function {
            SourceFunction::Voltage => "VOLT",
            SourceFunction::Current => "CURR",
        }
    }

    fn mnemonic_measure(function: MeasureFunction) -> &'static str {
        match function {
            MeasureFunction::Voltage => "VOLT",
            MeasureFunction::Current => "CURR",
        }
    }
}

impl CommandSet for Scpi2400 {
    fn name(&self) -> &'static str {
        "scpi-2400"
    }

    fn output(&self, enabled: bool) -> String {
        let state = if enabled { "ON" } else { "OFF" };
        format!(":OUTP {}", state)
    }

    fn source_function(&self, function: SourceFunction) -> String {
        format!(":SOUR:FUNC {}", Self::mnemonic_source(function))
    }

    fn measure_function(&self, function: MeasureFunction) -> String {
        format!(":SENS:FUNC \"{}\"", Self::mnemonic_measure(function))
    }

    fn voltage_range(&self, volts: f64) -> String {
        format!(":SENS:VOLT:RANG {}", volts)
    }

    fn current_range(&self, amps: f64) -> String {
        format!(":SENS:CURR:RANG {}", amps)
    }

    fn delay(&self, seconds: f64) -> String {
        format!(":SOUR:DEL {}", seconds)
    }

    fn source_level(&self, function: SourceFunction, level: f64) -> String {
        format!(":SOUR:{} {}", Self::mnemonic_source(function), level)
    }

    fn measure_query(&self, _function: MeasureFunction) -> String {
        ":READ?".to_string()
    }

    fn parse_reading(&self, function: MeasureFunction, response: &str) -> SmuResult<f64> {
        let index = match function {
            MeasureFunction::Voltage => 0,
            MeasureFunction::Current => 1,
        };
        parse_field(response, index)
    }
}

/// Driver for the Keithley 2400 series.
pub type Keithley2400Driver = SourceMeterDriver<Scpi2400>;

impl Keithley2400Driver {
    /// Attach a 2400 driver to an open session.
    pub fn new(session: Arc<dyn Session>) -> Self {
        SourceMeterDriver::with_commands(session, Scpi2400)
    }
}

// =============================================================================
// Keithley2400Factory - DriverFactory implementation
// =============================================================================

/// Options for the 2400 driver (`[instrument.options]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Keithley2400Config {
    /// When set, `*IDN?` must contain this text or attaching fails.
    #[serde(default)]
    pub expect_model: Option<String>,
}

/// Factory for creating Keithley 2400 driver instances.
pub struct Keithley2400Factory;

impl DriverFactory for Keithley2400Factory {
    fn driver_type(&self) -> &'static str {
        "keithley2400"
    }

    fn name(&self) -> &'static str {
        "Keithley 2400 SourceMeter (SCPI)"
    }

    fn validate(&self, config: &toml::Value) -> SmuResult<()> {
        let _: Keithley2400Config = parse_options(self.driver_type(), config)?;
        Ok(())
    }

    fn build(
        &self,
        config: toml::Value,
        session: Arc<dyn Session>,
    ) -> BoxFuture<'static, SmuResult<Arc<dyn SourceMeter>>> {
        let driver_type = self.driver_type();
        Box::pin(async move {
            let cfg: Keithley2400Config = parse_options(driver_type, &config)?;
            let driver = Keithley2400Driver::new(session);
            if let Some(model) = cfg.expect_model.as_deref() {
                driver.verify_identity(model).await?;
            }
            Ok(Arc::new(driver) as Arc<dyn SourceMeter>)
        })
    }
}
