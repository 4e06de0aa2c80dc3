//! Keithley 2600B-series System SourceMeter (TSP).
//!
//! The 2614B is driven with Test Script Processor (Lua) statements rather than
//! SCPI. Each channel is a table (`smua`, `smub`); settings are assignments and
//! readings are returned with `print(...)`.
//!
//! - `smua.source.levelv = 0.5` sets a level, no response
//! - `print(smua.measure.i())` triggers one measurement and prints it
//! - `*IDN?` is still accepted for identification

use crate::command_set::CommandSet;
use crate::driver::SourceMeterDriver;
use futures::future::BoxFuture;
use serde::Deserialize;
use smu_core::driver::{parse_options, DriverFactory};
use smu_core::response::parse_number;
use smu_core::{MeasureFunction, Session, SmuResult, SourceFunction, SourceMeter};
use std::fmt;
use std::sync::Arc;

/// SMU channel on a dual-channel 2600B instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Channel A (`smua`)
    #[default]
    #[serde(alias = "smua")]
    A,
    /// Channel B (`smub`)
    #[serde(alias = "smub")]
    B,
}

impl Channel {
    fn table(self) -> &'static str {
        match self {
            Channel::A => "smua",
            Channel::B => "smub",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// =============================================================================
// Tsp2614B - CommandSet implementation
// =============================================================================

/// TSP dialect of the 2600B series, bound to one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tsp2614B {
    channel: Channel,
}

impl Tsp2614B {
    /// Dialect for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Channel this dialect addresses.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl CommandSet for Tsp2614B {
    fn name(&self) -> &'static str {
        "tsp-2614b"
    }

    fn output(&self, enabled: bool) -> String {
        let ch = self.channel.table();
        let state = if enabled { "OUTPUT_ON" } else { "OUTPUT_OFF" };
        format!("{ch}.source.output = {ch}.{state}")
    }

    fn source_function(&self, function: SourceFunction) -> String {
        let ch = self.channel.table();
        let func = match function {
            SourceFunction::Voltage => "OUTPUT_DCVOLTS",
            SourceFunction::Current => "OUTPUT_DCAMPS",
        };
        format!("{ch}.source.func = {ch}.{func}")
    }

    fn measure_function(&self, function: MeasureFunction) -> String {
        let ch = self.channel.table();
        let func = match function {
            MeasureFunction::Current => "MEASURE_DCAMPS",
            MeasureFunction::Voltage => "MEASURE_DCVOLTS",
        };
        format!("display.{ch}.measure.func = display.{func}")
    }

    fn voltage_range(&self, volts: f64) -> String {
        format!("{}.measure.rangev = {}", self.channel.table(), volts)
    }

    fn current_range(&self, amps: f64) -> String {
        format!("{}.measure.rangei = {}", self.channel.table(), amps)
    }

    fn delay(&self, seconds: f64) -> String {
        format!("{}.measure.delay = {}", self.channel.table(), seconds)
    }

    fn source_level(&self, function: SourceFunction, level: f64) -> String {
        let attr = match function {
            SourceFunction::Voltage => "levelv",
            SourceFunction::Current => "leveli",
        };
        format!("{}.source.{} = {}", self.channel.table(), attr, level)
    }

    fn measure_query(&self, function: MeasureFunction) -> String {
        let method = match function {
            MeasureFunction::Current => "i",
            MeasureFunction::Voltage => "v",
        };
        format!("print({}.measure.{}())", self.channel.table(), method)
    }

    fn parse_reading(&self, _function: MeasureFunction, response: &str) -> SmuResult<f64> {
        parse_number(response)
    }
}

/// Driver for the Keithley 2614B.
pub type Keithley2614BDriver = SourceMeterDriver<Tsp2614B>;

impl Keithley2614BDriver {
    /// Attach a 2614B driver for `channel` to an open session.
    pub fn new(session: Arc<dyn Session>, channel: Channel) -> Self {
        SourceMeterDriver::with_commands(session, Tsp2614B::new(channel))
    }
}

// =============================================================================
// Keithley2614BFactory - DriverFactory implementation
// =============================================================================

/// Options for the 2614B driver (`[instrument.options]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Keithley2614BConfig {
    /// SMU channel, `"a"` (default) or `"b"`
    #[serde(default)]
    pub channel: Channel,
    /// When set, `*IDN?` must contain this text or attaching fails.
    #[serde(default)]
    pub expect_model: Option<String>,
}

/// Factory for creating Keithley 2614B driver instances.
pub struct Keithley2614BFactory;

impl DriverFactory for Keithley2614BFactory {
    fn driver_type(&self) -> &'static str {
        "keithley2614b"
    }

    fn name(&self) -> &'static str {
        "Keithley 2614B System SourceMeter (TSP)"
    }

    fn validate(&self, config: &toml::Value) -> SmuResult<()> {
        let _: Keithley2614BConfig = parse_options(self.driver_type(), config)?;
        Ok(())
    }

    fn build(
        &self,
        config: toml::Value,
        session: Arc<dyn Session>,
    ) -> BoxFuture<'static, SmuResult<Arc<dyn SourceMeter>>> {
        let driver_type = self.driver_type();
        Box::pin(async move {
            let cfg: Keithley2614BConfig = parse_options(driver_type, &config)?;
            let driver = Keithley2614BDriver::new(session, cfg.channel);
            if let Some(model) = cfg.expect_model.as_deref() {
                driver.verify_identity(model).await?;
            }
            Ok(Arc::new(driver) as Arc<dyn SourceMeter>)
        })
    }
}
