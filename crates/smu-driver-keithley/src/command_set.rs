//! Command dialects.
//!
//! The sweep procedure is identical across Keithley models; only the command
//! text and the shape of the measurement response differ. A [`CommandSet`]
//! renders that text so [`crate::driver::SourceMeterDriver`] can stay generic.

use smu_core::{MeasureFunction, SetupConfig, SmuResult, SourceFunction};

/// Command text for one instrument dialect.
pub trait CommandSet: Send + Sync + 'static {
    /// Dialect name for logs.
    fn name(&self) -> &'static str;

    /// Enable or disable the source output.
    fn output(&self, enabled: bool) -> String;

    /// Select the source function.
    fn source_function(&self, function: SourceFunction) -> String;

    /// Select the measurement (and display) function.
    fn measure_function(&self, function: MeasureFunction) -> String;

    /// Set the voltage measurement range in volts.
    fn voltage_range(&self, volts: f64) -> String;

    /// Set the current measurement range in amps.
    fn current_range(&self, amps: f64) -> String;

    /// Set the settling delay in seconds.
    fn delay(&self, seconds: f64) -> String;

    /// Set the source level for the given source function.
    fn source_level(&self, function: SourceFunction, level: f64) -> String;

    /// Query that triggers one measurement and returns it.
    fn measure_query(&self, function: MeasureFunction) -> String;

    /// Extract the reading from the response to [`CommandSet::measure_query`].
    fn parse_reading(&self, function: MeasureFunction, response: &str) -> SmuResult<f64>;

    /// Identification query.
    fn identify_query(&self) -> &'static str {
        "*IDN?"
    }

    /// The six setup writes, in the order they must be sent.
    fn setup_commands(&self, config: &SetupConfig) -> [String; 6] {
        [
            self.output(false),
            self.source_function(config.source),
            self.measure_function(config.measure),
            self.voltage_range(config.voltage_range),
            self.current_range(config.current_range),
            self.delay(config.delay_s),
        ]
    }
}
