//! Keithley source-measure unit drivers for smu-sweep.
//!
//! This crate provides:
//! - Keithley 2400 series SourceMeter (SCPI), [`Keithley2400Driver`]
//! - Keithley 2614B System SourceMeter (TSP), [`Keithley2614BDriver`]
//! - [`SimulatedSmu`], an in-process session with a resistor load
//!
//! # Usage
//!
//! ```rust,ignore
//! use smu_driver_keithley::factory;
//!
//! let factory = factory("keithley2614b")?;
//! factory.validate(&options)?;
//! let smu = factory.build(options, session).await?;
//! ```

pub mod command_set;
pub mod driver;
pub mod guard;
pub mod k2400;
pub mod k2614b;
pub mod simulated;

pub use command_set::CommandSet;
pub use driver::SourceMeterDriver;
pub use guard::OutputGuard;
pub use k2400::{Keithley2400Driver, Keithley2400Factory, Scpi2400};
pub use k2614b::{Channel, Keithley2614BDriver, Keithley2614BFactory, Tsp2614B};
pub use simulated::{FaultScenario, SimulatedSmu};

use smu_core::{DriverFactory, SmuError, SmuResult};

/// All driver factories in this crate.
pub fn factories() -> Vec<Box<dyn DriverFactory>> {
    vec![Box::new(Keithley2400Factory), Box::new(Keithley2614BFactory)]
}

/// Look up a factory by its `driver_type` (case-insensitive).
pub fn factory(driver_type: &str) -> SmuResult<Box<dyn DriverFactory>> {
    let available = factories();
    let known: Vec<&'static str> = available.iter().map(|f| f.driver_type()).collect();
    available
        .into_iter()
        .find(|f| f.driver_type().eq_ignore_ascii_case(driver_type))
        .ok_or_else(|| {
            SmuError::Configuration(format!(
                "unknown driver '{}', expected one of: {}",
                driver_type,
                known.join(", ")
            ))
        })
}
