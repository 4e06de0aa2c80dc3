//! `smu-core`
//!
//! Core types shared by the source-measure unit drivers and the `smu-sweep`
//! application.
//!
//! ## Layers
//!
//! - **Session**: a text command link to one instrument (`write`, `query`),
//!   plus address discovery. See [`session`].
//! - **SourceMeter**: the capability a driver exposes on top of a session
//!   (`setup`, `sweep`, `identify`). See [`capabilities`].
//! - **DriverFactory**: config-driven construction of a [`capabilities::SourceMeter`]
//!   from a TOML section and an open session. See [`driver`].
//!
//! Every fallible operation returns [`SmuResult`], whose error type
//! [`SmuError`] separates communication, timeout, parse and configuration
//! failures.

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod plan;
pub mod response;
#[cfg(feature = "serial")]
pub mod serial;
pub mod session;

pub use capabilities::{MeasureFunction, SetupConfig, SourceFunction, SourceMeter};
pub use driver::DriverFactory;
pub use error::{SmuError, SmuResult};
pub use plan::SweepPlan;
pub use session::{
    open_first, open_session, Address, Discovery, Session, SessionSettings, StaticDiscovery,
};
