//! Driver factories.
//!
//! Each instrument model registers a [`DriverFactory`]. The application
//! selects one by the `driver` name in its config, validates the driver's
//! option table, then attaches the driver to an already-open session.
//!
//! ```rust,ignore
//! let factory = smu_driver_keithley::factory("keithley2400")?;
//! factory.validate(&options)?;
//! let smu = factory.build(options, session).await?;
//! smu.setup(&SetupConfig::default()).await?;
//! ```

use crate::capabilities::SourceMeter;
use crate::error::{SmuError, SmuResult};
use crate::session::Session;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Constructs a [`SourceMeter`] from a TOML option table and a session.
pub trait DriverFactory: Send + Sync + 'static {
    /// Name used in the config `driver` field, e.g. `"keithley2400"`.
    fn driver_type(&self) -> &'static str;

    /// Human-readable model name.
    fn name(&self) -> &'static str;

    /// Validate the option table without touching the instrument.
    fn validate(&self, config: &toml::Value) -> SmuResult<()>;

    /// Attach a driver to `session`.
    ///
    /// May query the instrument (e.g. to check its identity) before
    /// returning.
    fn build(
        &self,
        config: toml::Value,
        session: Arc<dyn Session>,
    ) -> BoxFuture<'static, SmuResult<Arc<dyn SourceMeter>>>;
}

/// Deserialize a factory's typed options, mapping failures to
/// [`SmuError::Configuration`].
pub fn parse_options<T>(driver_type: &str, config: &toml::Value) -> SmuResult<T>
where
    T: serde::de::DeserializeOwned,
{
    config.clone().try_into().map_err(|e: toml::de::Error| {
        SmuError::Configuration(format!("invalid {} options: {}", driver_type, e.message()))
    })
}
