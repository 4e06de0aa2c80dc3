//! Sweep orchestration.
//!
//! Ties the pieces together for the binary:
//!
//! 1. [`acquire_session`] opens the configured address, the first
//!    discovered one, or the simulator
//! 2. [`attach`] builds the configured driver on that session
//! 3. [`execute`] identifies the instrument, runs setup and the sweep, and
//!    returns a [`SweepReport`]

use crate::config::Settings;
use crate::error::AppResult;
use crate::export::{records, SweepRecord};
use chrono::{DateTime, Utc};
use smu_core::{open_first, open_session, Discovery, Session, SetupConfig, SourceMeter};
use smu_driver_keithley::SimulatedSmu;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one completed sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Session address
    pub address: String,
    /// Driver type used
    pub driver: String,
    /// `*IDN?` response, if the instrument answered
    pub identity: Option<String>,
    /// When setup started
    pub started_at: DateTime<Utc>,
    /// Setup applied before the sweep
    pub setup: SetupConfig,
    /// One record per set-point
    pub records: Vec<SweepRecord>,
}

impl SweepReport {
    /// Measured values in sweep order.
    pub fn readings(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.reading).collect()
    }
}

/// Discovery used when no address is configured.
pub fn default_discovery() -> Box<dyn Discovery> {
    #[cfg(feature = "instrument_serial")]
    {
        Box::new(smu_core::serial::SerialDiscovery)
    }

    #[cfg(not(feature = "instrument_serial"))]
    {
        Box::new(smu_core::StaticDiscovery::default())
    }
}

/// Open the session described by `settings`.
///
/// `simulate` (or `simulation.enabled`) selects the in-process simulator.
pub async fn acquire_session(settings: &Settings, simulate: bool) -> AppResult<Arc<dyn Session>> {
    if simulate || settings.simulation.enabled {
        info!(
            resistance_ohms = settings.simulation.resistance_ohms,
            "using simulated instrument"
        );
        return Ok(Arc::new(SimulatedSmu::new(
            settings.simulation.resistance_ohms,
        )));
    }

    let session_settings = &settings.instrument.session;
    let session = match &settings.instrument.address {
        Some(address) => open_session(address, session_settings).await?,
        None => {
            let discovery = default_discovery();
            open_first(discovery.as_ref(), session_settings).await?
        }
    };
    Ok(session)
}

/// Build the configured driver on `session`.
pub async fn attach(settings: &Settings, session: Arc<dyn Session>) -> AppResult<Arc<dyn SourceMeter>> {
    let factory = smu_driver_keithley::factory(&settings.instrument.driver)?;
    let options = toml::Value::Table(settings.instrument.options.clone());
    factory.validate(&options)?;

    info!(driver = factory.name(), address = session.address(), "attaching driver");
    Ok(factory.build(options, session).await?)
}

/// Identify, set up and sweep.
///
/// A failed identification is logged and ignored; setup and sweep failures
/// are returned.
pub async fn execute(
    settings: &Settings,
    smu: &dyn SourceMeter,
    address: &str,
) -> AppResult<SweepReport> {
    let plan = settings.sweep.plan()?;

    let identity = match smu.identify().await {
        Ok(idn) => {
            info!(idn = %idn, "instrument identified");
            Some(idn)
        }
        Err(e) => {
            warn!(error = %e, "identification failed, continuing");
            None
        }
    };

    let started_at = Utc::now();
    smu.setup(&settings.setup).await?;
    let readings = smu.sweep(plan.levels()).await?;

    Ok(SweepReport {
        address: address.to_string(),
        driver: settings.instrument.driver.clone(),
        identity,
        started_at,
        setup: settings.setup.clone(),
        records: records(plan.levels(), &readings),
    })
}

/// Acquire, attach and execute in one call.
pub async fn run(settings: &Settings, simulate: bool) -> AppResult<SweepReport> {
    let session = acquire_session(settings, simulate).await?;
    let address = session.address().to_string();
    let smu = attach(settings, session).await?;
    execute(settings, smu.as_ref(), &address).await
}
