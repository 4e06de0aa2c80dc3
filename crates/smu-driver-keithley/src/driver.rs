//! Generic source-measure driver.
//!
//! [`SourceMeterDriver`] runs the setup and sweep procedures over any
//! [`CommandSet`]. The model-specific aliases ([`crate::Keithley2400Driver`],
//! [`crate::Keithley2614BDriver`]) only choose the dialect.

use crate::command_set::CommandSet;
use crate::guard::OutputGuard;
use async_trait::async_trait;
use smu_core::{
    MeasureFunction, Session, SetupConfig, SmuError, SmuResult, SourceFunction, SourceMeter,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Source-measure unit driver over one session.
pub struct SourceMeterDriver<C: CommandSet> {
    /// Exclusive link to the instrument
    session: Arc<dyn Session>,
    /// Dialect used to render commands
    commands: C,
    /// Functions selected by the last successful setup
    functions: parking_lot::Mutex<(SourceFunction, MeasureFunction)>,
    /// Held for the whole of a setup or sweep
    exclusive: tokio::sync::Mutex<()>,
}

impl<C: CommandSet> SourceMeterDriver<C> {
    /// Attach a driver speaking `commands` to `session`.
    ///
    /// Until `setup` succeeds the driver assumes voltage source, current
    /// measure.
    pub fn with_commands(session: Arc<dyn Session>, commands: C) -> Self {
        Self {
            session,
            commands,
            functions: parking_lot::Mutex::new((
                SourceFunction::default(),
                MeasureFunction::default(),
            )),
            exclusive: tokio::sync::Mutex::new(()),
        }
    }

    /// Dialect this driver speaks.
    pub fn commands(&self) -> &C {
        &self.commands
    }

    /// Underlying session.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Query `*IDN?` and require it to contain `expected`.
    pub async fn verify_identity(&self, expected: &str) -> SmuResult<String> {
        let idn = self.identify().await?;
        if !idn.contains(expected) {
            return Err(SmuError::Configuration(format!(
                "instrument at {} identifies as '{}', expected '{}'",
                self.session.address(),
                idn,
                expected
            )));
        }
        info!(address = self.session.address(), idn = %idn, "instrument identity verified");
        Ok(idn)
    }

    async fn measure_points(
        &self,
        source: SourceFunction,
        measure: MeasureFunction,
        levels: &[f64],
    ) -> SmuResult<Vec<f64>> {
        let query = self.commands.measure_query(measure);
        let mut readings = Vec::with_capacity(levels.len());

        for (index, &level) in levels.iter().enumerate() {
            self.session
                .write(&self.commands.source_level(source, level))
                .await?;
            let response = self.session.query(&query).await?;
            let reading = self.commands.parse_reading(measure, &response)?;
            debug!(index, level, reading, "measured point");
            readings.push(reading);
        }

        Ok(readings)
    }
}

#[async_trait]
impl<C: CommandSet> SourceMeter for SourceMeterDriver<C> {
    #[instrument(skip(self), err)]
    async fn identify(&self) -> SmuResult<String> {
        self.session.query(self.commands.identify_query()).await
    }

    #[instrument(skip(self, config), err)]
    async fn setup(&self, config: &SetupConfig) -> SmuResult<()> {
        let _exclusive = self.exclusive.lock().await;

        for command in self.commands.setup_commands(config) {
            self.session.write(&command).await?;
        }
        *self.functions.lock() = (config.source, config.measure);

        info!(
            dialect = self.commands.name(),
            source = %config.source,
            measure = %config.measure,
            voltage_range = config.voltage_range,
            current_range = config.current_range,
            delay_s = config.delay_s,
            "setup complete"
        );
        Ok(())
    }

    #[instrument(skip(self, levels), fields(points = levels.len()), err)]
    async fn sweep(&self, levels: &[f64]) -> SmuResult<Vec<f64>> {
        let _exclusive = self.exclusive.lock().await;
        let (source, measure) = *self.functions.lock();
        info!(source = %source, measure = %measure, "starting sweep");

        let guard = OutputGuard::arm(Arc::clone(&self.session), self.commands.output(false));
        let outcome = match self.session.write(&self.commands.output(true)).await {
            Ok(()) => self.measure_points(source, measure, levels).await,
            Err(e) => Err(e),
        };
        let teardown = guard.release().await;

        match (outcome, teardown) {
            (Ok(readings), Ok(())) => {
                info!(readings = readings.len(), "sweep complete");
                Ok(readings)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => {
                warn!(error = %e, kind = e.kind(), "sweep aborted, output disabled");
                Err(e)
            }
            (Err(e), Err(teardown_err)) => {
                error!(
                    error = %teardown_err,
                    "failed to disable output after aborted sweep"
                );
                Err(e)
            }
        }
    }

    /// Does not wait for a running sweep, so it can be used as a stop.
    #[instrument(skip(self), err)]
    async fn disable_output(&self) -> SmuResult<()> {
        self.session.write(&self.commands.output(false)).await
    }
}
