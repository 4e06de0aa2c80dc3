//! Simulated source-measure unit.
//!
//! [`SimulatedSmu`] is an in-process [`Session`] that understands both the
//! SCPI 2400 and TSP 2614B command sets well enough to run a full setup and
//! sweep. The device under test is an ideal resistor, so a voltage source
//! reads back `I = V / R` and a current source reads back `V = I * R`.
//!
//! Every command is recorded for inspection, and [`FaultScenario`]s inject
//! the failures a real link produces.
//!
//! # Example
//!
//! ```rust,ignore
//! let sim = Arc::new(SimulatedSmu::new(1000.0));
//! let smu = Keithley2400Driver::new(sim.clone());
//! smu.setup(&SetupConfig::default()).await?;
//! assert_eq!(smu.sweep(&[1.0]).await?, vec![0.001]);
//! assert!(!sim.output_enabled());
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use smu_core::{Session, SmuError, SmuResult, SourceFunction};
use std::time::Duration;
use tracing::{debug, warn};

/// Default identification string.
pub const SIMULATED_IDN: &str = "KEITHLEY INSTRUMENTS INC.,MODEL SIM-SMU,0,1.0.0";

/// Injected failure.
///
/// Query indices count measurement queries only (`*IDN?` is not counted),
/// starting at zero.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultScenario {
    /// Measurement query `n` fails with [`SmuError::Communication`].
    QueryFailsAt(usize),
    /// Measurement query `query` answers with `response` instead of data.
    GarbageAt {
        /// Measurement query index
        query: usize,
        /// Text returned
        response: String,
    },
    /// Any write containing `matching` fails with [`SmuError::Communication`].
    WriteFails {
        /// Substring to match against the command
        matching: String,
    },
    /// Measurement query `n` fails with [`SmuError::Timeout`].
    QueryTimesOut(usize),
    /// Measurement query `n` never completes.
    QueryHangsAt(usize),
}

#[derive(Debug, Default)]
struct SimState {
    output_on: bool,
    source: SourceFunction,
    level: f64,
    commands: Vec<String>,
    writes: Vec<String>,
    measure_queries: usize,
}

enum QueryAction {
    Respond(String),
    Fail(SmuError),
    Hang,
}

/// Simulated instrument wired to a resistor.
pub struct SimulatedSmu {
    address: String,
    resistance_ohms: f64,
    identity: String,
    faults: Vec<FaultScenario>,
    state: Mutex<SimState>,
}

impl SimulatedSmu {
    /// Simulator with a load of `resistance_ohms`.
    pub fn new(resistance_ohms: f64) -> Self {
        Self {
            address: format!("SIM::{}OHM::INSTR", resistance_ohms),
            resistance_ohms,
            identity: SIMULATED_IDN.to_string(),
            faults: Vec::new(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Add a fault scenario.
    pub fn with_fault(mut self, fault: FaultScenario) -> Self {
        self.faults.push(fault);
        self
    }

    /// Replace the `*IDN?` response.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Load resistance.
    pub fn resistance_ohms(&self) -> f64 {
        self.resistance_ohms
    }

    /// Whether the source output is currently on.
    pub fn output_enabled(&self) -> bool {
        self.state.lock().output_on
    }

    /// Every command received, writes and queries, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Every write received (including failed ones), in order.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    fn apply_write(state: &mut SimState, command: &str) {
        // SCPI
        match command {
            ":OUTP ON" => {
                state.output_on = true;
                return;
            }
            ":OUTP OFF" => {
                state.output_on = false;
                return;
            }
            ":SOUR:FUNC VOLT" => {
                state.source = SourceFunction::Voltage;
                return;
            }
            ":SOUR:FUNC CURR" => {
                state.source = SourceFunction::Current;
                return;
            }
            _ => {}
        }
        if let Some(level) = command
            .strip_prefix(":SOUR:VOLT ")
            .or_else(|| command.strip_prefix(":SOUR:CURR "))
        {
            Self::set_level(state, command, level);
            return;
        }

        // TSP
        if let Some((target, value)) = command.split_once('=') {
            let target = target.trim();
            let value = value.trim();
            if target.ends_with(".source.output") {
                state.output_on = value.ends_with("OUTPUT_ON");
            } else if target.ends_with(".source.func") {
                state.source = if value.ends_with("OUTPUT_DCAMPS") {
                    SourceFunction::Current
                } else {
                    SourceFunction::Voltage
                };
            } else if target.ends_with(".source.levelv") || target.ends_with(".source.leveli") {
                Self::set_level(state, command, value);
            }
        }
    }

    fn set_level(state: &mut SimState, command: &str, text: &str) {
        match text.trim().parse::<f64>() {
            Ok(level) => state.level = level,
            Err(_) => warn!(command, "simulator ignoring unparsable level"),
        }
    }

    fn operating_point(&self, state: &SimState) -> (f64, f64) {
        if !state.output_on {
            return (0.0, 0.0);
        }
        match state.source {
            SourceFunction::Voltage => (state.level, state.level / self.resistance_ohms),
            SourceFunction::Current => (state.level * self.resistance_ohms, state.level),
        }
    }

    fn plan_query(&self, command: &str) -> QueryAction {
        let mut state = self.state.lock();
        state.commands.push(command.to_string());

        if command == "*IDN?" {
            return QueryAction::Respond(self.identity.clone());
        }

        let index = state.measure_queries;
        state.measure_queries += 1;

        for fault in &self.faults {
            match fault {
                FaultScenario::QueryFailsAt(n) if *n == index => {
                    return QueryAction::Fail(SmuError::Communication(format!(
                        "simulated link failure on query {}",
                        index
                    )));
                }
                FaultScenario::GarbageAt { query, response } if *query == index => {
                    return QueryAction::Respond(response.clone());
                }
                FaultScenario::QueryTimesOut(n) if *n == index => {
                    return QueryAction::Fail(SmuError::Timeout {
                        command: command.to_string(),
                        timeout: Duration::ZERO,
                    });
                }
                FaultScenario::QueryHangsAt(n) if *n == index => return QueryAction::Hang,
                _ => {}
            }
        }

        let (volts, amps) = self.operating_point(&state);
        if command == ":READ?" {
            QueryAction::Respond(format!(
                "{:e},{:e},{:e},{:e},{:e}",
                volts, amps, 9.91e37, 0.0, 0.0
            ))
        } else if command.starts_with("print(") && command.contains(".measure.i()") {
            QueryAction::Respond(format!("{:e}", amps))
        } else if command.starts_with("print(") && command.contains(".measure.v()") {
            QueryAction::Respond(format!("{:e}", volts))
        } else {
            // A real instrument stays silent on an unknown query.
            QueryAction::Fail(SmuError::Timeout {
                command: command.to_string(),
                timeout: Duration::ZERO,
            })
        }
    }
}

#[async_trait]
impl Session for SimulatedSmu {
    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, command: &str) -> SmuResult<()> {
        let mut state = self.state.lock();
        state.commands.push(command.to_string());
        state.writes.push(command.to_string());

        let failing = self.faults.iter().any(|fault| {
            matches!(fault, FaultScenario::WriteFails { matching } if command.contains(matching.as_str()))
        });
        if failing {
            return Err(SmuError::Communication(format!(
                "simulated write failure on '{}'",
                command
            )));
        }

        Self::apply_write(&mut state, command);
        debug!(command, output_on = state.output_on, "simulator write");
        Ok(())
    }

    async fn query(&self, command: &str) -> SmuResult<String> {
        match self.plan_query(command) {
            QueryAction::Respond(response) => {
                debug!(command, response = %response, "simulator query");
                Ok(response)
            }
            QueryAction::Fail(err) => Err(err),
            QueryAction::Hang => {
                std::future::pending::<()>().await;
                Err(SmuError::Communication("simulated hang ended".to_string()))
            }
        }
    }
}
