//! End-to-end setup and sweep behaviour against the simulated instrument.

use smu_core::{MeasureFunction, SetupConfig, SmuError, SourceFunction, SourceMeter};
use smu_driver_keithley::{
    factory, Channel, FaultScenario, Keithley2400Driver, Keithley2614BDriver, SimulatedSmu,
};
use std::sync::Arc;
use std::time::Duration;

const OHMS_1K: f64 = 1000.0;

fn level_writes(writes: &[String], prefix: &str) -> usize {
    writes.iter().filter(|w| w.starts_with(prefix)).count()
}

// =============================================================================
// Setup
// =============================================================================

#[tokio::test]
async fn setup_issues_six_writes_with_output_off_first() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2400Driver::new(sim.clone());

    smu.setup(&SetupConfig::default()).await.unwrap();

    assert_eq!(
        sim.writes(),
        vec![
            ":OUTP OFF",
            ":SOUR:FUNC VOLT",
            ":SENS:FUNC \"CURR\"",
            ":SENS:VOLT:RANG 2",
            ":SENS:CURR:RANG 0.1",
            ":SOUR:DEL 0",
        ]
    );
    assert_eq!(sim.commands().len(), 6, "setup must not query");
}

#[tokio::test]
async fn setup_passes_values_through_exactly() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2614BDriver::new(sim.clone(), Channel::A);

    let config = SetupConfig {
        source: SourceFunction::Voltage,
        measure: MeasureFunction::Current,
        voltage_range: 20.0,
        current_range: 0.001,
        delay_s: 0.05,
    };
    smu.setup(&config).await.unwrap();

    assert_eq!(
        sim.writes(),
        vec![
            "smua.source.output = smua.OUTPUT_OFF",
            "smua.source.func = smua.OUTPUT_DCVOLTS",
            "display.smua.measure.func = display.MEASURE_DCAMPS",
            "smua.measure.rangev = 20",
            "smua.measure.rangei = 0.001",
            "smua.measure.delay = 0.05",
        ]
    );
}

#[tokio::test]
async fn setup_stops_at_first_failed_write() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_fault(FaultScenario::WriteFails {
        matching: ":SENS:VOLT:RANG".into(),
    }));
    let smu = Keithley2400Driver::new(sim.clone());

    let err = smu.setup(&SetupConfig::default()).await.unwrap_err();

    assert!(matches!(err, SmuError::Communication(_)));
    let writes = sim.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[3], ":SENS:VOLT:RANG 2");
}

// =============================================================================
// Sweep results
// =============================================================================

#[tokio::test]
async fn sweep_1k_resistor_scpi() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2400Driver::new(sim.clone());
    smu.setup(&SetupConfig::default()).await.unwrap();

    let currents = smu.sweep(&[-1.0, -0.5, 0.0, 0.5, 1.0]).await.unwrap();

    assert_eq!(currents, vec![-0.001, -0.0005, 0.0, 0.0005, 0.001]);
    assert!(!sim.output_enabled());
}

#[tokio::test]
async fn sweep_1k_resistor_tsp() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2614BDriver::new(sim.clone(), Channel::A);
    smu.setup(&SetupConfig::default()).await.unwrap();

    let currents = smu.sweep(&[-1.0, -0.5, 0.0, 0.5, 1.0]).await.unwrap();

    assert_eq!(currents, vec![-0.001, -0.0005, 0.0, 0.0005, 0.001]);
    assert!(!sim.output_enabled());
}

#[tokio::test]
async fn sweep_preserves_length_and_order() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2400Driver::new(sim.clone());
    smu.setup(&SetupConfig::default()).await.unwrap();

    let levels = [0.3, -0.2, 1.5, 0.0, -0.7, 0.3];
    let currents = smu.sweep(&levels).await.unwrap();

    assert_eq!(currents.len(), levels.len());
    let expected: Vec<f64> = levels.iter().map(|v| v / OHMS_1K).collect();
    assert_eq!(currents, expected);

    let reversed: Vec<f64> = levels.iter().rev().copied().collect();
    let reversed_currents = smu.sweep(&reversed).await.unwrap();
    let mut back: Vec<f64> = reversed_currents;
    back.reverse();
    assert_eq!(back, currents);
}

#[tokio::test]
async fn sweep_command_sequence() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2400Driver::new(sim.clone());
    smu.setup(&SetupConfig::default()).await.unwrap();
    let before = sim.commands().len();

    smu.sweep(&[0.5, 1.0]).await.unwrap();

    assert_eq!(
        sim.commands()[before..].to_vec(),
        vec![
            ":OUTP ON",
            ":SOUR:VOLT 0.5",
            ":READ?",
            ":SOUR:VOLT 1",
            ":READ?",
            ":OUTP OFF",
        ]
    );
}

#[tokio::test]
async fn empty_sweep_only_toggles_output() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2614BDriver::new(sim.clone(), Channel::A);

    let readings = smu.sweep(&[]).await.unwrap();

    assert!(readings.is_empty());
    assert_eq!(
        sim.commands(),
        vec![
            "smua.source.output = smua.OUTPUT_ON",
            "smua.source.output = smua.OUTPUT_OFF",
        ]
    );
}

#[tokio::test]
async fn current_source_measures_voltage() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let smu = Keithley2400Driver::new(sim.clone());
    smu.setup(&SetupConfig {
        source: SourceFunction::Current,
        measure: MeasureFunction::Voltage,
        ..Default::default()
    })
    .await
    .unwrap();

    let volts = smu.sweep(&[0.001, 0.002]).await.unwrap();

    assert_eq!(volts.len(), 2);
    assert!((volts[0] - 1.0).abs() < 1e-12);
    assert!((volts[1] - 2.0).abs() < 1e-12);
    assert!(sim.writes().contains(&":SOUR:CURR 0.001".to_string()));
}

// =============================================================================
// Failures and teardown
// =============================================================================

#[tokio::test]
async fn parse_failure_aborts_and_disables_output() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_fault(FaultScenario::GarbageAt {
        query: 2,
        response: "OVERFLOW".into(),
    }));
    let smu = Keithley2400Driver::new(sim.clone());
    smu.setup(&SetupConfig::default()).await.unwrap();

    let err = smu.sweep(&[0.0, 0.1, 0.2, 0.3]).await.unwrap_err();

    match err {
        SmuError::Parse { response, .. } => assert_eq!(response, "OVERFLOW"),
        other => panic!("unexpected error: {other:?}"),
    }
    let writes = sim.writes();
    assert_eq!(level_writes(&writes, ":SOUR:VOLT "), 3, "sweep must stop at the bad point");
    assert_eq!(writes.last().map(String::as_str), Some(":OUTP OFF"));
    assert!(!sim.output_enabled());
}

#[tokio::test]
async fn communication_failure_disables_output() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_fault(FaultScenario::QueryFailsAt(1)));
    let smu = Keithley2614BDriver::new(sim.clone(), Channel::A);
    smu.setup(&SetupConfig::default()).await.unwrap();

    let err = smu.sweep(&[0.1, 0.2, 0.3]).await.unwrap_err();

    assert!(matches!(err, SmuError::Communication(_)));
    assert!(!sim.output_enabled());
    assert_eq!(
        sim.writes().last().map(String::as_str),
        Some("smua.source.output = smua.OUTPUT_OFF")
    );
}

#[tokio::test]
async fn timeout_disables_output() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_fault(FaultScenario::QueryTimesOut(0)));
    let smu = Keithley2400Driver::new(sim.clone());

    let err = smu.sweep(&[1.0]).await.unwrap_err();

    assert!(matches!(err, SmuError::Timeout { .. }));
    assert!(!sim.output_enabled());
}

#[tokio::test]
async fn failed_enable_still_attempts_disable() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_fault(FaultScenario::WriteFails {
        matching: ":OUTP ON".into(),
    }));
    let smu = Keithley2400Driver::new(sim.clone());

    let err = smu.sweep(&[1.0]).await.unwrap_err();

    assert!(matches!(err, SmuError::Communication(_)));
    assert_eq!(sim.writes(), vec![":OUTP ON", ":OUTP OFF"]);
}

#[tokio::test]
async fn sweep_error_wins_over_teardown_error() {
    let sim = Arc::new(
        SimulatedSmu::new(OHMS_1K)
            .with_fault(FaultScenario::GarbageAt {
                query: 0,
                response: "ERR".into(),
            })
            .with_fault(FaultScenario::WriteFails {
                matching: ":OUTP OFF".into(),
            }),
    );
    let smu = Keithley2400Driver::new(sim.clone());

    let err = smu.sweep(&[1.0]).await.unwrap_err();

    assert!(matches!(err, SmuError::Parse { .. }));
}

#[tokio::test]
async fn cancelled_sweep_disables_output() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_fault(FaultScenario::QueryHangsAt(1)));
    let smu = Keithley2614BDriver::new(sim.clone(), Channel::A);
    smu.setup(&SetupConfig::default()).await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(50), smu.sweep(&[0.1, 0.2, 0.3])).await;
    assert!(outcome.is_err(), "sweep should still be hanging");

    // Let the spawned teardown run.
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!sim.output_enabled());
    assert_eq!(
        sim.writes().last().map(String::as_str),
        Some("smua.source.output = smua.OUTPUT_OFF")
    );
}

// =============================================================================
// Factories and identity
// =============================================================================

#[tokio::test]
async fn factory_builds_channel_b_driver() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K));
    let factory = factory("keithley2614b").unwrap();
    let options = toml::Value::Table(toml::toml! {
        channel = "b"
    });
    factory.validate(&options).unwrap();

    let smu = factory.build(options, sim.clone()).await.unwrap();
    smu.setup(&SetupConfig::default()).await.unwrap();
    let currents = smu.sweep(&[1.0]).await.unwrap();

    assert_eq!(currents, vec![0.001]);
    assert!(sim.writes().iter().all(|w| w.contains("smub")));
}

#[tokio::test]
async fn factory_checks_expected_model() {
    let sim = Arc::new(SimulatedSmu::new(OHMS_1K).with_identity(
        "KEITHLEY INSTRUMENTS INC.,MODEL 2400,1234567,C32",
    ));
    let factory = factory("keithley2400").unwrap();

    let matching = toml::Value::Table(toml::toml! {
        expect_model = "MODEL 2400"
    });
    let smu = factory.build(matching, sim.clone()).await.unwrap();
    assert!(smu.identify().await.unwrap().contains("2400"));

    let wrong = toml::Value::Table(toml::toml! {
        expect_model = "MODEL 2614B"
    });
    let err = match factory.build(wrong, sim.clone()).await {
        Ok(_) => panic!("attached to the wrong model"),
        Err(e) => e,
    };
    assert!(matches!(err, SmuError::Configuration(_)));
}
