//! Full application runs against the simulated instrument.

use smu_sweep::config::Settings;
use smu_sweep::run;

fn simulated_settings() -> Settings {
    let mut settings = Settings::default();
    settings.simulation.resistance_ohms = 1000.0;
    settings
}

#[tokio::test]
async fn default_sweep_on_1k_load() {
    let settings = simulated_settings();
    let report = run::run(&settings, true).await.unwrap();

    assert_eq!(report.driver, "keithley2400");
    assert!(report.identity.is_some());
    assert_eq!(report.readings(), vec![-0.001, -0.0005, 0.0, 0.0005, 0.001]);
    let levels: Vec<f64> = report.records.iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
}

#[tokio::test]
async fn tsp_driver_dual_sweep() {
    let mut settings = simulated_settings();
    settings.instrument.driver = "keithley2614b".to_string();
    settings.sweep.start = 0.0;
    settings.sweep.stop = 1.0;
    settings.sweep.points = 3;
    settings.sweep.dual = true;

    let report = run::run(&settings, true).await.unwrap();

    assert_eq!(report.records.len(), 5);
    assert_eq!(report.readings(), vec![0.0, 0.0005, 0.001, 0.0005, 0.0]);
}

#[tokio::test]
async fn empty_sweep_yields_empty_report() {
    let mut settings = simulated_settings();
    settings.sweep.levels = Some(Vec::new());

    let report = run::run(&settings, true).await.unwrap();
    assert!(report.records.is_empty());
}

#[tokio::test]
async fn simulation_enabled_in_config() {
    let mut settings = simulated_settings();
    settings.simulation.enabled = true;
    settings.simulation.resistance_ohms = 500.0;

    let report = run::run(&settings, false).await.unwrap();
    assert!(report.address.starts_with("SIM::"));
    assert_eq!(report.readings()[4], 1.0 / 500.0);
}

#[tokio::test]
async fn unreachable_address_is_reported() {
    let mut settings = simulated_settings();
    settings.instrument.address = Some("GPIB0::24::INSTR".to_string());

    let err = match run::acquire_session(&settings, false).await {
        Ok(_) => panic!("opened an unsupported address"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("unsupported instrument address"));
}

#[cfg(feature = "storage_csv")]
#[tokio::test]
async fn csv_export_contains_every_point() {
    use smu_sweep::export::write_csv_file;

    let settings = simulated_settings();
    let report = run::run(&settings, true).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("iv.csv");
    write_csv_file(&path, &report).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# instrument: SIM::"));
    assert!(text.contains("# driver: keithley2400"));

    let data: String = text
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| format!("{}\n", line))
        .collect();
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(headers, vec!["index", "level", "reading"]);

    let rows: Vec<(usize, f64, f64)> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], (0, -1.0, -0.001));
    assert_eq!(rows[4], (4, 1.0, 0.001));
}
