//! Every built-in scenario, run through the procedure against the simulator.

use der_conformance::config::ScenarioConfig;
use der_conformance::conformance::ConformanceRecorder;
use der_conformance::io::export::write_csv;
use der_conformance::reporting::RunSummary;

fn run(cfg: &ScenarioConfig) -> ConformanceRecorder {
    let errors = cfg.validate();
    assert!(errors.is_empty(), "scenario should be valid: {errors:?}");
    let procedure = cfg.procedure().expect("procedure should build");
    let mut bench = cfg.sim_bench().expect("bench should build");
    let mut recorder = ConformanceRecorder::new();
    for ctx in cfg.run_contexts() {
        procedure
            .run(&mut bench, &ctx, &mut recorder)
            .expect("run should not fault");
    }
    recorder
}

#[test]
fn every_preset_passes_with_an_ideal_device() {
    for name in ScenarioConfig::PRESETS {
        let cfg = ScenarioConfig::from_preset(name).expect("preset should load");
        let recorder = run(&cfg);
        assert!(!recorder.is_empty(), "preset \"{name}\" recorded nothing");
        let failed: Vec<String> = recorder.failures().map(|e| e.to_string()).collect();
        assert!(failed.is_empty(), "preset \"{name}\" failed: {failed:#?}");
    }
}

#[test]
fn slow_device_fails_full_range_steps() {
    let mut cfg = ScenarioConfig::volt_var();
    // full-range swings, answered at a third of the required speed
    cfg.procedure.setpoints = vec![1.10, 0.90];
    cfg.simulation.response_time = Some(3.0 * cfg.procedure.olrt);
    let recorder = run(&cfg);
    assert!(!recorder.passed());
}

#[test]
fn miscalibrated_device_fails_steady_state() {
    let cfg = ScenarioConfig::from_toml_str(
        r#"
[simulation]
gain = 1.8
noise_std = 0.0
"#,
    )
    .expect("TOML should parse");
    let recorder = run(&cfg);
    let summary = RunSummary::from_recorder(&recorder);
    assert!(!summary.all_passed());
    assert!(summary.worst_ss_margin.is_some_and(|m| m < 0.0));
}

#[test]
fn power_levels_and_iterations_multiply_the_runs() {
    let mut cfg = ScenarioConfig::volt_var();
    cfg.procedure.power_levels = vec![1.0, 0.5];
    cfg.procedure.iterations = 2;
    let single = run(&ScenarioConfig::volt_var()).len();
    let recorder = run(&cfg);
    assert_eq!(recorder.len(), 4 * single);
    assert!(recorder.epochs()[0].label.contains("P100% #1"));
    assert!(recorder.epochs().last().is_some_and(|e| e.label.contains("P50% #2")));
}

#[test]
fn verdict_table_has_one_row_per_epoch() {
    let recorder = run(&ScenarioConfig::power_limit());
    let mut buf = Vec::new();
    write_csv(recorder.epochs(), &mut buf).expect("CSV should write");
    let text = String::from_utf8(buf).expect("CSV should be UTF-8");
    assert_eq!(text.lines().count(), recorder.len() + 1);
}

#[test]
fn shipped_scenarios_load_and_validate() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    for name in ["volt_var_miscalibrated.toml", "volt_watt_low_power.toml"] {
        let cfg = ScenarioConfig::from_toml_file(&dir.join(name))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        let errors = cfg.validate();
        assert!(errors.is_empty(), "{name}: {errors:?}");
    }

    let low_power = ScenarioConfig::from_toml_file(&dir.join("volt_watt_low_power.toml"))
        .expect("scenario should load");
    assert_eq!(low_power.run_contexts().len(), 4);
    assert_eq!(low_power.procedure.settle_early_exit, Some(10));
}
