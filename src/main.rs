//! Conformance runner entry point: CLI wiring and config-driven procedure construction.

mod cli;

use std::path::Path;
use std::process;

use tracing_subscriber::EnvFilter;

use der_conformance::config::ScenarioConfig;
use der_conformance::conformance::ConformanceRecorder;
use der_conformance::io::export::export_csv;
use der_conformance::reporting::RunSummary;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs every configured power level and iteration against the simulated bench.
fn run(scenario: &ScenarioConfig) -> der_conformance::error::Result<ConformanceRecorder> {
    let procedure = scenario.procedure()?;
    let mut bench = scenario.sim_bench()?;
    let mut recorder = ConformanceRecorder::new();
    for ctx in scenario.run_contexts() {
        procedure.run(&mut bench, &ctx, &mut recorder)?;
    }
    Ok(recorder)
}

fn main() {
    let cli = match cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage(ScenarioConfig::PRESETS);
            process::exit(1);
        }
    };
    if cli.help {
        cli::print_usage(ScenarioConfig::PRESETS);
        return;
    }
    init_tracing();

    // --scenario takes priority, then --preset, then the volt-var default
    let loaded = if let Some(ref path) = cli.scenario {
        ScenarioConfig::from_toml_file(path)
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::volt_var())
    };
    let mut scenario = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let recorder = match run(&scenario) {
        Ok(recorder) => recorder,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for epoch in recorder.epochs() {
        println!("{epoch}");
    }
    let summary = RunSummary::from_recorder(&recorder);
    println!("\n{summary}");

    if let Some(ref path) = cli.verdicts_out {
        if let Err(e) = export_csv(recorder.epochs(), Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Verdicts written to {}", path.display());
    }

    if !summary.all_passed() {
        process::exit(2);
    }
}
