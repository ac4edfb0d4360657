use anyhow::Result;
use clap::Parser;
use sfc_core::config::MeasurementConfig;

pub mod cli;
pub mod commands;
pub mod process;

use cli::Command;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Valider les arguments
    cli.validate()?;

    // 4. Charger la config
    let config = resolve_config(&cli)?;

    // 5. Exécuter la commande
    match &cli.command {
        Command::Sweep {
            out,
            channels,
            reps,
            reference,
        } => commands::run_sweep(&config, out, *channels, *reps, *reference),
        Command::Calibrate {
            file,
            dir,
            channel,
            level,
            ..
        } => commands::run_calibrate(&config, file.as_deref(), dir, *channel, *level),
        Command::Measure {
            out_dir,
            outputs,
            inputs,
        } => commands::run_measure(&config, out_dir, outputs, inputs),
        Command::Bk {
            file,
            systems,
            reps,
            out,
            no_reference,
        } => commands::run_bk(&config, file, *systems, *reps, out, !no_reference),
        Command::Design {
            plant,
            sources,
            target,
            out,
            reg,
            taps,
            report,
        } => commands::run_design(
            &config,
            plant,
            *sources,
            target,
            out,
            *reg,
            *taps,
            report.as_deref(),
        ),
        Command::Filter {
            filters,
            input,
            out,
        } => commands::run_filter(filters, input, out),
        Command::Array { out } => commands::run_array(out.as_deref()),
    }
}

/// Resolve config: defaults when the file is missing.
fn resolve_config(cli: &cli::Cli) -> Result<MeasurementConfig> {
    if cli.config.exists() {
        sfc_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(MeasurementConfig::default())
    }
}
