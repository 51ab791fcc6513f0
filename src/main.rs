mod cli;

use scdloop::{config, output};
use scdloop_edit::{LoopError, LoopPointManager};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "scdloop=trace,scdloop_edit=trace,scdloop_format=debug".to_string()
        } else {
            "scdloop=info,scdloop_edit=info,scdloop_format=warn".to_string()
        }
    });

    // Reports go to stdout, logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let touches_file = !matches!(cli.command, Commands::Validate { .. });
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", failure_message(&err, touches_file));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Read { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            read_file(&file, json || config.output.json)
        }
        Commands::Write {
            file,
            start,
            end,
            no_header_sync,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let mut options = config.edit.options();
            if no_header_sync {
                options.sync_vorbis_header = false;
            }
            let manager = LoopPointManager::new(options);

            let outcome = manager.write(&file, start, end)?;
            let sample_rate = manager.inspect(&file)?.sample_rate;
            emit(json || config.output.json, &outcome, || {
                output::render_outcome(&file, &outcome, sample_rate)
            })
        }
        Commands::Clear { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let manager = LoopPointManager::new(config.edit.options());

            let outcome = manager.clear(&file)?;
            emit(json || config.output.json, &outcome, || {
                output::render_outcome(&file, &outcome, 0)
            })
        }
        Commands::Info { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let meta = LoopPointManager::default().inspect(&file)?;
            emit(json || config.output.json, &meta, || {
                output::render_metadata(&file, &meta)
            })
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

fn read_file(file: &Path, json: bool) -> Result<()> {
    let report = LoopPointManager::default().read(file)?;
    tracing::debug!("Loop report: {:?}", report);
    emit(json, &report, || output::render_report(file, &report))
}

/// Print `value` as JSON or as the text `render` produces.
fn emit<T: Serialize>(json: bool, value: &T, render: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render());
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match config::find_config(path) {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(&p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file found, using defaults");
            print_config(&config::Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    println!("  Sync Vorbis header: {}", config.edit.sync_vorbis_header);
    println!("  Keep backup on failure: {}", config.edit.keep_backup_on_failure);
    println!("  JSON output: {}", config.output.json);
}

fn failure_message(err: &anyhow::Error, touches_file: bool) -> String {
    match err.downcast_ref::<LoopError>() {
        Some(loop_err) => loop_err.user_message(),
        None if touches_file => format!("{err:#}; the original file is unchanged"),
        None => format!("{err:#}"),
    }
}
