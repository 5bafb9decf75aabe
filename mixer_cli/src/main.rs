#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod appliance;
mod cli;
mod error_fmt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::appliance::PanelSource;
use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(cli) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);

    let calibration = match &cli.calibration {
        Some(path) => mixer_config::load_calibration_csv(path)?,
        None => cfg.calibration()?,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let names = &cfg.ingredients.names;
    match cli.cmd {
        Commands::Run { script, sessions } => {
            let source = match script.as_deref() {
                Some(path) => PanelSource::Script(path),
                None => PanelSource::Stdin,
            };
            let summary =
                appliance::run_appliance(&cfg, &calibration, source, sessions, &shutdown)?;
            if cli.json {
                println!("{}", appliance::summary_json(&summary, names));
            } else {
                print!("{}", appliance::summary_text(&summary, names));
            }
        }
        Commands::Dispense {
            ingredient,
            percent,
        } => {
            let a = appliance::run_dispense(&cfg, &calibration, ingredient, percent, &shutdown)?;
            if cli.json {
                println!("{}", appliance::dispense_json(&a, names));
            } else {
                println!("{}", appliance::dispense_text(&a, names));
            }
        }
        Commands::Table => {
            if cli.json {
                println!("{}", appliance::table_json(&calibration));
            } else {
                print!("{}", appliance::table_text(&calibration));
            }
        }
        Commands::SelfCheck => {
            appliance::self_check(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok" }));
            } else {
                println!("ok");
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<mixer_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config file {}", path.display()))?;
    let cfg = mixer_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config file {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays clean for display frames and
/// JSON results. `RUST_LOG` wins over `--log-level`.
fn init_tracing(json: bool, level: &str, logging: &mixer_config::Logging) {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = logging.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        let dir = dir.unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "mixer.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = logging
            .level
            .as_deref()
            .and_then(|l| EnvFilter::try_new(l).ok())
            .unwrap_or_else(|| EnvFilter::new("info"));
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(file_filter)
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
}
