use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use st_cli::commands::report::{ReportKind, ReportOptions};
use st_cli::commands::{clear, export, report, start, status, stop, track, util};
use st_cli::{Action, Cli, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let action = cli.action.selected();

    // The background tracker logs at info unless RUST_LOG says otherwise
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if action == Some(Action::Track) {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(action) = action else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(cli.config.as_deref())?;
    let today = Local::now().date_naive();
    let range = util::resolve_range(cli.from.as_deref(), cli.to.as_deref(), today)?;
    let options = ReportOptions {
        range,
        top: cli.top.unwrap_or(config.top_apps),
        json: cli.json,
    };

    let mut stdout = io::stdout().lock();
    match action {
        Action::Start => start::run(&mut stdout, &config, cli.config.as_deref())?,
        Action::Stop => stop::run(&mut stdout, &config)?,
        Action::Status => status::run(&mut stdout, &config)?,
        Action::Track => track::run(&mut stdout, &config)?,
        Action::Today => report::run(&mut stdout, &config, ReportKind::Today, options)?,
        Action::Range => report::run(&mut stdout, &config, ReportKind::Range, options)?,
        Action::Week => report::run(&mut stdout, &config, ReportKind::Week, options)?,
        Action::Apps => report::run(&mut stdout, &config, ReportKind::Apps, options)?,
        Action::Productivity => {
            report::run(&mut stdout, &config, ReportKind::Productivity, options)?;
        }
        Action::Export(dest) => {
            let dest = dest.unwrap_or_else(|| {
                export::default_destination(&config, Local::now().naive_local())
            });
            export::run(&mut stdout, &config, &dest)?;
        }
        Action::Clear => clear::run(&mut stdout, &config)?,
    }

    Ok(())
}
