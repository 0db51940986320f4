//! rkdoc entry point

use anyhow::{Context, Result};
use clap::Parser;
use rk_cli::commands;
use rk_document::{AppConfig, Application};

mod cli;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rk_document=info,rk_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    let mut app = Application::new(config);

    match cli.command {
        Command::Demo { output } => {
            let summary = commands::demo(&mut app, &output)?;
            print!("{}", summary.to_text());
            println!("Saved {}", output.display());
        }
        Command::Inspect { file } => {
            let objects = commands::inspect(&mut app, &file)?;
            print!("{}", commands::format_objects(&objects));
        }
        Command::Recompute { file, json, save } => {
            let summary = commands::recompute(&mut app, &file, save)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.to_text());
            }
            if summary.has_failures() {
                std::process::exit(1);
            }
        }
        Command::Graph { file } => {
            print!("{}", commands::graph(&mut app, &file)?);
        }
    }
    Ok(())
}
