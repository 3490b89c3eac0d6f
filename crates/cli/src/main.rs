mod commands;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::migrate::{self, ConfigSource};
use logging::{init_logging, LoggingConfig};
use sqlmig::{MigrateError, Target};

#[derive(Parser)]
#[command(name = "sqlmig")]
#[command(about = "Apply and revert ordered SQL migrations")]
#[command(version)]
struct Cli {
    /// YAML configuration file (defaults to ./migrations.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL, used with --migrations and --app instead of a config file
    #[arg(long, global = true)]
    db_uri: Option<String>,

    /// Migrations directory of the single application
    #[arg(long, global = true)]
    migrations: Option<PathBuf>,

    /// Name of the single application
    #[arg(long, global = true)]
    app: Option<String>,

    /// Log level filter, e.g. "info" or "sqlmig=debug"
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every migration and whether it is applied
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply migrations up to <app>/<migration>, or everything with "all"
    Apply {
        /// "all" or <app>/<migration>
        name: String,

        /// Print each statement before it runs
        #[arg(short, long)]
        verbose: bool,
    },

    /// Revert <app>/<migration> and every later migration of that app
    Revert {
        /// <app>/<migration>
        name: String,

        /// Print each statement before it runs
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&LoggingConfig::new(cli.log_level.as_str(), cli.log_json)) {
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let invariant = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<MigrateError>())
                .any(MigrateError::is_invariant_violation);
            if invariant {
                eprintln!("{} {:#}", style("Ledger inconsistency:").red().bold(), err);
                ExitCode::from(2)
            } else {
                eprintln!("{} {:#}", style("Error:").red().bold(), err);
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let source = ConfigSource {
        config: cli.config,
        db_uri: cli.db_uri,
        migrations: cli.migrations,
        app: cli.app,
    };
    let config = source.resolve()?;

    match cli.command {
        Commands::Show { json } => migrate::show(&config, json).await,
        Commands::Apply { name, verbose } => {
            let target: Target = name.parse()?;
            migrate::apply(&config, &target, verbose).await
        }
        Commands::Revert { name, verbose } => {
            let target: Target = name.parse()?;
            migrate::revert(&config, &target, verbose).await
        }
    }
}
