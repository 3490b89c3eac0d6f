use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use sqlmig::{
    mask_database_url, Application, Direction, MigrateConfig, MigrateResult, MigrationExecutor,
    SweepReport, Target, DEFAULT_CONFIG_FILE,
};

use crate::output::{render_status, ConsoleReporter};

/// Where the run's configuration comes from
#[derive(Debug, Default)]
pub struct ConfigSource {
    pub config: Option<PathBuf>,
    pub db_uri: Option<String>,
    pub migrations: Option<PathBuf>,
    pub app: Option<String>,
}

impl ConfigSource {
    fn uses_flags(&self) -> bool {
        self.db_uri.is_some() || self.migrations.is_some() || self.app.is_some()
    }

    /// A config file and the single-application flags are mutually exclusive.
    /// Without either, `migrations.yml` in the working directory is used.
    pub fn resolve(&self) -> anyhow::Result<MigrateConfig> {
        if let Some(path) = &self.config {
            if self.uses_flags() {
                bail!("--config cannot be combined with --db-uri, --migrations or --app");
            }
            return load_file(path);
        }

        if self.uses_flags() {
            let (Some(db_uri), Some(migrations), Some(app)) = (&self.db_uri, &self.migrations, &self.app)
            else {
                bail!("--db-uri, --migrations and --app must be given together");
            };
            return Ok(MigrateConfig::single(db_uri.as_str(), app.as_str(), migrations.as_path())?);
        }

        let default = Path::new(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            return load_file(default);
        }
        bail!(
            "no configuration: pass --config, or --db-uri with --migrations and --app, \
             or create {} in the working directory",
            DEFAULT_CONFIG_FILE
        )
    }
}

fn load_file(path: &Path) -> anyhow::Result<MigrateConfig> {
    MigrateConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

async fn executor(
    config: &MigrateConfig,
    applications: Vec<Application>,
    verbose: bool,
) -> anyhow::Result<MigrationExecutor> {
    debug!(db = %mask_database_url(&config.db_uri), apps = applications.len(), "Opening migration executor");
    Ok(MigrationExecutor::open(config, applications)
        .await?
        .with_observer(ConsoleReporter::new(verbose)))
}

/// Close the executor without letting a close failure hide the command's own error.
async fn finish<T>(executor: MigrationExecutor, result: MigrateResult<T>) -> anyhow::Result<T> {
    match result {
        Ok(value) => {
            executor.close().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(close_err) = executor.close().await {
                warn!(error = %close_err, "Failed to close database connection");
            }
            Err(err.into())
        }
    }
}

pub async fn show(config: &MigrateConfig, json: bool) -> anyhow::Result<()> {
    let applications = config.load_applications()?;
    let mut executor = executor(config, applications, false).await?;
    let statuses = executor.show().await;
    let statuses = finish(executor, statuses).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        print!("{}", render_status(&statuses));
    }
    Ok(())
}

pub async fn apply(config: &MigrateConfig, target: &Target, verbose: bool) -> anyhow::Result<()> {
    sweep(config, target, Direction::Apply, verbose).await
}

pub async fn revert(config: &MigrateConfig, target: &Target, verbose: bool) -> anyhow::Result<()> {
    sweep(config, target, Direction::Revert, verbose).await
}

async fn sweep(config: &MigrateConfig, target: &Target, direction: Direction, verbose: bool) -> anyhow::Result<()> {
    // Unknown targets are reported before the database is touched
    let applications = config.load_applications()?;
    target.plan(&applications, direction)?;

    let mut executor = executor(config, applications, verbose).await?;
    let report = match direction {
        Direction::Apply => executor.apply(target).await,
        Direction::Revert => executor.revert(target).await,
    };
    summarize(&finish(executor, report).await?);
    Ok(())
}

fn summarize(report: &SweepReport) {
    if report.units.is_empty() {
        println!("Nothing to {}.", report.direction);
    }
}
