// CLI subcommand dispatch and the shared per-invocation session.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use habits_core::boundary::CronSchedule;
use habits_core::checkpoint::CronCheckpoint;
use habits_core::client::HabiticaClient;
use habits_core::clock::{Clock, SystemClock};
use habits_core::coordinator::{CronCoordinator, SyncOutcome};
use habits_core::model::ScoreDirection;

use crate::config::{self, Config, ConfigError, StatePaths};
use crate::output::{self, Palette};

pub mod cron;
pub mod quest;
pub mod score;
pub mod status;

#[derive(Subcommand)]
pub enum Command {
    /// Check off or +1 a task
    Up(score::ScoreArgs),
    /// Uncheck or -1 a task
    Down(score::ScoreArgs),
    /// View current task progress
    Status(status::StatusArgs),
    /// Start a new day on the service
    Cron(cron::CronArgs),
    /// Show current quest progress
    Quest(quest::QuestArgs),
}

/// Everything a command needs, built once per invocation.
pub struct Session {
    pub config: Config,
    pub client: HabiticaClient,
    pub checkpoint: CronCheckpoint,
    pub schedule: CronSchedule,
    pub clock: Box<dyn Clock>,
    pub palette: Palette,
}

impl Session {
    pub fn open(config: Config, clock: Box<dyn Clock>, palette: Palette) -> anyhow::Result<Self> {
        let schedule = config.cron.schedule()?;
        let paths = StatePaths::under(&config.state_dir()?);
        let client = HabiticaClient::new(config.client_config()?.with_cache_dir(paths.http_cache))
            .context("failed to set up the HTTP client")?;

        Ok(Self {
            config,
            client,
            checkpoint: CronCheckpoint::new(paths.cron_checkpoint),
            schedule,
            clock,
            palette,
        })
    }

    pub fn coordinator(&self) -> CronCoordinator<'_> {
        CronCoordinator::new(&self.client, &self.checkpoint, self.schedule, &*self.clock)
    }
}

pub fn run(config_path: Option<PathBuf>, command: Command) -> anyhow::Result<()> {
    let config_path = match config_path {
        Some(path) => path,
        None => config::default_config_path().ok_or(ConfigError::NoConfigDir)?,
    };
    let config = load_config(&config_path)?;
    let session = Session::open(config, Box::new(SystemClock), Palette::detect())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let mut out = io::stdout().lock();
    runtime.block_on(execute(&session, command, &mut out))
}

fn load_config(path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!(path = %path.display(), "loading config");
    Config::load_from(path)
}

pub async fn execute<W: Write + ?Sized>(
    session: &Session,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Up(args) => score::run(session, ScoreDirection::Up, args, out).await,
        Command::Down(args) => score::run(session, ScoreDirection::Down, args, out).await,
        Command::Status(args) => status::run(session, args, out).await,
        Command::Cron(args) => cron::run(session, args, out).await,
        Command::Quest(args) => quest::run(session, args, out).await,
    }
}

/// Print the service's response when a cron was issued; quiet otherwise.
pub fn report_sync<W: Write + ?Sized>(outcome: &SyncOutcome, out: &mut W) -> io::Result<()> {
    match outcome {
        SyncOutcome::CronRan { summary } => output::write_json(out, summary),
        SyncOutcome::AlreadySynced { .. } | SyncOutcome::Recorded { .. } => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_an_issued_cron_prints_output() {
        let mut buf = Vec::new();
        let synced = SyncOutcome::AlreadySynced { checkpoint: testing::at("2026-01-15T09:00:00Z") };
        report_sync(&synced, &mut buf).unwrap();
        let recorded = SyncOutcome::Recorded { last_cron: testing::at("2026-01-15T09:00:30Z") };
        report_sync(&recorded, &mut buf).unwrap();
        assert!(buf.is_empty());

        report_sync(&SyncOutcome::CronRan { summary: json!({"success": true}) }, &mut buf).unwrap();
        assert_eq!(testing::text(buf), "{\n    \"success\": true\n}\n");
    }
}
