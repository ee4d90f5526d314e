// `habits up` / `habits down`: score tasks by alias.

use std::io::Write;

use clap::Args;
use habits_core::interpret::summarize;
use habits_core::model::ScoreDirection;
use tracing::debug;

use super::{report_sync, Session};
use crate::output;

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Print each full response as JSON instead of a summary
    #[arg(short = 'J', long)]
    show_json: bool,

    /// Skip the daily reset check
    #[arg(long)]
    no_cron: bool,

    /// Task aliases from the config file
    #[arg(value_name = "TASK")]
    tasks: Vec<String>,
}

pub async fn run<W: Write + ?Sized>(
    session: &Session,
    direction: ScoreDirection,
    args: ScoreArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    // Every alias must resolve before anything is sent.
    let task_ids = session.config.resolve_aliases(&args.tasks)?;

    if !args.no_cron {
        let outcome = session.coordinator().ensure_synced().await?;
        report_sync(&outcome, out)?;
    }

    for task_id in &task_ids {
        debug!(%task_id, %direction, "scoring task");
        let response = session.client.score_task(task_id, direction).await?;
        if args.show_json {
            output::write_json(out, &response)?;
        } else {
            for line in summarize(&response) {
                writeln!(out, "{line}")?;
            }
        }
    }
    Ok(())
}
