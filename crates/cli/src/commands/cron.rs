// `habits cron`: start the new day on the service if it is due.

use std::io::Write;

use clap::Args;

use super::{report_sync, Session};

#[derive(Debug, Args)]
pub struct CronArgs {
    /// Run cron even if today's reset already happened
    #[arg(short, long)]
    force: bool,
}

pub async fn run<W: Write + ?Sized>(
    session: &Session,
    args: CronArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let coordinator = session.coordinator();
    let outcome = if args.force {
        coordinator.force_cron().await?
    } else {
        coordinator.ensure_synced().await?
    };
    report_sync(&outcome, out)?;
    Ok(())
}
