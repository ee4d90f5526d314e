// `habits status`: last cron time plus habit, daily and reward progress.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use chrono_tz::Tz;
use clap::Args;
use habits_core::model::{Task, TaskKind, User};
use tracing::warn;

use super::Session;
use crate::output::{format_number, Palette};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show every task, not only the aliased ones
    #[arg(short = 'A', long)]
    all: bool,
}

pub async fn run<W: Write + ?Sized>(
    session: &Session,
    args: StatusArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let user = session.client.user().await?;
    let tasks = session.client.tasks().await?;

    // The `/user` fetch already says whether today's reset happened.
    if let Err(error) = session.coordinator().observe(&user.state()) {
        warn!(%error, "could not refresh the cron checkpoint");
    }

    let visible: HashSet<&str> = if args.all {
        user.tasks_order.all_ids().collect()
    } else {
        session.config.alias.values().map(String::as_str).collect()
    };
    let rendered = format_human(&user, &tasks, &visible, session.schedule.zone, session.palette);
    out.write_all(rendered.as_bytes())?;
    Ok(())
}

pub fn format_human(
    user: &User,
    tasks: &[Task],
    visible: &HashSet<&str>,
    zone: Tz,
    palette: Palette,
) -> String {
    let mark = if user.needs_cron { palette.bold_red("!") } else { palette.green("✓") };
    let last_cron = user.last_cron.with_timezone(&zone).format("%Y-%m-%d %H:%M:%S %Z");
    let mut lines = vec![format!("{mark} Last cron: {last_cron}")];

    let task_lines: HashMap<&str, String> = tasks
        .iter()
        .filter_map(|task| task_line(task, palette).map(|line| (task.id.as_str(), line)))
        .collect();

    let order = &user.tasks_order;
    for (header, ids) in
        [("HABITS", &order.habits), ("DAILIES", &order.dailys), ("REWARDS", &order.rewards)]
    {
        lines.push(header.to_string());
        lines.extend(
            ids.iter()
                .filter(|id| visible.contains(id.as_str()))
                .filter_map(|id| task_lines.get(id.as_str()).cloned()),
        );
        lines.push(String::new());
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// One status line, or `None` for tasks the status view leaves out.
fn task_line(task: &Task, palette: Palette) -> Option<String> {
    let marker = match &task.kind {
        TaskKind::Daily { completed, is_due: true } => {
            if *completed {
                palette.green("[✓]")
            } else {
                palette.red("[ ]")
            }
        }
        TaskKind::Daily { completed, is_due: false } => {
            let marker = if *completed { "[✓]" } else { "[-]" };
            marker.to_string()
        }
        TaskKind::Habit { up, down, counter_up, counter_down } => {
            let ups = match (*up, *counter_up) {
                (false, _) => " - ".to_string(),
                (true, n) if n > 0 => palette.green(&format!("{n:+3}")),
                (true, n) => format!("{n:+3}"),
            };
            let downs = match (*down, *counter_down) {
                (false, _) => " - ".to_string(),
                (true, n) if n > 0 => palette.red(&format!("-{n:<2}")),
                (true, n) => format!("-{n:<2}"),
            };
            format!("[{ups}/{downs}]")
        }
        TaskKind::Reward { value } => format!("${}", format_number(*value)),
        TaskKind::Todo { .. } | TaskKind::Other => return None,
    };
    Some(format!("{marker} {}", task.text))
}
