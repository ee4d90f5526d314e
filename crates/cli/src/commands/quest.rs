// `habits quest`: progress of the party's current quest.

use std::io::Write;

use anyhow::Context;
use clap::Args;
use habits_core::json::to_pretty_string;
use habits_core::model::{PendingProgress, QuestContent, QuestProgress};
use tracing::warn;

use super::Session;
use crate::output::format_number;

#[derive(Debug, Args)]
pub struct QuestArgs {}

pub async fn run<W: Write + ?Sized>(
    session: &Session,
    _args: QuestArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let party = session.client.party().await?;
    let active = party.active_quest().and_then(|quest| Some((quest.key.as_deref()?, quest)));
    let Some((key, quest)) = active else {
        writeln!(out, "Not currently on a quest")?;
        return Ok(());
    };

    let user = session.client.user().await?;
    let content = session.client.quest_content(key).await?;
    let content = content.with_context(|| format!("quest `{key}` is not in the game content"))?;
    if let Err(error) = session.coordinator().observe(&user.state()) {
        warn!(%error, "could not refresh the cron checkpoint");
    }

    let rendered = format_human(&content, &quest.progress, &user.party.quest.progress);
    out.write_all(rendered.as_bytes())?;
    Ok(())
}

pub fn format_human(
    content: &QuestContent,
    progress: &QuestProgress,
    pending: &PendingProgress,
) -> String {
    let mut lines = vec![content.text.clone()];

    if let Some(boss) = &content.boss {
        lines.push(format!(
            "HP: {} / {} (Pending: {})",
            format_number(progress.hp.unwrap_or_default()),
            format_number(boss.hp),
            format_number(pending.up)
        ));
        if let Some(rage) = &boss.rage {
            lines.push(format!(
                "Rage: {} / {}",
                format_number(progress.rage.unwrap_or_default()),
                format_number(rage.value)
            ));
        }
    } else if let Some(collect) = &content.collect {
        for (item, target) in collect {
            let have = progress.collect.get(item).copied().unwrap_or(0);
            lines.push(format!("{}: {have} / {}", target.text, target.count));
        }
        lines.push(format!("Pending: {}", pending.collected_items));
    } else {
        lines.push(to_pretty_string(progress));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
