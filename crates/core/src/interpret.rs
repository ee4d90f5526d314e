// Summaries of the side events returned by a task score change.
//
// A score response carries `data._tmp`, a map from event name to payload.
// Each entry is classified once into a `TaskEvent` and rendered to zero or
// more lines, in lexicographic key order.

use serde_json::Value;

use crate::json::{format_number, to_pretty_string};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Quest progress; either part may be absent.
    Quest { progress_delta: Option<Value>, collection: f64 },
    Drop { dialog: String },
    Crit,
    /// Never shown.
    StreakBonus,
    LeveledUp,
    Other { tag: String, payload: Value },
}

impl TaskEvent {
    pub fn classify(tag: &str, payload: &Value) -> Self {
        match tag {
            "quest" => Self::Quest {
                progress_delta: payload.get("progressDelta").cloned(),
                collection: payload.get("collection").and_then(Value::as_f64).unwrap_or(0.0),
            },
            "drop" => match payload.get("dialog").and_then(Value::as_str) {
                Some(dialog) => Self::Drop { dialog: dialog.to_string() },
                None => Self::other(tag, payload),
            },
            "crit" => Self::Crit,
            "streakBonus" => Self::StreakBonus,
            "leveledUp" => Self::LeveledUp,
            _ => Self::other(tag, payload),
        }
    }

    fn other(tag: &str, payload: &Value) -> Self {
        Self::Other { tag: tag.to_string(), payload: payload.clone() }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Quest { progress_delta, collection } => {
                let mut lines = Vec::new();
                if let Some(delta) = progress_delta {
                    lines.push(format!("QUEST: Damage to boss: {}", scalar_text(delta)));
                }
                if *collection > 0.0 {
                    let plural = if *collection > 1.0 { "s" } else { "" };
                    let count = format_number(*collection);
                    lines.push(format!("QUEST: Collected {count} quest item{plural}"));
                }
                lines
            }
            Self::Drop { dialog } => vec![format!("DROP: {dialog}")],
            Self::Crit => vec!["CRITICAL HIT!".to_string()],
            Self::StreakBonus => Vec::new(),
            Self::LeveledUp => vec!["LEVEL UP!".to_string()],
            Self::Other { tag, payload } => {
                let mut lines = vec![format!("{tag}:")];
                lines.extend(to_pretty_string(payload).lines().map(str::to_string));
                lines
            }
        }
    }
}

/// Events of a score response, ordered by event name.
pub fn events(response: &Value) -> impl Iterator<Item = TaskEvent> + '_ {
    let mut entries: Vec<(&String, &Value)> = response
        .pointer("/data/_tmp")
        .and_then(Value::as_object)
        .map(|events| events.iter().collect())
        .unwrap_or_default();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries.into_iter().map(|(tag, payload)| TaskEvent::classify(tag, payload))
}

/// Human-readable lines for a score response. Produced lazily, one event
/// at a time.
pub fn summarize(response: &Value) -> impl Iterator<Item = String> + '_ {
    events(response).flat_map(|event| event.lines())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
