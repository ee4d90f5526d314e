// Typed views of the service's JSON payloads.
//
// Only the fields this client reads are modelled. Everything else in a
// response is ignored on deserialization.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The cron-relevant slice of `GET /user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub needs_cron: bool,
    pub last_cron: DateTime<Utc>,
}

/// `GET /user` as used by the status and quest commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub needs_cron: bool,
    pub last_cron: DateTime<Utc>,
    #[serde(default)]
    pub tasks_order: TasksOrder,
    #[serde(default)]
    pub party: UserParty,
}

impl User {
    pub fn state(&self) -> UserState {
        UserState { needs_cron: self.needs_cron, last_cron: self.last_cron }
    }
}

/// Display order of task ids per task list, as arranged by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksOrder {
    pub habits: Vec<String>,
    pub dailys: Vec<String>,
    pub todos: Vec<String>,
    pub rewards: Vec<String>,
}

impl TasksOrder {
    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.habits
            .iter()
            .chain(&self.dailys)
            .chain(&self.todos)
            .chain(&self.rewards)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParty {
    pub quest: UserQuest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserQuest {
    pub progress: PendingProgress,
}

/// Quest progress the user has accumulated but that has not been applied
/// to the party yet (applied at the next cron).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PendingProgress {
    pub up: f64,
    pub collected_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub kind: TaskKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskKind {
    Habit {
        #[serde(default)]
        up: bool,
        #[serde(default)]
        down: bool,
        #[serde(default, rename = "counterUp")]
        counter_up: i64,
        #[serde(default, rename = "counterDown")]
        counter_down: i64,
    },
    Daily {
        #[serde(default)]
        completed: bool,
        #[serde(default, rename = "isDue")]
        is_due: bool,
    },
    Reward {
        #[serde(default)]
        value: f64,
    },
    Todo {
        #[serde(default)]
        completed: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    Up,
    Down,
}

impl ScoreDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for ScoreDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GET /groups/party`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub quest: Option<PartyQuest>,
}

impl Party {
    /// The quest the party is actively running, if any.
    pub fn active_quest(&self) -> Option<&PartyQuest> {
        let quest = self.quest.as_ref()?;
        quest.key.as_ref()?;
        if quest.active == Some(false) {
            return None;
        }
        Some(quest)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartyQuest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub progress: QuestProgress,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rage: Option<f64>,
    pub collect: BTreeMap<String, u64>,
}

/// One quest definition from `GET /content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestContent {
    pub text: String,
    #[serde(default)]
    pub boss: Option<QuestBoss>,
    #[serde(default)]
    pub collect: Option<BTreeMap<String, CollectTarget>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestBoss {
    pub hp: f64,
    #[serde(default)]
    pub rage: Option<QuestRage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestRage {
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectTarget {
    pub text: String,
    pub count: u64,
}
