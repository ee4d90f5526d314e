// Keeps the local cron checkpoint in step with the service's daily reset.
//
// The checkpoint is only moved after a successful remote response and
// only forward, so a failed invocation leaves it where it was.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boundary::CronSchedule;
use crate::checkpoint::{CheckpointError, CronCheckpoint};
use crate::client::{HabiticaClient, RequestError};
use crate::clock::Clock;
use crate::model::UserState;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl SyncError {
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            Self::Request(error) => Some(error),
            Self::Checkpoint(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Checkpoint already covers the latest scheduled reset; nothing was
    /// sent.
    AlreadySynced { checkpoint: DateTime<Utc> },
    /// The service had already reset on its own; the checkpoint now records
    /// when.
    Recorded { last_cron: DateTime<Utc> },
    /// A reset was triggered; `summary` is the service's response.
    CronRan { summary: Value },
}

pub struct CronCoordinator<'a> {
    client: &'a HabiticaClient,
    checkpoint: &'a CronCheckpoint,
    schedule: CronSchedule,
    clock: &'a dyn Clock,
}

impl<'a> CronCoordinator<'a> {
    pub fn new(
        client: &'a HabiticaClient,
        checkpoint: &'a CronCheckpoint,
        schedule: CronSchedule,
        clock: &'a dyn Clock,
    ) -> Self {
        Self { client, checkpoint, schedule, clock }
    }

    /// Make sure today's reset has happened, triggering it if the service
    /// says it is due.
    pub async fn ensure_synced(&self) -> Result<SyncOutcome, SyncError> {
        let boundary = self.schedule.boundary(self.clock.now());
        if let Some(checkpoint) = self.current_checkpoint() {
            if checkpoint >= boundary {
                debug!(%checkpoint, %boundary, "cron checkpoint is current");
                return Ok(SyncOutcome::AlreadySynced { checkpoint });
            }
        }

        debug!(%boundary, "cron checkpoint is behind the last scheduled reset");
        let state = self.client.user_state().await?;
        if state.needs_cron {
            self.force_cron().await
        } else {
            self.checkpoint.advance(state.last_cron)?;
            info!(last_cron = %state.last_cron, "service already reset; recorded its cron time");
            Ok(SyncOutcome::Recorded { last_cron: state.last_cron })
        }
    }

    /// Trigger the reset unconditionally and checkpoint "now".
    pub async fn force_cron(&self) -> Result<SyncOutcome, SyncError> {
        info!("running cron");
        let summary = self.client.run_cron().await?;
        self.checkpoint.advance(self.clock.now())?;
        Ok(SyncOutcome::CronRan { summary })
    }

    /// Feed back a `/user` state fetched for another purpose. When the
    /// service reports no pending reset, the checkpoint moves up to its
    /// last cron time. Returns the checkpoint after the update, if any.
    pub fn observe(&self, state: &UserState) -> Result<Option<DateTime<Utc>>, SyncError> {
        if state.needs_cron {
            return Ok(None);
        }
        Ok(Some(self.checkpoint.advance(state.last_cron)?))
    }

    fn current_checkpoint(&self) -> Option<DateTime<Utc>> {
        match self.checkpoint.read() {
            Ok(checkpoint) => Some(checkpoint),
            Err(error) if error.is_not_found() => None,
            Err(error) => {
                warn!(%error, "unreadable cron checkpoint; treating as never synced");
                None
            }
        }
    }
}
