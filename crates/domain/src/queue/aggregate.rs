use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::services::{Clock, SystemClock};

use super::{Command, Event};

/// Position in the fulfillment pipeline.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[serde(alias = "NEW")]
    New,
    #[serde(alias = "UNVERIFIED")]
    Unverified,
    #[serde(alias = "VERIFIED")]
    Verified,
    #[serde(alias = "READY")]
    Ready,
    #[serde(alias = "DELIVERED")]
    Delivered,
    /// Side state; resumes to the stage it was held from
    #[serde(alias = "ON_HOLD")]
    OnHold,
}

impl Default for Stage {
    fn default() -> Self {
        Self::New
    }
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Delivered)
    }

    /// Directed stage graph. ON_HOLD edges list every resumable stage; the
    /// aggregate additionally pins the resume target to the stage the entry
    /// was held from.
    pub fn can_move_to(&self, to: Stage) -> bool {
        use Stage::*;
        matches!(
            (*self, to),
            (New, Unverified)
                | (New, OnHold)
                | (Unverified, Verified)
                | (Unverified, OnHold)
                | (Verified, Ready)
                | (Verified, OnHold)
                | (Ready, Delivered)
                | (Ready, OnHold)
                | (OnHold, New)
                | (OnHold, Unverified)
                | (OnHold, Verified)
                | (OnHold, Ready)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::New => "NEW",
            Stage::Unverified => "UNVERIFIED",
            Stage::Verified => "VERIFIED",
            Stage::Ready => "READY",
            Stage::Delivered => "DELIVERED",
            Stage::OnHold => "ON_HOLD",
        };
        f.write_str(name)
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Stage::New),
            "UNVERIFIED" => Ok(Stage::Unverified),
            "VERIFIED" => Ok(Stage::Verified),
            "READY" => Ok(Stage::Ready),
            "DELIVERED" => Ok(Stage::Delivered),
            "ON_HOLD" => Ok(Stage::OnHold),
            other => Err(Error::Validation {
                message: format!("Unknown stage: {other}"),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Fulfillment queue entry aggregate. Keyed by prescription id, so one
/// prescription has exactly one entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct QueueEntry {
    pub id: String,
    pub prescription_id: String,
    pub stage: Stage,
    pub entered_stage_at: DateTime<Utc>,
    pub prior_stage_on_hold: Option<Stage>,
    pub assigned_user_id: Option<String>,
    pub priority: Priority,
    /// Monotonic; bumped on every move for optimistic client reconciliation
    pub version: u64,
}

pub const AGGREGATE_TYPE: &str = "QueueEntry";

#[derive(Clone)]
pub struct Services {
    pub clock: Arc<dyn Clock>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }
}

#[async_trait]
impl Aggregate for QueueEntry {
    type Command = Command;
    type Event = Event;
    type Error = Error;
    type Services = Services;

    fn aggregate_type() -> String {
        AGGREGATE_TYPE.to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        let now = services.clock.now();

        match command {
            Command::Enqueue {
                id,
                prescription_id,
                priority,
            } => {
                self.validate_new()?;

                Ok(vec![Event::Enqueued {
                    id,
                    prescription_id,
                    priority,
                    entered_at: now,
                }])
            }

            Command::RequestMove { from, to } => {
                self.validate_existing()?;

                // Stale check first: a caller acting on an outdated board
                // must refresh before its move intent can be judged.
                if from != self.stage {
                    return Err(Error::StaleStage {
                        expected: from.to_string(),
                        actual: self.stage.to_string(),
                    });
                }
                if !self.stage.can_move_to(to) {
                    return Err(Error::InvalidStageTransition {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                if self.stage == Stage::OnHold && Some(to) != self.prior_stage_on_hold {
                    return Err(Error::InvalidStageTransition {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }

                let prior_stage_on_hold = if to == Stage::OnHold { Some(from) } else { None };

                Ok(vec![Event::StageMoved {
                    id: self.id.clone(),
                    from,
                    to,
                    prior_stage_on_hold,
                    version: self.version + 1,
                    moved_at: now,
                }])
            }

            Command::Assign { user_id } => {
                self.validate_existing()?;
                if self.stage.is_terminal() {
                    return Err(Error::Validation {
                        message: format!("Entry at {} can no longer be assigned", self.stage),
                    });
                }

                Ok(vec![Event::Assigned {
                    id: self.id.clone(),
                    user_id,
                    assigned_at: now,
                }])
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            Event::Enqueued {
                id,
                prescription_id,
                priority,
                entered_at,
            } => {
                self.id = id;
                self.prescription_id = prescription_id;
                self.stage = Stage::New;
                self.priority = priority;
                self.entered_stage_at = entered_at;
                self.version = 1;
            }

            Event::StageMoved {
                to,
                prior_stage_on_hold,
                version,
                moved_at,
                ..
            } => {
                self.stage = to;
                self.prior_stage_on_hold = prior_stage_on_hold;
                self.entered_stage_at = moved_at;
                self.version = version;
            }

            Event::Assigned { user_id, .. } => {
                self.assigned_user_id = Some(user_id);
            }
        }
    }
}

impl QueueEntry {
    fn validate_new(&self) -> Result<(), Error> {
        if !self.id.is_empty() {
            return Err(Error::Uniqueness {
                field: "id".to_string(),
            });
        }
        Ok(())
    }

    fn validate_existing(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::NotFound {
                entity: AGGREGATE_TYPE.to_string(),
            });
        }
        Ok(())
    }
}
