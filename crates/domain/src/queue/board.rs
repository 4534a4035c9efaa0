use std::{
    cmp::Reverse,
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cqrs_es::EventEnvelope;
use serde::{Deserialize, Serialize};

use super::aggregate::{Priority, QueueEntry, Stage};
use super::events::Event;

/// One card on the fulfillment board.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct BoardCard {
    pub entry_id: String,
    pub prescription_id: String,
    pub stage: Stage,
    pub priority: Priority,
    pub entered_stage_at: DateTime<Utc>,
    pub assigned_user_id: Option<String>,
    pub version: u64,
}

/// Kanban read model of queue entries grouped by stage, for board
/// rendering. Projection only; the aggregate stays the authority on moves
/// and a stale board simply earns the caller a stale-stage rejection.
#[derive(Default)]
pub struct Board {
    cards: RwLock<HashMap<String, BoardCard>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cards currently at `stage`, urgent first, oldest first within a
    /// priority.
    pub fn list_by_stage(&self, stage: Stage) -> Vec<BoardCard> {
        let cards = match self.cards.read() {
            Ok(cards) => cards,
            Err(_) => return Vec::new(),
        };
        let mut matching: Vec<BoardCard> = cards
            .values()
            .filter(|card| card.stage == stage)
            .cloned()
            .collect();
        matching.sort_by_key(|card| (Reverse(card.priority), card.entered_stage_at));
        matching
    }

    fn fold(&self, event: &Event) {
        let mut cards = match self.cards.write() {
            Ok(cards) => cards,
            Err(_) => return,
        };

        match event {
            Event::Enqueued {
                id,
                prescription_id,
                priority,
                entered_at,
            } => {
                cards.insert(
                    id.clone(),
                    BoardCard {
                        entry_id: id.clone(),
                        prescription_id: prescription_id.clone(),
                        stage: Stage::New,
                        priority: *priority,
                        entered_stage_at: *entered_at,
                        assigned_user_id: None,
                        version: 1,
                    },
                );
            }

            Event::StageMoved {
                id,
                to,
                version,
                moved_at,
                ..
            } => {
                if let Some(card) = cards.get_mut(id) {
                    card.stage = *to;
                    card.entered_stage_at = *moved_at;
                    card.version = *version;
                }
            }

            Event::Assigned { id, user_id, .. } => {
                if let Some(card) = cards.get_mut(id) {
                    card.assigned_user_id = Some(user_id.clone());
                }
            }
        }
    }
}

/// Feeds committed queue events into a shared [`Board`].
pub struct BoardQuery {
    board: Arc<Board>,
}

impl BoardQuery {
    pub fn new(board: Arc<Board>) -> Self {
        Self { board }
    }
}

#[async_trait]
impl cqrs_es::Query<QueueEntry> for BoardQuery {
    async fn dispatch(&self, _entry_id: &str, events: &[EventEnvelope<QueueEntry>]) {
        for envelope in events {
            self.board.fold(&envelope.payload);
        }
    }
}
