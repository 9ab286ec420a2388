//! Song lifecycle events and EventBus
//!
//! Every status transition of a song is broadcast as a [`SongEvent`] so that
//! observers (a UI service, metrics collection, tests) can follow generation
//! progress without polling the database. Events are best-effort: dropping an
//! event never affects the state machine itself.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Song lifecycle event
///
/// Broadcast via [`EventBus`]; serializable for transport to other services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SongEvent {
    /// Song persisted and its generation job enqueued
    SongQueued {
        song_id: Uuid,
        /// Wire name of the generation mode (`from_description`, ...)
        generation_type: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Worker picked the song up and the backend call is about to start
    SongProcessing {
        song_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Generation finished; artifacts stored and linked
    SongCompleted {
        song_id: Uuid,
        audio_key: String,
        cover_image_key: String,
        categories: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Generation failed terminally for this attempt
    SongFailed {
        song_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SongEvent {
    /// Song id this event refers to
    pub fn song_id(&self) -> Uuid {
        match self {
            SongEvent::SongQueued { song_id, .. }
            | SongEvent::SongProcessing { song_id, .. }
            | SongEvent::SongCompleted { song_id, .. }
            | SongEvent::SongFailed { song_id, .. } => *song_id,
        }
    }
}

/// Capacity-bounded broadcast bus for [`SongEvent`]
///
/// Subscribers receive events emitted after they subscribe; slow subscribers
/// that fall more than `capacity` events behind see a lagged error from the
/// underlying channel, never a blocked producer.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SongEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SongEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    pub fn emit(
        &self,
        event: SongEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<SongEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the case where no subscriber is listening
    pub fn emit_lossy(&self, event: SongEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for song event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
