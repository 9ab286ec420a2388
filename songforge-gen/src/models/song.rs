//! Song aggregate and generation state machine
//!
//! A song progresses through exactly one of two paths:
//! QUEUED → PROCESSING → COMPLETED, or QUEUED → PROCESSING → FAILED.
//! Terminal states are final; the repository rejects any transition out of
//! them so a redelivered job cannot resurrect a finished song.

use crate::models::AudioParameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongStatus {
    /// Persisted, waiting for a worker
    Queued,
    /// Worker claimed the job; backend call in flight
    Processing,
    /// Artifacts stored and linked
    Completed,
    /// Generation failed terminally
    Failed,
}

impl SongStatus {
    /// Whether a direct transition to `next` is legal.
    ///
    /// This predicate is the single definition of the state machine; the
    /// repository adapter enforces it inside its update transactions.
    pub fn can_transition_to(self, next: SongStatus) -> bool {
        matches!(
            (self, next),
            (SongStatus::Queued, SongStatus::Processing)
                | (SongStatus::Processing, SongStatus::Completed)
                | (SongStatus::Processing, SongStatus::Failed)
        )
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, SongStatus::Completed | SongStatus::Failed)
    }

    /// Wire/database representation
    pub fn as_str(self) -> &'static str {
        match self {
            SongStatus::Queued => "queued",
            SongStatus::Processing => "processing",
            SongStatus::Completed => "completed",
            SongStatus::Failed => "failed",
        }
    }

    /// Parse the wire/database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(SongStatus::Queued),
            "processing" => Some(SongStatus::Processing),
            "completed" => Some(SongStatus::Completed),
            "failed" => Some(SongStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SongStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation request mode
///
/// Fixed at song creation; determines which text fields are required and how
/// the backend payload is shaped. Closed enum - every dispatch over it is an
/// exhaustive `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    /// Backend derives prompt and lyrics from one free-text description
    FromDescription,
    /// Caller supplies both the style prompt and the full lyrics
    WithCustomLyrics,
    /// Caller supplies the style prompt and a description of the lyrics
    WithDescribedLyrics,
}

impl GenerationType {
    /// Wire/database representation
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationType::FromDescription => "from_description",
            GenerationType::WithCustomLyrics => "with_custom_lyrics",
            GenerationType::WithDescribedLyrics => "with_described_lyrics",
        }
    }

    /// Parse the wire/database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "from_description" => Some(GenerationType::FromDescription),
            "with_custom_lyrics" => Some(GenerationType::WithCustomLyrics),
            "with_described_lyrics" => Some(GenerationType::WithDescribedLyrics),
            _ => None,
        }
    }
}

impl std::fmt::Display for GenerationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The song aggregate root
///
/// Invariants (upheld by the repository adapter):
/// - `generation_type` never changes after creation
/// - `audio_key` and `cover_image_key` are both absent or both present, and
///   become present only on the transition to `Completed`
/// - `categories` is empty until completion, then reflects exactly what the
///   backend returned (insertion order preserved through persistence)
/// - `updated_at` advances on every status or artifact mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    pub status: SongStatus,
    pub generation_type: GenerationType,
    pub prompt: Option<String>,
    pub lyrics: Option<String>,
    pub described_lyrics: Option<String>,
    pub full_described_song: Option<String>,
    /// Object storage key of the generated audio
    pub audio_key: Option<String>,
    /// Object storage key of the generated cover image
    pub cover_image_key: Option<String>,
    pub categories: Vec<String>,
    pub user_id: String,
    pub audio_parameters: AudioParameters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A song as handed to the repository for creation: everything except the
/// system-assigned id and timestamps.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub status: SongStatus,
    pub generation_type: GenerationType,
    pub prompt: Option<String>,
    pub lyrics: Option<String>,
    pub described_lyrics: Option<String>,
    pub full_described_song: Option<String>,
    pub user_id: String,
    pub audio_parameters: AudioParameters,
}
