//! Port contracts for external capabilities
//!
//! Each trait abstracts one external system - relational persistence, object
//! storage, the AI generation backend, and the job queue - so the
//! orchestration service composes them without knowing any adapter detail.
//! Implementations live in `db/` and `services/`.

use crate::error::GenResult;
use crate::models::{NewSong, Song, SongStatus};
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence contract for `Song` aggregates
///
/// State-machine enforcement lives behind this port: `update_status` and
/// `update_with_audio_data` reject backward and terminal-to-terminal
/// transitions with `GenError::InvalidTransition`.
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Assign identity and timestamps, persist the initial state, and return
    /// the full aggregate.
    async fn create(&self, song: NewSong) -> GenResult<Song>;

    /// Explicit absence for unknown ids; never an error for a missing id.
    async fn find_by_id(&self, id: Uuid) -> GenResult<Option<Song>>;

    /// Atomically transition status, advancing `updated_at`.
    async fn update_status(&self, id: Uuid, status: SongStatus) -> GenResult<Song>;

    /// Atomically set both artifact keys, replace the category set wholesale
    /// (upsert-by-name), and transition to `Completed`. Idempotent under
    /// retry with identical arguments.
    async fn update_with_audio_data(
        &self,
        id: Uuid,
        audio_key: &str,
        cover_image_key: &str,
        categories: &[String],
    ) -> GenResult<Song>;
}

/// What the AI backend returns for a finished generation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSong {
    /// Object storage key of the generated audio
    pub audio_key: String,
    /// Object storage key of the generated cover image
    pub cover_image_key: String,
    /// Free-text tags derived by the backend
    pub categories: Vec<String>,
}

/// Contract for invoking the remote AI generation backend
///
/// One synchronous request/response exchange per song; no streaming, no
/// partial results, no mid-flight cancellation.
#[async_trait]
pub trait MusicBackend: Send + Sync {
    /// Generate audio and cover for the song, shaping the payload from its
    /// generation type. Non-success responses surface as
    /// `GenError::Backend` carrying the backend's status and message.
    async fn generate_music(&self, song: &Song) -> GenResult<GeneratedSong>;
}

/// Contract for durable binary artifact storage and URL issuance
///
/// Keys are opaque strings chosen by the backend; this side only passes them
/// through.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// A retrieval URL for a stored artifact: presigned and time-bounded by
    /// default, or a deterministic direct URL when a public base is
    /// configured. Callers must not assume the URL is time-limited.
    async fn presigned_url(&self, key: &str) -> GenResult<String>;

    /// Store raw bytes under `key`, returning the key.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> GenResult<String>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> GenResult<bool>;

    /// Remove the object under `key`.
    async fn delete(&self, key: &str) -> GenResult<()>;
}

/// Acknowledgement of a successfully enqueued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAck {
    /// Queue-assigned job id
    pub job_id: i64,
}

/// Contract for deferring generation work
///
/// Delivery is at-least-once; enqueue happens only after the song row
/// exists, so every processed song was once enqueued.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a `song/generate` job carrying the song id and the original
    /// request fields.
    async fn queue_song(&self, song_id: Uuid, payload: &serde_json::Value) -> GenResult<JobAck>;
}
