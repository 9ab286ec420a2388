//! Generation orchestration service
//!
//! Drives a song through its full lifecycle: `submit` persists the aggregate
//! and enqueues the generation job; `process` (called by the worker) runs the
//! backend exchange and lands the song in a terminal state. All external
//! effects go through the four ports; this service owns the ordering between
//! them and the interpretation of their errors.

use crate::error::{GenError, GenResult};
use crate::models::{AudioParameters, GenerationRequest, NewSong, Song, SongStatus};
use crate::ports::{ArtifactStore, JobQueue, MusicBackend, SongRepository};
use chrono::Utc;
use songforge_common::{EventBus, SongEvent};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Presigned (or public-base) retrieval URLs for a completed song
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUrls {
    pub audio_url: String,
    pub cover_image_url: String,
}

/// The composition root over the four ports
pub struct SongService {
    repository: Arc<dyn SongRepository>,
    backend: Arc<dyn MusicBackend>,
    queue: Arc<dyn JobQueue>,
    storage: Arc<dyn ArtifactStore>,
    events: EventBus,
}

impl SongService {
    pub fn new(
        repository: Arc<dyn SongRepository>,
        backend: Arc<dyn MusicBackend>,
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn ArtifactStore>,
        events: EventBus,
    ) -> Self {
        Self {
            repository,
            backend,
            queue,
            storage,
            events,
        }
    }

    /// Accept a generation request: validate, persist `Queued`, enqueue.
    ///
    /// Validation runs first - an invalid request never touches the
    /// repository or the queue. Enqueue runs only after the song row exists,
    /// so every queued job refers to a persisted song; if the enqueue itself
    /// fails, the song stays `Queued` for an external reconciliation sweep
    /// and the error is surfaced.
    pub async fn submit(&self, user_id: &str, request: GenerationRequest) -> GenResult<Song> {
        request.validate()?;

        let song = self
            .repository
            .create(NewSong {
                status: SongStatus::Queued,
                generation_type: request.generation_type,
                prompt: request.prompt.clone(),
                lyrics: request.lyrics.clone(),
                described_lyrics: request.described_lyrics.clone(),
                full_described_song: request.full_described_song.clone(),
                user_id: user_id.to_string(),
                audio_parameters: AudioParameters::from_partial(&request.audio_parameters),
            })
            .await?;

        // Job payload: song id plus the original request fields
        let mut payload = serde_json::to_value(&request).map_err(|e| {
            GenError::Common(songforge_common::Error::Internal(format!(
                "unserializable request: {e}"
            )))
        })?;
        payload["song_id"] = serde_json::json!(song.id);

        self.queue.queue_song(song.id, &payload).await?;

        info!(song_id = %song.id, mode = %song.generation_type, "Song submitted");
        self.events.emit_lossy(SongEvent::SongQueued {
            song_id: song.id,
            generation_type: song.generation_type.as_str().to_string(),
            timestamp: Utc::now(),
        });

        Ok(song)
    }

    /// Run the generation exchange for a queued song.
    ///
    /// Invoked by the asynchronous worker. Redelivery of an already-finished
    /// song is a no-op returning the song as-is. A backend failure (timeouts
    /// included) moves the song to `Failed` and re-surfaces the original
    /// error so the caller's retry/backoff policy can see it.
    pub async fn process(&self, song_id: Uuid) -> GenResult<Song> {
        let song = self
            .repository
            .find_by_id(song_id)
            .await?
            .ok_or(GenError::NotFound(song_id))?;

        if song.status.is_terminal() {
            info!(song_id = %song_id, status = %song.status, "Redelivered job for finished song, skipping");
            return Ok(song);
        }

        let song = match self
            .repository
            .update_status(song_id, SongStatus::Processing)
            .await
        {
            Ok(song) => song,
            Err(GenError::InvalidTransition { from, to }) => {
                // Lost a redelivery race; re-read and no-op if the winner
                // already finished the song.
                let current = self
                    .repository
                    .find_by_id(song_id)
                    .await?
                    .ok_or(GenError::NotFound(song_id))?;
                if current.status.is_terminal() {
                    return Ok(current);
                }
                return Err(GenError::InvalidTransition { from, to });
            }
            Err(e) => return Err(e),
        };

        self.events.emit_lossy(SongEvent::SongProcessing {
            song_id,
            timestamp: Utc::now(),
        });

        match self.backend.generate_music(&song).await {
            Ok(generated) => {
                let song = self
                    .repository
                    .update_with_audio_data(
                        song_id,
                        &generated.audio_key,
                        &generated.cover_image_key,
                        &generated.categories,
                    )
                    .await?;

                info!(song_id = %song_id, categories = ?song.categories, "Song completed");
                self.events.emit_lossy(SongEvent::SongCompleted {
                    song_id,
                    audio_key: generated.audio_key,
                    cover_image_key: generated.cover_image_key,
                    categories: generated.categories,
                    timestamp: Utc::now(),
                });
                Ok(song)
            }
            Err(e) => {
                error!(song_id = %song_id, "Generation failed: {}", e);
                if let Err(update_err) = self
                    .repository
                    .update_status(song_id, SongStatus::Failed)
                    .await
                {
                    // The failure itself outranks the bookkeeping error
                    warn!(song_id = %song_id, "Could not mark song failed: {}", update_err);
                }
                self.events.emit_lossy(SongEvent::SongFailed {
                    song_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Retrieval URLs for a completed song's artifacts
    pub async fn playback_urls(&self, song_id: Uuid) -> GenResult<PlaybackUrls> {
        let song = self
            .repository
            .find_by_id(song_id)
            .await?
            .ok_or(GenError::NotFound(song_id))?;

        let (Some(audio_key), Some(cover_key)) = (&song.audio_key, &song.cover_image_key) else {
            return Err(GenError::Validation(format!(
                "song {song_id} has no artifacts (status {})",
                song.status
            )));
        };

        Ok(PlaybackUrls {
            audio_url: self.storage.presigned_url(audio_key).await?,
            cover_image_url: self.storage.presigned_url(cover_key).await?,
        })
    }
}
