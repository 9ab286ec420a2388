//! Song persistence over SQLite
//!
//! Implements the `SongRepository` port. Status-transition enforcement lives
//! here, inside the update transactions, so that a redelivered job racing a
//! finished song is rejected by the same check every caller goes through.

use crate::error::{GenError, GenResult};
use crate::models::{AudioParameters, GenerationType, NewSong, Song, SongStatus};
use crate::ports::SongRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

/// `SongRepository` adapter holding a SQLite connection pool
#[derive(Clone)]
pub struct SqliteSongRepository {
    pool: SqlitePool,
}

impl SqliteSongRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the insertion-ordered category names linked to a song
    async fn load_categories<'e, E>(executor: E, song_id: &str) -> GenResult<Vec<String>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let rows = sqlx::query(
            r#"
            SELECT c.name
            FROM categories c
            JOIN song_categories sc ON sc.category_id = c.id
            WHERE sc.song_id = ?
            ORDER BY sc.position
            "#,
        )
        .bind(song_id)
        .fetch_all(executor)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(GenError::from))
            .collect()
    }

    fn row_to_song(row: &sqlx::sqlite::SqliteRow, categories: Vec<String>) -> GenResult<Song> {
        let id_str: String = row.try_get("id")?;
        let status_str: String = row.try_get("status")?;
        let type_str: String = row.try_get("generation_type")?;

        let id = Uuid::parse_str(&id_str)
            .map_err(|e| GenError::Persistence(format!("corrupt song id {id_str}: {e}")))?;
        let status = SongStatus::parse(&status_str)
            .ok_or_else(|| GenError::Persistence(format!("corrupt song status: {status_str}")))?;
        let generation_type = GenerationType::parse(&type_str).ok_or_else(|| {
            GenError::Persistence(format!("corrupt generation type: {type_str}"))
        })?;

        Ok(Song {
            id,
            status,
            generation_type,
            prompt: row.try_get("prompt")?,
            lyrics: row.try_get("lyrics")?,
            described_lyrics: row.try_get("described_lyrics")?,
            full_described_song: row.try_get("full_described_song")?,
            audio_key: row.try_get("audio_key")?,
            cover_image_key: row.try_get("cover_image_key")?,
            categories,
            user_id: row.try_get("user_id")?,
            audio_parameters: AudioParameters {
                audio_duration: row.try_get("audio_duration")?,
                seed: row.try_get("seed")?,
                guidance_scale: row.try_get("guidance_scale")?,
                infer_step: row.try_get("infer_step")?,
                instrumental: row.try_get("instrumental")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Load a song with its categories, or `NotFound`
    async fn load_song(&self, id: Uuid) -> GenResult<Song> {
        self.find_by_id(id).await?.ok_or(GenError::NotFound(id))
    }
}

/// De-duplicate a category list, keeping first-occurrence order
fn dedupe_categories(categories: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for name in categories {
        if seen.insert(name.as_str()) {
            deduped.push(name.clone());
        }
    }
    deduped
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn create(&self, song: NewSong) -> GenResult<Song> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO songs (
                id, status, generation_type,
                prompt, lyrics, described_lyrics, full_described_song,
                user_id,
                audio_duration, seed, guidance_scale, infer_step, instrumental,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(song.status.as_str())
        .bind(song.generation_type.as_str())
        .bind(&song.prompt)
        .bind(&song.lyrics)
        .bind(&song.described_lyrics)
        .bind(&song.full_described_song)
        .bind(&song.user_id)
        .bind(song.audio_parameters.audio_duration)
        .bind(song.audio_parameters.seed)
        .bind(song.audio_parameters.guidance_scale)
        .bind(song.audio_parameters.infer_step)
        .bind(song.audio_parameters.instrumental)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Song {
            id,
            status: song.status,
            generation_type: song.generation_type,
            prompt: song.prompt,
            lyrics: song.lyrics,
            described_lyrics: song.described_lyrics,
            full_described_song: song.full_described_song,
            audio_key: None,
            cover_image_key: None,
            categories: Vec::new(),
            user_id: song.user_id,
            audio_parameters: song.audio_parameters,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> GenResult<Option<Song>> {
        let row = sqlx::query("SELECT * FROM songs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let categories = Self::load_categories(&self.pool, &id.to_string()).await?;
                Ok(Some(Self::row_to_song(&row, categories)?))
            }
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: SongStatus) -> GenResult<Song> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM songs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GenError::NotFound(id))?;

        let current_str: String = row.try_get("status")?;
        let current = SongStatus::parse(&current_str)
            .ok_or_else(|| GenError::Persistence(format!("corrupt song status: {current_str}")))?;

        if !current.can_transition_to(status) {
            return Err(GenError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        sqlx::query("UPDATE songs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(song_id = %id, from = %current, to = %status, "Song status updated");
        self.load_song(id).await
    }

    async fn update_with_audio_data(
        &self,
        id: Uuid,
        audio_key: &str,
        cover_image_key: &str,
        categories: &[String],
    ) -> GenResult<Song> {
        let new_categories = dedupe_categories(categories);
        let id_str = id.to_string();

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status, audio_key, cover_image_key FROM songs WHERE id = ?")
            .bind(&id_str)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GenError::NotFound(id))?;

        let current_str: String = row.try_get("status")?;
        let current = SongStatus::parse(&current_str)
            .ok_or_else(|| GenError::Persistence(format!("corrupt song status: {current_str}")))?;

        if current == SongStatus::Completed {
            // At-least-once delivery: a retry with identical arguments is a
            // no-op. A re-completion with new artifacts replaces wholesale.
            let existing_audio: Option<String> = row.try_get("audio_key")?;
            let existing_cover: Option<String> = row.try_get("cover_image_key")?;
            let existing_categories = Self::load_categories(&mut *tx, &id_str).await?;
            if existing_audio.as_deref() == Some(audio_key)
                && existing_cover.as_deref() == Some(cover_image_key)
                && existing_categories == new_categories
            {
                drop(tx);
                return self.load_song(id).await;
            }
        } else if !current.can_transition_to(SongStatus::Completed) {
            return Err(GenError::InvalidTransition {
                from: current,
                to: SongStatus::Completed,
            });
        }

        sqlx::query(
            r#"
            UPDATE songs
            SET status = ?, audio_key = ?, cover_image_key = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(SongStatus::Completed.as_str())
        .bind(audio_key)
        .bind(cover_image_key)
        .bind(Utc::now())
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        // Reconcile the category links against the new set: upsert-by-name
        // for additions, unlink removals, rewrite positions. Unchanged
        // category rows keep their ids.
        let mut new_ids = Vec::with_capacity(new_categories.len());
        for name in &new_categories {
            sqlx::query("INSERT INTO categories (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            let id_row = sqlx::query("SELECT id FROM categories WHERE name = ?")
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
            new_ids.push(id_row.try_get::<i64, _>("id")?);
        }

        let linked_rows = sqlx::query("SELECT category_id FROM song_categories WHERE song_id = ?")
            .bind(&id_str)
            .fetch_all(&mut *tx)
            .await?;
        for linked in &linked_rows {
            let category_id: i64 = linked.try_get("category_id")?;
            if !new_ids.contains(&category_id) {
                sqlx::query("DELETE FROM song_categories WHERE song_id = ? AND category_id = ?")
                    .bind(&id_str)
                    .bind(category_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for (position, category_id) in new_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO song_categories (song_id, category_id, position)
                VALUES (?, ?, ?)
                ON CONFLICT(song_id, category_id) DO UPDATE SET position = excluded.position
                "#,
            )
            .bind(&id_str)
            .bind(category_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(song_id = %id, categories = new_categories.len(), "Song completed with audio data");
        self.load_song(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_repo() -> SqliteSongRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init_tables(&pool).await.unwrap();
        SqliteSongRepository::new(pool)
    }

    fn new_song() -> NewSong {
        NewSong {
            status: SongStatus::Queued,
            generation_type: GenerationType::FromDescription,
            prompt: None,
            lyrics: None,
            described_lyrics: None,
            full_described_song: Some("upbeat jazz".into()),
            user_id: "user-1".into(),
            audio_parameters: AudioParameters::default(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_round_trip() {
        let repo = test_repo().await;
        let created = repo.create(new_song()).await.unwrap();

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, SongStatus::Queued);
        assert_eq!(found.generation_type, GenerationType::FromDescription);
        assert_eq!(found.full_described_song.as_deref(), Some("upbeat jazz"));
        assert_eq!(found.audio_parameters, AudioParameters::default());
        assert!(found.categories.is_empty());
        assert!(found.audio_key.is_none());
    }

    #[tokio::test]
    async fn test_find_missing_id_is_none_not_error() {
        let repo = test_repo().await;
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_enforces_state_machine() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();

        // Queued -> Completed skips Processing
        let err = repo
            .update_status(song.id, SongStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::InvalidTransition { .. }));

        let song = repo
            .update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();
        assert_eq!(song.status, SongStatus::Processing);

        let song = repo
            .update_status(song.id, SongStatus::Failed)
            .await
            .unwrap();
        assert_eq!(song.status, SongStatus::Failed);

        // Failed -> Queued would resurrect a dead job
        let err = repo
            .update_status(song.id, SongStatus::Queued)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenError::InvalidTransition {
                from: SongStatus::Failed,
                to: SongStatus::Queued,
            }
        ));
    }

    #[tokio::test]
    async fn test_completed_rejects_processing() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();
        repo.update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();
        repo.update_with_audio_data(song.id, "a/1", "c/1", &["jazz".into()])
            .await
            .unwrap();

        let err = repo
            .update_status(song.id, SongStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenError::InvalidTransition {
                from: SongStatus::Completed,
                to: SongStatus::Processing,
            }
        ));
    }

    #[tokio::test]
    async fn test_update_with_audio_data_sets_keys_and_categories() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();
        repo.update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();

        let song = repo
            .update_with_audio_data(song.id, "a/1", "c/1", &["jazz".into(), "smooth".into()])
            .await
            .unwrap();
        assert_eq!(song.status, SongStatus::Completed);
        assert_eq!(song.audio_key.as_deref(), Some("a/1"));
        assert_eq!(song.cover_image_key.as_deref(), Some("c/1"));
        assert_eq!(song.categories, vec!["jazz", "smooth"]);
    }

    #[tokio::test]
    async fn test_update_with_audio_data_rejected_from_queued() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();

        let err = repo
            .update_with_audio_data(song.id, "a/1", "c/1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_second_category_set_replaces_first() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();
        repo.update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();

        repo.update_with_audio_data(song.id, "a/1", "c/1", &["jazz".into(), "swing".into()])
            .await
            .unwrap();
        let song = repo
            .update_with_audio_data(song.id, "a/2", "c/2", &["electro".into(), "swing".into()])
            .await
            .unwrap();

        // Exactly the second set: no union, no duplicates
        assert_eq!(song.categories, vec!["electro", "swing"]);
        assert_eq!(song.audio_key.as_deref(), Some("a/2"));

        // "swing" kept its category row; "jazz" is merely unlinked
        let names: Vec<String> = sqlx::query("SELECT name FROM categories ORDER BY id")
            .fetch_all(&repo.pool)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get::<String, _>("name"))
            .collect();
        assert_eq!(names, vec!["jazz", "swing", "electro"]);
    }

    #[tokio::test]
    async fn test_identical_retry_is_idempotent() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();
        repo.update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();

        let first = repo
            .update_with_audio_data(song.id, "a/1", "c/1", &["jazz".into()])
            .await
            .unwrap();
        let second = repo
            .update_with_audio_data(song.id, "a/1", "c/1", &["jazz".into()])
            .await
            .unwrap();

        assert_eq!(second.status, SongStatus::Completed);
        assert_eq!(second.categories, first.categories);
        assert_eq!(second.updated_at, first.updated_at);

        // No duplicate link rows
        let links: i64 = sqlx::query("SELECT COUNT(*) AS n FROM song_categories")
            .fetch_one(&repo.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(links, 1);
    }

    #[tokio::test]
    async fn test_duplicate_categories_in_input_are_collapsed() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();
        repo.update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();

        let song = repo
            .update_with_audio_data(
                song.id,
                "a/1",
                "c/1",
                &["jazz".into(), "jazz".into(), "smooth".into()],
            )
            .await
            .unwrap();
        assert_eq!(song.categories, vec!["jazz", "smooth"]);
    }

    #[tokio::test]
    async fn test_update_with_audio_data_on_failed_song_rejected() {
        let repo = test_repo().await;
        let song = repo.create(new_song()).await.unwrap();
        repo.update_status(song.id, SongStatus::Processing)
            .await
            .unwrap();
        repo.update_status(song.id, SongStatus::Failed).await.unwrap();

        let err = repo
            .update_with_audio_data(song.id, "a/1", "c/1", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenError::InvalidTransition {
                from: SongStatus::Failed,
                to: SongStatus::Completed,
            }
        ));
    }
}
