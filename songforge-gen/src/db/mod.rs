//! Database access for the generation service
//!
//! One SQLite database holds the song aggregates, the category relation, and
//! the durable job queue. Tables are created on pool init.

pub mod jobs;
pub mod songs;

use crate::error::GenResult;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the database connection pool
///
/// Creates the parent directory and the schema if missing.
pub async fn init_database_pool(db_path: &Path) -> GenResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(songforge_common::Error::Io)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the service tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> GenResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            generation_type TEXT NOT NULL,
            prompt TEXT,
            lyrics TEXT,
            described_lyrics TEXT,
            full_described_song TEXT,
            audio_key TEXT,
            cover_image_key TEXT,
            user_id TEXT NOT NULL,
            audio_duration REAL NOT NULL,
            seed INTEGER NOT NULL,
            guidance_scale REAL NOT NULL,
            infer_step INTEGER NOT NULL,
            instrumental INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS song_categories (
            song_id TEXT NOT NULL REFERENCES songs(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (song_id, category_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event TEXT NOT NULL,
            song_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL DEFAULT 3,
            lease_expires_at TEXT,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(status, id)")
        .execute(pool)
        .await?;

    Ok(())
}
