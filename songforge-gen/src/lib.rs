//! songforge-gen - AI music generation orchestration service
//!
//! A client submits a generation request in one of three modes (free-text
//! description, custom lyrics, described lyrics). The request is persisted as
//! a `Song` aggregate in `queued` state and handed to the AI backend through
//! a durable job; the resulting audio and cover artifacts live in object
//! storage and are linked back to the aggregate on completion.
//!
//! Library layout:
//! - `models` - the song aggregate, state machine, and value objects
//! - `ports` - contracts for persistence, storage, the AI backend, the queue
//! - `db` - SQLite adapters (song repository, job queue)
//! - `services` - HTTP/object-storage adapters, orchestration, worker loop

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod ports;
pub mod services;

pub use crate::error::{GenError, GenResult};
