//! Service layer: port adapters for the external systems and the
//! orchestration service composing them.

pub mod music_client;
pub mod orchestrator;
pub mod storage;
pub mod worker;

pub use music_client::HttpMusicBackend;
pub use orchestrator::{PlaybackUrls, SongService};
pub use storage::R2ArtifactStore;
pub use worker::GenerationWorker;
