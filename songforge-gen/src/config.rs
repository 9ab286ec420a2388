//! Configuration resolution for the generation service
//!
//! Two-tier resolution with ENV → TOML priority: every key can come from the
//! environment (the deployment's native mechanism) or from the config file,
//! with a warning when both are set. Endpoint and credential variable names
//! match the deployment environment (`GENERATE_FROM_DESCRIPTION`, `R2_*`,
//! `API_BEARER_TOKEN`).

use crate::error::{GenError, GenResult};
use songforge_common::config::TomlConfig;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
}

/// AI generation backend: one endpoint per generation mode
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub from_description_url: String,
    pub with_lyrics_url: String,
    pub described_lyrics_url: String,
    /// Unauthenticated health probe, if the deployment exposes one
    pub health_url: Option<String>,
    pub bearer_token: String,
    /// Request timeout; generation is slow, so this is minutes not seconds
    pub timeout_secs: u64,
}

/// S3-compatible object storage (Cloudflare R2 in the reference deployment)
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub region: String,
    pub bucket_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Stable public base URL; when set, artifact URLs are direct, not signed
    pub public_base_url: Option<String>,
    pub url_expiry_secs: u64,
}

/// Worker loop settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

/// Default presigned URL lifetime: 1 hour
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;
/// Default backend request timeout: 10 minutes
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 600;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_REGION: &str = "auto";

impl GenConfig {
    /// Resolve the full configuration from environment variables and the
    /// TOML config, env taking priority.
    pub fn resolve(root_folder: &Path, toml: &TomlConfig) -> GenResult<Self> {
        let database_path = resolve_optional("SONGFORGE_DATABASE_PATH", &toml.database_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| root_folder.join("songforge.db"));

        let backend = BackendConfig {
            from_description_url: resolve_required(
                "GENERATE_FROM_DESCRIPTION",
                &toml.backend.generate_from_description_url,
            )?,
            with_lyrics_url: resolve_required(
                "GENERATE_WITH_LYRICS",
                &toml.backend.generate_with_lyrics_url,
            )?,
            described_lyrics_url: resolve_required(
                "GENERATE_FROM_DESCRIBED_LYRICS",
                &toml.backend.generate_described_lyrics_url,
            )?,
            health_url: resolve_optional("SONGFORGE_BACKEND_HEALTH_URL", &toml.backend.health_url),
            bearer_token: resolve_required("API_BEARER_TOKEN", &toml.backend.bearer_token)?,
            timeout_secs: toml
                .backend
                .timeout_secs
                .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS),
        };

        let storage = StorageConfig {
            endpoint_url: resolve_required("R2_ENDPOINT_URL", &toml.storage.endpoint_url)?,
            region: resolve_optional("R2_REGION", &toml.storage.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket_name: resolve_required("R2_BUCKET_NAME", &toml.storage.bucket_name)?,
            access_key_id: resolve_required("R2_ACCESS_KEY_ID", &toml.storage.access_key_id)?,
            secret_access_key: resolve_required(
                "R2_SECRET_ACCESS_KEY",
                &toml.storage.secret_access_key,
            )?,
            public_base_url: resolve_optional("R2_CUSTOM_DOMAIN", &toml.storage.public_base_url),
            url_expiry_secs: toml
                .storage
                .url_expiry_secs
                .unwrap_or(DEFAULT_URL_EXPIRY_SECS),
        };

        let worker = WorkerConfig {
            poll_interval_ms: toml
                .worker
                .poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: toml.worker.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        };

        Ok(Self {
            database_path,
            backend,
            storage,
            worker,
        })
    }
}

/// Env value if set and non-empty, else the TOML value
fn resolve_optional(env_name: &str, toml_value: &Option<String>) -> Option<String> {
    let env_value = std::env::var(env_name).ok().filter(|v| !v.is_empty());
    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} set in both environment and config file; using environment",
            env_name
        );
    }
    env_value.or_else(|| toml_value.clone())
}

fn resolve_required(env_name: &str, toml_value: &Option<String>) -> GenResult<String> {
    resolve_optional(env_name, toml_value).ok_or_else(|| {
        GenError::Common(songforge_common::Error::Config(format!(
            "{env_name} not configured (set the environment variable or the config file key)"
        )))
    })
}
