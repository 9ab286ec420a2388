//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable (`SONGFORGE_ROOT`)
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("SONGFORGE_ROOT") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = default_config_file() {
        if let Ok(config) = TomlConfig::load(&config_path) {
            if let Some(root_folder) = config.root_folder {
                return PathBuf::from(root_folder);
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Default configuration file path for the platform
///
/// `~/.config/songforge/config.toml` on Linux (or the platform
/// equivalent via `dirs::config_dir`), falling back to
/// `/etc/songforge/config.toml` when no user config directory exists.
pub fn default_config_file() -> Option<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        let user_config = dir.join("songforge").join("config.toml");
        if user_config.exists() {
            return Some(user_config);
        }
    }
    let system_config = PathBuf::from("/etc/songforge/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }
    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("songforge"))
        .unwrap_or_else(|| PathBuf::from("./songforge"))
}

/// Raw TOML configuration file contents
///
/// All fields are optional; the generation service resolves them against
/// environment variables and built-in defaults (env takes priority, with a
/// warning when a key is set in both places).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and local artifacts
    pub root_folder: Option<String>,

    /// Database file path (defaults to `<root_folder>/songforge.db`)
    pub database_path: Option<String>,

    /// AI generation backend settings
    #[serde(default)]
    pub backend: BackendToml,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageToml,

    /// Worker settings
    #[serde(default)]
    pub worker: WorkerToml,
}

/// `[backend]` section: one endpoint per generation mode plus auth
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendToml {
    pub generate_from_description_url: Option<String>,
    pub generate_with_lyrics_url: Option<String>,
    pub generate_described_lyrics_url: Option<String>,
    pub health_url: Option<String>,
    pub bearer_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[storage]` section: S3-compatible object storage (Cloudflare R2)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageToml {
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub bucket_name: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Stable public base URL; when set, artifact URLs are direct, not signed
    pub public_base_url: Option<String>,
    pub url_expiry_secs: Option<u64>,
}

/// `[worker]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerToml {
    pub poll_interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl TomlConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the config file if one exists, otherwise an empty config
    pub fn load_default() -> Self {
        match default_config_file() {
            Some(path) => match Self::load(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable config file: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            root_folder = "/srv/songforge"
            database_path = "/srv/songforge/db.sqlite"

            [backend]
            generate_from_description_url = "https://backend.example/generate_from_description"
            bearer_token = "secret"
            timeout_secs = 300

            [storage]
            endpoint_url = "https://accountid.r2.cloudflarestorage.com"
            bucket_name = "songforge"
            public_base_url = "https://cdn.example.com"

            [worker]
            poll_interval_ms = 500
            max_attempts = 3
        "#;
        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.root_folder.as_deref(), Some("/srv/songforge"));
        assert_eq!(config.backend.timeout_secs, Some(300));
        assert_eq!(
            config.storage.public_base_url.as_deref(),
            Some("https://cdn.example.com")
        );
        assert_eq!(config.worker.max_attempts, Some(3));
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.root_folder.is_none());
        assert!(config.backend.bearer_token.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root_folder = \"/tmp/sf\"").unwrap();
        let config = TomlConfig::load(file.path()).unwrap();
        assert_eq!(config.root_folder.as_deref(), Some("/tmp/sf"));
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root_folder = [unclosed").unwrap();
        assert!(TomlConfig::load(file.path()).is_err());
    }
}
