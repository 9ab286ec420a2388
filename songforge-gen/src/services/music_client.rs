//! HTTP client for the AI music generation backend
//!
//! The backend exposes one endpoint per generation mode, each taking a JSON
//! body of the shared audio parameters plus the mode's text fields, guarded
//! by a bearer token. One synchronous request/response per song; the
//! configured client timeout bounds the exchange.

use crate::config::BackendConfig;
use crate::error::{GenError, GenResult};
use crate::models::{GenerationType, Song};
use crate::ports::{GeneratedSong, MusicBackend};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};

/// Backend response for a finished generation
#[derive(Debug, Clone, Deserialize)]
struct GenerateMusicResponse {
    r2_key: String,
    cover_image_r2_key: String,
    categories: Vec<String>,
}

/// `MusicBackend` adapter over HTTP
pub struct HttpMusicBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpMusicBackend {
    pub fn new(config: BackendConfig) -> GenResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Endpoint for a generation mode
    fn endpoint(&self, generation_type: GenerationType) -> &str {
        match generation_type {
            GenerationType::FromDescription => &self.config.from_description_url,
            GenerationType::WithCustomLyrics => &self.config.with_lyrics_url,
            GenerationType::WithDescribedLyrics => &self.config.described_lyrics_url,
        }
    }

    /// Shape the outbound payload for a song.
    ///
    /// Shared audio parameters always; beyond those, exactly the fields the
    /// song's generation mode requires:
    ///
    /// | mode                    | extra fields                 |
    /// |-------------------------|------------------------------|
    /// | `from_description`      | `full_described_song`        |
    /// | `with_custom_lyrics`    | `prompt`, `lyrics`           |
    /// | `with_described_lyrics` | `prompt`, `described_lyrics` |
    fn build_payload(song: &Song) -> GenResult<serde_json::Value> {
        let params = &song.audio_parameters;
        let mut payload = json!({
            "audio_duration": params.audio_duration,
            "seed": params.seed,
            "guidance_scale": params.guidance_scale,
            "infer_step": params.infer_step,
            "instrumental": params.instrumental,
        });

        match song.generation_type {
            GenerationType::FromDescription => {
                payload["full_described_song"] =
                    required_field(song, &song.full_described_song, "full_described_song")?;
            }
            GenerationType::WithCustomLyrics => {
                payload["prompt"] = required_field(song, &song.prompt, "prompt")?;
                payload["lyrics"] = required_field(song, &song.lyrics, "lyrics")?;
            }
            GenerationType::WithDescribedLyrics => {
                payload["prompt"] = required_field(song, &song.prompt, "prompt")?;
                payload["described_lyrics"] =
                    required_field(song, &song.described_lyrics, "described_lyrics")?;
            }
        }

        Ok(payload)
    }

    /// Probe the backend's unauthenticated health endpoint.
    ///
    /// Only meaningful when a health URL is configured; used at worker
    /// startup to log reachability.
    pub async fn health(&self) -> GenResult<()> {
        let Some(url) = &self.config.health_url else {
            return Ok(());
        };
        let response = self.client.get(url).send().await?;
        if response.status().is_success() {
            info!("Generation backend healthy");
            Ok(())
        } else {
            Err(GenError::Backend {
                status: Some(response.status().as_u16()),
                message: "health check failed".into(),
            })
        }
    }
}

fn required_field(
    song: &Song,
    field: &Option<String>,
    name: &str,
) -> GenResult<serde_json::Value> {
    match field {
        Some(value) => Ok(json!(value)),
        None => Err(GenError::Validation(format!(
            "song {} is missing `{name}` required by mode {}",
            song.id, song.generation_type
        ))),
    }
}

#[async_trait]
impl MusicBackend for HttpMusicBackend {
    async fn generate_music(&self, song: &Song) -> GenResult<GeneratedSong> {
        let endpoint = self.endpoint(song.generation_type);
        let payload = Self::build_payload(song)?;

        debug!(song_id = %song.id, mode = %song.generation_type, endpoint, "Calling generation backend");

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.bearer_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".into());
            error!(song_id = %song.id, status = status.as_u16(), "Generation backend error: {}", body);
            return Err(GenError::Backend {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed: GenerateMusicResponse = response.json().await?;
        info!(
            song_id = %song.id,
            audio_key = %parsed.r2_key,
            categories = parsed.categories.len(),
            "Generation backend finished"
        );

        Ok(GeneratedSong {
            audio_key: parsed.r2_key,
            cover_image_key: parsed.cover_image_r2_key,
            categories: parsed.categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioParameters, SongStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn song(generation_type: GenerationType) -> Song {
        Song {
            id: Uuid::new_v4(),
            status: SongStatus::Processing,
            generation_type,
            prompt: Some("electronic rap".into()),
            lyrics: Some("[verse]\nWaves on the bass".into()),
            described_lyrics: Some("a song about circuits".into()),
            full_described_song: Some("upbeat jazz".into()),
            audio_key: None,
            cover_image_key: None,
            categories: vec![],
            user_id: "user-1".into(),
            audio_parameters: AudioParameters::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sorted_keys(payload: &serde_json::Value) -> Vec<String> {
        let mut keys: Vec<String> = payload.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_from_description_payload_has_exact_fields() {
        let payload =
            HttpMusicBackend::build_payload(&song(GenerationType::FromDescription)).unwrap();
        assert_eq!(
            sorted_keys(&payload),
            vec![
                "audio_duration",
                "full_described_song",
                "guidance_scale",
                "infer_step",
                "instrumental",
                "seed",
            ]
        );
        assert_eq!(payload["full_described_song"], "upbeat jazz");
        assert_eq!(payload["audio_duration"], 180.0);
        assert_eq!(payload["seed"], -1);
    }

    #[test]
    fn test_custom_lyrics_payload_has_exact_fields() {
        let payload =
            HttpMusicBackend::build_payload(&song(GenerationType::WithCustomLyrics)).unwrap();
        assert_eq!(
            sorted_keys(&payload),
            vec![
                "audio_duration",
                "guidance_scale",
                "infer_step",
                "instrumental",
                "lyrics",
                "prompt",
                "seed",
            ]
        );
        // No leakage of the other modes' fields
        assert!(payload.get("full_described_song").is_none());
        assert!(payload.get("described_lyrics").is_none());
    }

    #[test]
    fn test_described_lyrics_payload_has_exact_fields() {
        let payload =
            HttpMusicBackend::build_payload(&song(GenerationType::WithDescribedLyrics)).unwrap();
        assert_eq!(
            sorted_keys(&payload),
            vec![
                "audio_duration",
                "described_lyrics",
                "guidance_scale",
                "infer_step",
                "instrumental",
                "prompt",
                "seed",
            ]
        );
        assert_eq!(payload["described_lyrics"], "a song about circuits");
    }

    #[test]
    fn test_missing_mode_field_fails_before_any_network_call() {
        let mut s = song(GenerationType::FromDescription);
        s.full_described_song = None;
        let err = HttpMusicBackend::build_payload(&s).unwrap_err();
        assert!(matches!(err, GenError::Validation(_)));
    }

    #[test]
    fn test_endpoint_dispatch_per_mode() {
        let backend = HttpMusicBackend::new(BackendConfig {
            from_description_url: "https://backend.example/fd".into(),
            with_lyrics_url: "https://backend.example/wl".into(),
            described_lyrics_url: "https://backend.example/dl".into(),
            health_url: None,
            bearer_token: "secret".into(),
            timeout_secs: 30,
        })
        .unwrap();

        assert_eq!(
            backend.endpoint(GenerationType::FromDescription),
            "https://backend.example/fd"
        );
        assert_eq!(
            backend.endpoint(GenerationType::WithCustomLyrics),
            "https://backend.example/wl"
        );
        assert_eq!(
            backend.endpoint(GenerationType::WithDescribedLyrics),
            "https://backend.example/dl"
        );
    }

    #[test]
    fn test_response_field_names_match_backend_wire_format() {
        let parsed: GenerateMusicResponse = serde_json::from_str(
            r#"{"r2_key": "a/1.wav", "cover_image_r2_key": "c/1.png", "categories": ["jazz"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.r2_key, "a/1.wav");
        assert_eq!(parsed.cover_image_r2_key, "c/1.png");
        assert_eq!(parsed.categories, vec!["jazz"]);
    }
}
