//! Generation request and per-mode validation

use crate::error::{GenError, GenResult};
use crate::models::{GenerationType, PartialAudioParameters};
use serde::{Deserialize, Serialize};

/// A submitted generation request
///
/// Exactly the text fields relevant to `generation_type` must be populated:
///
/// | mode                    | required fields               |
/// |-------------------------|-------------------------------|
/// | `from_description`      | `full_described_song`         |
/// | `with_custom_lyrics`    | `prompt`, `lyrics`            |
/// | `with_described_lyrics` | `prompt`, `described_lyrics`  |
///
/// The same struct is serialized into the queued job payload, so a worker
/// can be pointed at the original request for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub generation_type: GenerationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub described_lyrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_described_song: Option<String>,
    #[serde(default)]
    pub audio_parameters: PartialAudioParameters,
}

impl GenerationRequest {
    /// Check that the fields required by the generation mode are present and
    /// non-empty. Runs before any persistence or enqueue side effect.
    pub fn validate(&self) -> GenResult<()> {
        match self.generation_type {
            GenerationType::FromDescription => {
                require(&self.full_described_song, "full_described_song")
            }
            GenerationType::WithCustomLyrics => {
                require(&self.prompt, "prompt")?;
                require(&self.lyrics, "lyrics")
            }
            GenerationType::WithDescribedLyrics => {
                require(&self.prompt, "prompt")?;
                require(&self.described_lyrics, "described_lyrics")
            }
        }
    }
}

fn require(field: &Option<String>, name: &str) -> GenResult<()> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(GenError::Validation(format!(
            "missing required field `{name}` for this generation type"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(generation_type: GenerationType) -> GenerationRequest {
        GenerationRequest {
            generation_type,
            prompt: None,
            lyrics: None,
            described_lyrics: None,
            full_described_song: None,
            audio_parameters: PartialAudioParameters::default(),
        }
    }

    #[test]
    fn test_from_description_requires_full_described_song() {
        let mut req = request(GenerationType::FromDescription);
        assert!(req.validate().is_err());

        req.full_described_song = Some("upbeat jazz".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_custom_lyrics_requires_prompt_and_lyrics() {
        let mut req = request(GenerationType::WithCustomLyrics);
        req.prompt = Some("electronic rap".into());
        let err = req.validate().unwrap_err();
        assert!(matches!(err, GenError::Validation(ref msg) if msg.contains("lyrics")));

        req.lyrics = Some("[verse]\nWaves on the bass".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_described_lyrics_requires_prompt_and_description() {
        let mut req = request(GenerationType::WithDescribedLyrics);
        req.described_lyrics = Some("a song about rainy mornings".into());
        assert!(req.validate().is_err());

        req.prompt = Some("lofi hip hop".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_whitespace_only_field_is_rejected() {
        let mut req = request(GenerationType::FromDescription);
        req.full_described_song = Some("   ".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_irrelevant_fields_do_not_satisfy_validation() {
        // Lyrics alone don't make a from_description request valid.
        let mut req = request(GenerationType::FromDescription);
        req.lyrics = Some("[chorus] ...".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"generation_type": "from_description", "full_described_song": "upbeat jazz"}"#,
        )
        .unwrap();
        assert_eq!(req.generation_type, GenerationType::FromDescription);
        assert!(req.audio_parameters.audio_duration.is_none());
        assert!(req.validate().is_ok());
    }
}
