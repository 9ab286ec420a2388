//! Audio generation parameters value object

use serde::{Deserialize, Serialize};

/// Default audio duration in seconds
pub const DEFAULT_AUDIO_DURATION: f64 = 180.0;
/// Seed value meaning "let the backend pick a random seed"
pub const DEFAULT_SEED: i64 = -1;
/// Default classifier-free guidance scale
pub const DEFAULT_GUIDANCE_SCALE: f64 = 15.0;
/// Default number of inference steps
pub const DEFAULT_INFER_STEP: i64 = 60;

/// Immutable audio generation parameters
///
/// Constructed once via [`AudioParameters::from_partial`]; any change means
/// building a new value. Values are passed through to the backend without
/// range validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParameters {
    /// Requested audio duration in seconds
    pub audio_duration: f64,
    /// Generation seed; -1 means random
    pub seed: i64,
    /// Classifier-free guidance scale
    pub guidance_scale: f64,
    /// Diffusion inference steps
    pub infer_step: i64,
    /// Generate instrumental audio (no lyrics)
    pub instrumental: bool,
}

impl Default for AudioParameters {
    fn default() -> Self {
        Self {
            audio_duration: DEFAULT_AUDIO_DURATION,
            seed: DEFAULT_SEED,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            infer_step: DEFAULT_INFER_STEP,
            instrumental: false,
        }
    }
}

/// Caller-supplied subset of [`AudioParameters`]
///
/// Every field is optional; absent fields take the documented defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialAudioParameters {
    pub audio_duration: Option<f64>,
    pub seed: Option<i64>,
    pub guidance_scale: Option<f64>,
    pub infer_step: Option<i64>,
    pub instrumental: Option<bool>,
}

impl AudioParameters {
    /// Fill absent fields with defaults. Never fails.
    pub fn from_partial(partial: &PartialAudioParameters) -> Self {
        let defaults = Self::default();
        Self {
            audio_duration: partial.audio_duration.unwrap_or(defaults.audio_duration),
            seed: partial.seed.unwrap_or(defaults.seed),
            guidance_scale: partial.guidance_scale.unwrap_or(defaults.guidance_scale),
            infer_step: partial.infer_step.unwrap_or(defaults.infer_step),
            instrumental: partial.instrumental.unwrap_or(defaults.instrumental),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_partial_empty_yields_all_defaults() {
        let params = AudioParameters::from_partial(&PartialAudioParameters::default());
        assert_eq!(params.audio_duration, 180.0);
        assert_eq!(params.seed, -1);
        assert_eq!(params.guidance_scale, 15.0);
        assert_eq!(params.infer_step, 60);
        assert!(!params.instrumental);
    }

    #[test]
    fn test_from_partial_keeps_supplied_values() {
        let partial = PartialAudioParameters {
            audio_duration: Some(30.0),
            instrumental: Some(true),
            ..Default::default()
        };
        let params = AudioParameters::from_partial(&partial);
        assert_eq!(params.audio_duration, 30.0);
        assert!(params.instrumental);
        // Untouched fields still take defaults
        assert_eq!(params.seed, -1);
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        // Range validation is a backend concern; the value object is permissive.
        let partial = PartialAudioParameters {
            audio_duration: Some(-5.0),
            infer_step: Some(0),
            ..Default::default()
        };
        let params = AudioParameters::from_partial(&partial);
        assert_eq!(params.audio_duration, -5.0);
        assert_eq!(params.infer_step, 0);
    }
}
