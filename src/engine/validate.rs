//! Configuration errors and the pre-encode consistency check.

use crate::engine::core::{AudioCodec, EncodeKind, OptionsModel, PassMode, RateControl};
use std::path::PathBuf;
use thiserror::Error;

/// A choice the caller must correct before anything is handed to the encoder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown container '{0}'")]
    UnknownContainer(String),

    #[error("audio codec '{codec}' cannot be muxed into '{container}'")]
    IncompatibleAudio { codec: AudioCodec, container: String },

    #[error("required field '{0}' is empty")]
    MissingField(&'static str),

    #[error("'{0}' does not re-encode video; bitrate and CRF are unavailable")]
    RateControlUnavailable(String),

    #[error("encoder '{0}' has no CRF mode; set a bitrate instead")]
    CrfUnsupported(String),

    #[error("CRF {value} out of range {min}-{max} for encoder '{codec}'")]
    CrfOutOfRange {
        value: u32,
        min: u32,
        max: u32,
        codec: String,
    },

    #[error("video bitrate must be greater than zero")]
    InvalidBitrate,

    #[error("two-pass encoding is unavailable for '{0}'")]
    TwoPassUnavailable(String),

    #[error("two-pass encoding needs a bitrate or CRF value")]
    TwoPassNeedsRateControl,

    #[error("{option} '{value}' is not supported by encoder '{codec}'")]
    UnsupportedOption {
        option: &'static str,
        value: String,
        codec: String,
    },

    #[error("audio {parameter} cannot be set when the audio codec is '{codec}'")]
    AudioParameterUnavailable {
        parameter: &'static str,
        codec: AudioCodec,
    },

    #[error("audio normalization needs a re-encoded audio stream (audio codec is '{0}')")]
    NormalizationUnavailable(AudioCodec),

    #[error("normalization target {0} dB is out of range")]
    InvalidThreshold(f64),

    #[error("audio normalization is enabled but the volume analysis has not been run")]
    AnalysisMissing,

    #[error("the file set or target changed since the volume analysis; run it again")]
    AnalysisStale,

    #[error("invalid filter {0}")]
    InvalidFilter(String),

    #[error("invalid {field} '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("output extension '{0}' is not available for this container")]
    ExtensionUnavailable(String),

    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),
}

/// Check that the model can be compiled for the given file set.
///
/// Setters keep most invariants, but a snapshot may come from deserialized
/// input, so everything the synthesizer relies on is re-checked here.
pub fn validate_for_encode(options: &OptionsModel, files: &[PathBuf]) -> Result<(), ConfigError> {
    validate_structure(options)?;

    let norm = options.normalization();
    if norm.mode.needs_analysis() {
        let cache = options.analysis().ok_or(ConfigError::AnalysisMissing)?;
        if !cache.is_current_for(files, norm) {
            return Err(ConfigError::AnalysisStale);
        }
    }
    Ok(())
}

/// Everything [`validate_for_encode`] checks except analysis freshness.
pub fn validate_structure(options: &OptionsModel) -> Result<(), ConfigError> {
    let spec = options
        .container_spec()
        .ok_or_else(|| ConfigError::UnknownContainer(options.container_id().to_string()))?;

    if options.output_extension().is_empty() {
        return Err(ConfigError::MissingField("output extension"));
    }
    if spec.kind != EncodeKind::SaveImages && options.video_codec().is_empty() {
        return Err(ConfigError::MissingField("video codec"));
    }

    let audio = options.audio().codec;
    if spec.kind != EncodeKind::SaveImages
        && !options.offered_audio_codecs().contains(&audio)
    {
        return Err(ConfigError::IncompatibleAudio {
            codec: audio,
            container: options.output_extension().to_string(),
        });
    }

    if spec.kind != EncodeKind::Transcode && options.rate_control() != RateControl::Auto {
        return Err(ConfigError::RateControlUnavailable(spec.id.to_string()));
    }
    if let RateControl::Crf(value) = options.rate_control() {
        check_crf(options.video_codec(), value)?;
    }

    if options.pass_mode() == PassMode::TwoPass {
        if spec.kind != EncodeKind::Transcode {
            return Err(ConfigError::TwoPassUnavailable(spec.id.to_string()));
        }
        if options.rate_control() == RateControl::Auto {
            return Err(ConfigError::TwoPassNeedsRateControl);
        }
    }

    let norm = options.normalization();
    if norm.mode.is_enabled() {
        if spec.kind == EncodeKind::SaveImages || !audio.is_filterable() {
            return Err(ConfigError::NormalizationUnavailable(audio));
        }
    }

    Ok(())
}

pub(crate) fn check_crf(codec: &str, value: u32) -> Result<(), ConfigError> {
    let caps = crate::engine::core::codec_caps(codec)
        .ok_or_else(|| ConfigError::CrfUnsupported(codec.to_string()))?;
    let (min, max) = caps
        .crf_range
        .ok_or_else(|| ConfigError::CrfUnsupported(codec.to_string()))?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::CrfOutOfRange {
            value,
            min,
            max,
            codec: codec.to_string(),
        });
    }
    Ok(())
}
