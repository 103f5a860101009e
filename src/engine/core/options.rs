//! The encoding options model.
//!
//! All fields are private; every mutation goes through a named setter that
//! keeps the model consistent (container resets, audio compatibility,
//! bitrate/CRF exclusivity, single deinterlace-or-interlace slot).

use super::filters::{
    Crop, Deinterlacer, Denoise, Interlace, Lacing, Rotation, Scale, VideoFilters, valid_ratio,
};
use super::formats::{
    AudioCodec, COPY_EXTENSIONS, ContainerSpec, EncodeKind, audio_codecs_for, codec_caps,
    container_spec,
};
use crate::engine::analyze::NormalizationCache;
use crate::engine::validate::{ConfigError, check_crf, validate_for_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_CONTAINER: &str = "MKV (h264)";

pub const LOG_LEVELS: &[&str] = &[
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PassMode {
    #[default]
    OnePass,
    TwoPass,
}

/// Bitrate and CRF share one slot, so setting one always clears the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateControl {
    /// Encoder default
    #[default]
    Auto,
    /// Target bitrate in kbit/s
    Bitrate(u32),
    Crf(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreamMap {
    /// No `-map`: FFmpeg picks one stream per type
    #[default]
    Auto,
    /// `-map 0`: every stream of the input
    All,
    /// Video plus one audio track (zero-based index)
    AudioTrack(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    S16,
    S24,
    S32,
}

impl BitDepth {
    pub fn label(self) -> &'static str {
        match self {
            BitDepth::S16 => "16 bit",
            BitDepth::S24 => "24 bit",
            BitDepth::S32 => "32 bit",
        }
    }

    /// Encoder name for PCM output at this depth
    pub fn pcm_encoder(self) -> &'static str {
        match self {
            BitDepth::S16 => "pcm_s16le",
            BitDepth::S24 => "pcm_s24le",
            BitDepth::S32 => "pcm_s32le",
        }
    }

    /// `-sample_fmt` value for the given lossless codec
    pub fn sample_fmt(self, codec: AudioCodec) -> Option<&'static str> {
        match (codec, self) {
            (AudioCodec::Flac, BitDepth::S16) => Some("s16"),
            (AudioCodec::Flac, _) => Some("s32"),
            (AudioCodec::Alac, BitDepth::S16) => Some("s16p"),
            (AudioCodec::Alac, _) => Some("s32p"),
            _ => None,
        }
    }
}

impl FromStr for BitDepth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("bit").trim() {
            "16" | "s16" => Ok(BitDepth::S16),
            "24" | "s24" => Ok(BitDepth::S24),
            "32" | "s32" => Ok(BitDepth::S32),
            _ => Err(ConfigError::InvalidValue {
                field: "bit depth",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioSettings {
    pub codec: AudioCodec,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bit_depth: Option<BitDepth>,
}

impl AudioSettings {
    fn clear_parameters(&mut self) {
        self.bitrate_kbps = None;
        self.sample_rate = None;
        self.channels = None;
        self.bit_depth = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationMode {
    #[default]
    Off,
    /// Raise the peak level up to the target (volumedetect max_volume)
    Peak,
    /// Raise the mean level up to the target (volumedetect mean_volume)
    Rms,
    /// EBU R128 loudness filter, no pre-analysis
    Ebu,
}

impl NormalizationMode {
    pub fn is_enabled(self) -> bool {
        self != NormalizationMode::Off
    }

    pub fn needs_analysis(self) -> bool {
        matches!(self, NormalizationMode::Peak | NormalizationMode::Rms)
    }

    pub fn default_target(self) -> f64 {
        match self {
            NormalizationMode::Off | NormalizationMode::Peak => -1.0,
            NormalizationMode::Rms => -20.0,
            NormalizationMode::Ebu => -16.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mode: NormalizationMode,
    /// dBFS for peak/RMS, LUFS for EBU
    pub target_db: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mode: NormalizationMode::Off,
            target_db: NormalizationMode::Off.default_target(),
        }
    }
}

pub const EBU_TRUE_PEAK: f64 = -1.5;
pub const EBU_LOUDNESS_RANGE: f64 = 11.0;

/// Section of the input to encode, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_s: f64,
    pub duration_s: f64,
}

impl TimeRange {
    pub fn new(start_s: f64, duration_s: f64) -> Result<Self, ConfigError> {
        if !start_s.is_finite() || start_s < 0.0 {
            return Err(ConfigError::InvalidTimeRange(format!("start {start_s}")));
        }
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(ConfigError::InvalidTimeRange(format!(
                "duration {duration_s}"
            )));
        }
        Ok(Self {
            start_s,
            duration_s,
        })
    }

    pub fn end_s(&self) -> f64 {
        self.start_s + self.duration_s
    }
}

/// Parse `HH:MM:SS[.fff]`, `MM:SS[.fff]` or plain seconds.
pub fn parse_timestamp(s: &str) -> Result<f64, ConfigError> {
    let bad = || ConfigError::InvalidTimeRange(format!("timestamp '{s}'"));
    let mut total = 0.0;
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(bad());
    }
    for (idx, part) in parts.iter().enumerate() {
        let value: f64 = part.parse().map_err(|_| bad())?;
        let is_last = idx + 1 == parts.len();
        if value < 0.0 || (!is_last && value.fract() != 0.0) {
            return Err(bad());
        }
        total = total * 60.0 + value;
    }
    Ok(total)
}

pub fn format_timestamp(seconds: f64) -> String {
    let millis_total = (seconds * 1000.0).round() as u64;
    let millis = millis_total % 1000;
    let secs = millis_total / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis
    )
}

impl FromStr for TimeRange {
    type Err = ConfigError;

    /// Parses the `-ss <start> -t <duration>` form produced by timeline widgets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let mut start = None;
        let mut duration = None;
        let mut iter = tokens.iter();
        while let Some(tok) = iter.next() {
            let value = iter
                .next()
                .ok_or_else(|| ConfigError::InvalidTimeRange(s.to_string()))?;
            match *tok {
                "-ss" => start = Some(parse_timestamp(value)?),
                "-t" => duration = Some(parse_timestamp(value)?),
                _ => return Err(ConfigError::InvalidTimeRange(s.to_string())),
            }
        }
        match duration {
            Some(d) => TimeRange::new(start.unwrap_or(0.0), d),
            None => Err(ConfigError::InvalidTimeRange(s.to_string())),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-ss {} -t {}",
            format_timestamp(self.start_s),
            format_timestamp(self.duration_s)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsModel {
    container_id: String,
    video_codec: String,
    output_extension: String,
    pass_mode: PassMode,
    rate_control: RateControl,
    preset: Option<String>,
    profile: Option<String>,
    tune: Option<String>,
    pixel_format: Option<String>,
    aspect: Option<String>,
    frame_rate: Option<String>,
    filters: VideoFilters,
    audio: AudioSettings,
    normalization: Normalization,
    threads: Option<u32>,
    cpu_used: Option<i32>,
    stream_map: StreamMap,
    time_range: Option<TimeRange>,
    overwrite: bool,
    loglevel: String,

    #[serde(skip)]
    analysis: Option<NormalizationCache>,
}

impl Default for OptionsModel {
    fn default() -> Self {
        let mut model = Self {
            container_id: String::new(),
            video_codec: String::new(),
            output_extension: String::new(),
            pass_mode: PassMode::OnePass,
            rate_control: RateControl::Auto,
            preset: None,
            profile: None,
            tune: None,
            pixel_format: None,
            aspect: None,
            frame_rate: None,
            filters: VideoFilters::default(),
            audio: AudioSettings::default(),
            normalization: Normalization::default(),
            threads: None,
            cpu_used: None,
            stream_map: StreamMap::Auto,
            time_range: None,
            overwrite: false,
            loglevel: "warning".to_string(),
            analysis: None,
        };
        if let Some(spec) = container_spec(DEFAULT_CONTAINER) {
            model.apply_container(spec);
        }
        model
    }
}

impl OptionsModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- container / video codec -------------------------------------------

    /// Switch container/codec pair and reset everything tied to the old encoder.
    pub fn set_container(&mut self, id: &str) -> Result<(), ConfigError> {
        let spec =
            container_spec(id).ok_or_else(|| ConfigError::UnknownContainer(id.to_string()))?;
        self.apply_container(spec);
        Ok(())
    }

    fn apply_container(&mut self, spec: &'static ContainerSpec) {
        debug!(container = spec.id, codec = spec.video_codec, "container selected");
        self.container_id = spec.id.to_string();
        self.video_codec = spec.video_codec.to_string();
        self.output_extension = spec.extension.to_string();

        self.rate_control = RateControl::Auto;
        self.preset = None;
        self.profile = None;
        self.tune = None;
        self.cpu_used = None;

        if spec.kind != EncodeKind::Transcode {
            self.pass_mode = PassMode::OnePass;
        }
        if spec.kind == EncodeKind::SaveImages {
            self.audio = AudioSettings::default();
            self.normalization.mode = NormalizationMode::Off;
        }
        self.reapply_audio_compatibility();
        self.analysis = None;
    }

    /// Reset the audio codec if the current output container cannot carry it.
    fn reapply_audio_compatibility(&mut self) {
        let offered = self.offered_audio_codecs();
        if !offered.is_empty() && !offered.contains(&self.audio.codec) {
            info!(
                codec = %self.audio.codec,
                container = %self.output_extension,
                "audio codec not supported by container, reset to Default"
            );
            self.audio = AudioSettings::default();
        }
    }

    /// Pick the output wrapper in stream-copy mode.
    pub fn set_output_extension(&mut self, extension: &str) -> Result<(), ConfigError> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if self.kind() != EncodeKind::StreamCopy || !COPY_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ConfigError::ExtensionUnavailable(ext));
        }
        self.output_extension = ext;
        self.reapply_audio_compatibility();
        Ok(())
    }

    fn require_transcode(&self) -> Result<(), ConfigError> {
        if self.kind() == EncodeKind::Transcode {
            Ok(())
        } else {
            Err(ConfigError::RateControlUnavailable(self.container_id.clone()))
        }
    }

    /// Target bitrate in kbit/s; clears any CRF value.
    pub fn set_bitrate(&mut self, kbps: u32) -> Result<(), ConfigError> {
        self.require_transcode()?;
        if kbps == 0 {
            return Err(ConfigError::InvalidBitrate);
        }
        self.rate_control = RateControl::Bitrate(kbps);
        Ok(())
    }

    /// Constant rate factor; clears any bitrate value.
    pub fn set_crf(&mut self, crf: u32) -> Result<(), ConfigError> {
        self.require_transcode()?;
        check_crf(&self.video_codec, crf)?;
        self.rate_control = RateControl::Crf(crf);
        Ok(())
    }

    pub fn clear_rate_control(&mut self) {
        self.rate_control = RateControl::Auto;
    }

    pub fn set_pass_mode(&mut self, mode: PassMode) -> Result<(), ConfigError> {
        if mode == PassMode::TwoPass && self.kind() != EncodeKind::Transcode {
            return Err(ConfigError::TwoPassUnavailable(self.container_id.clone()));
        }
        self.pass_mode = mode;
        Ok(())
    }

    fn checked_codec_option(
        &self,
        option: &'static str,
        value: Option<&str>,
        allowed: fn(&super::formats::CodecCaps) -> &'static [&'static str],
    ) -> Result<Option<String>, ConfigError> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let supported = codec_caps(&self.video_codec)
            .map(|caps| allowed(caps).contains(&value))
            .unwrap_or(false);
        if !supported {
            return Err(ConfigError::UnsupportedOption {
                option,
                value: value.to_string(),
                codec: self.video_codec.clone(),
            });
        }
        Ok(Some(value.to_string()))
    }

    pub fn set_preset(&mut self, preset: Option<&str>) -> Result<(), ConfigError> {
        self.preset = self.checked_codec_option("preset", preset, |c| c.presets)?;
        Ok(())
    }

    pub fn set_profile(&mut self, profile: Option<&str>) -> Result<(), ConfigError> {
        self.profile = self.checked_codec_option("profile", profile, |c| c.profiles)?;
        Ok(())
    }

    pub fn set_tune(&mut self, tune: Option<&str>) -> Result<(), ConfigError> {
        self.tune = self.checked_codec_option("tune", tune, |c| c.tunes)?;
        Ok(())
    }

    pub fn set_pixel_format(&mut self, pix_fmt: Option<&str>) {
        self.pixel_format = pix_fmt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
    }

    pub fn set_aspect(&mut self, aspect: Option<&str>) -> Result<(), ConfigError> {
        self.aspect = match aspect.map(str::trim).filter(|a| !a.is_empty()) {
            Some(a) if valid_ratio(a) => Some(a.to_string()),
            Some(a) => {
                return Err(ConfigError::InvalidValue {
                    field: "aspect",
                    value: a.to_string(),
                });
            }
            None => None,
        };
        Ok(())
    }

    /// Output frame rate, e.g. `25` or `30000/1001`.
    pub fn set_frame_rate(&mut self, rate: Option<&str>) -> Result<(), ConfigError> {
        self.frame_rate = match rate.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) if valid_ratio(r) && !r.contains(':') => Some(r.to_string()),
            Some(r) => {
                return Err(ConfigError::InvalidValue {
                    field: "frame rate",
                    value: r.to_string(),
                });
            }
            None => None,
        };
        Ok(())
    }

    // ---- filters -----------------------------------------------------------

    pub fn set_crop(&mut self, crop: Option<Crop>) {
        self.filters.crop = crop;
    }

    pub fn set_scale(&mut self, scale: Option<Scale>) -> Result<(), ConfigError> {
        if let Some(s) = &scale {
            if s.is_empty() {
                return Err(ConfigError::InvalidFilter("scale: no size or ratio".to_string()));
            }
        }
        self.filters.scale = scale;
        Ok(())
    }

    pub fn set_rotation(&mut self, rotation: Option<Rotation>) {
        self.filters.rotation = rotation;
    }

    /// Replaces any interlace setting.
    pub fn set_deinterlace(&mut self, deinterlacer: Deinterlacer) {
        self.filters.lacing = Some(Lacing::Deinterlace(deinterlacer));
    }

    /// Replaces any deinterlace setting.
    pub fn set_interlace(&mut self, interlace: Interlace) {
        self.filters.lacing = Some(Lacing::Interlace(interlace));
    }

    pub fn clear_lacing(&mut self) {
        self.filters.lacing = None;
    }

    pub fn set_denoise(&mut self, denoise: Option<Denoise>) {
        self.filters.denoise = denoise;
    }

    // ---- audio -------------------------------------------------------------

    pub fn set_audio_codec(&mut self, codec: AudioCodec) -> Result<(), ConfigError> {
        if !self.offered_audio_codecs().contains(&codec) {
            return Err(ConfigError::IncompatibleAudio {
                codec,
                container: self.output_extension.clone(),
            });
        }
        let previous = self.audio.codec;
        self.audio.codec = codec;
        if !codec.accepts_parameters() || codec.is_lossless() != previous.is_lossless() {
            self.audio.clear_parameters();
        }
        if !codec.is_filterable() && self.normalization.mode.is_enabled() {
            info!(codec = %codec, "audio is not re-encoded, normalization disabled");
            self.normalization.mode = NormalizationMode::Off;
            self.analysis = None;
        }
        Ok(())
    }

    fn require_audio_parameters(&self, parameter: &'static str) -> Result<(), ConfigError> {
        if self.audio.codec.accepts_parameters() {
            Ok(())
        } else {
            Err(ConfigError::AudioParameterUnavailable {
                parameter,
                codec: self.audio.codec,
            })
        }
    }

    pub fn set_audio_bitrate(&mut self, kbps: Option<u32>) -> Result<(), ConfigError> {
        if let Some(kbps) = kbps {
            self.require_audio_parameters("bitrate")?;
            if self.audio.codec.is_lossless() {
                return Err(ConfigError::AudioParameterUnavailable {
                    parameter: "bitrate",
                    codec: self.audio.codec,
                });
            }
            if kbps == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "audio bitrate",
                    value: kbps.to_string(),
                });
            }
        }
        self.audio.bitrate_kbps = kbps;
        Ok(())
    }

    pub fn set_audio_rate(&mut self, hz: Option<u32>) -> Result<(), ConfigError> {
        if let Some(hz) = hz {
            self.require_audio_parameters("sample rate")?;
            if !(8_000..=192_000).contains(&hz) {
                return Err(ConfigError::InvalidValue {
                    field: "audio sample rate",
                    value: hz.to_string(),
                });
            }
        }
        self.audio.sample_rate = hz;
        Ok(())
    }

    pub fn set_audio_channels(&mut self, channels: Option<u8>) -> Result<(), ConfigError> {
        if let Some(ch) = channels {
            self.require_audio_parameters("channels")?;
            if !(1..=8).contains(&ch) {
                return Err(ConfigError::InvalidValue {
                    field: "audio channels",
                    value: ch.to_string(),
                });
            }
        }
        self.audio.channels = channels;
        Ok(())
    }

    pub fn set_audio_bit_depth(&mut self, depth: Option<BitDepth>) -> Result<(), ConfigError> {
        if depth.is_some() && !self.audio.codec.is_lossless() {
            return Err(ConfigError::AudioParameterUnavailable {
                parameter: "bit depth",
                codec: self.audio.codec,
            });
        }
        self.audio.bit_depth = depth;
        Ok(())
    }

    /// Changing mode or target drops any cached analysis.
    pub fn set_normalization(
        &mut self,
        mode: NormalizationMode,
        target_db: f64,
    ) -> Result<(), ConfigError> {
        if mode.is_enabled() {
            if self.kind() == EncodeKind::SaveImages || !self.audio.codec.is_filterable() {
                return Err(ConfigError::NormalizationUnavailable(self.audio.codec));
            }
            let range = if mode == NormalizationMode::Ebu {
                -70.0..=-5.0
            } else {
                -99.0..=0.0
            };
            if !target_db.is_finite() || !range.contains(&target_db) {
                return Err(ConfigError::InvalidThreshold(target_db));
            }
        }
        let changed = self.normalization.mode != mode || self.normalization.target_db != target_db;
        self.normalization = Normalization { mode, target_db };
        if changed {
            self.analysis = None;
        }
        Ok(())
    }

    /// Attach the result of a volume analysis run.
    pub fn set_analysis(&mut self, cache: NormalizationCache) {
        self.analysis = Some(cache);
    }

    pub fn clear_analysis(&mut self) {
        self.analysis = None;
    }

    // ---- misc --------------------------------------------------------------

    pub fn set_threads(&mut self, threads: Option<u32>) {
        self.threads = threads.filter(|t| *t > 0);
    }

    pub fn set_cpu_used(&mut self, cpu_used: Option<i32>) -> Result<(), ConfigError> {
        if let Some(value) = cpu_used {
            let supported = codec_caps(&self.video_codec).is_some_and(|c| c.supports_cpu_used);
            if !supported {
                return Err(ConfigError::UnsupportedOption {
                    option: "cpu-used",
                    value: value.to_string(),
                    codec: self.video_codec.clone(),
                });
            }
            if !(-8..=8).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: "cpu-used",
                    value: value.to_string(),
                });
            }
        }
        self.cpu_used = cpu_used;
        Ok(())
    }

    pub fn set_stream_map(&mut self, map: StreamMap) {
        self.stream_map = map;
    }

    pub fn set_time_range(&mut self, range: Option<TimeRange>) {
        self.time_range = range;
    }

    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.overwrite = overwrite;
    }

    pub fn set_loglevel(&mut self, level: &str) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&level) {
            return Err(ConfigError::InvalidValue {
                field: "loglevel",
                value: level.to_string(),
            });
        }
        self.loglevel = level.to_string();
        Ok(())
    }

    // ---- queries -----------------------------------------------------------

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn container_spec(&self) -> Option<&'static ContainerSpec> {
        container_spec(&self.container_id)
    }

    pub fn kind(&self) -> EncodeKind {
        self.container_spec()
            .map(|c| c.kind)
            .unwrap_or(EncodeKind::Transcode)
    }

    pub fn video_codec(&self) -> &str {
        &self.video_codec
    }

    pub fn output_extension(&self) -> &str {
        &self.output_extension
    }

    /// Audio codecs the user may pick for the current output container.
    pub fn offered_audio_codecs(&self) -> &'static [AudioCodec] {
        if self.kind() == EncodeKind::SaveImages {
            return &[];
        }
        audio_codecs_for(&self.output_extension)
    }

    pub fn pass_mode(&self) -> PassMode {
        self.pass_mode
    }

    pub fn rate_control(&self) -> RateControl {
        self.rate_control
    }

    pub fn bitrate(&self) -> Option<u32> {
        match self.rate_control {
            RateControl::Bitrate(kbps) => Some(kbps),
            _ => None,
        }
    }

    pub fn crf(&self) -> Option<u32> {
        match self.rate_control {
            RateControl::Crf(crf) => Some(crf),
            _ => None,
        }
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn tune(&self) -> Option<&str> {
        self.tune.as_deref()
    }

    pub fn pixel_format(&self) -> Option<&str> {
        self.pixel_format.as_deref()
    }

    pub fn aspect(&self) -> Option<&str> {
        self.aspect.as_deref()
    }

    pub fn frame_rate(&self) -> Option<&str> {
        self.frame_rate.as_deref()
    }

    pub fn filters(&self) -> &VideoFilters {
        &self.filters
    }

    pub fn audio(&self) -> &AudioSettings {
        &self.audio
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn analysis(&self) -> Option<&NormalizationCache> {
        self.analysis.as_ref()
    }

    pub fn threads(&self) -> Option<u32> {
        self.threads
    }

    pub fn cpu_used(&self) -> Option<i32> {
        self.cpu_used
    }

    pub fn stream_map(&self) -> StreamMap {
        self.stream_map
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        self.time_range
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    /// The `-af` value for one input, if any normalization applies to it.
    pub fn audio_filter_for(&self, input: &Path) -> Option<String> {
        if !self.audio.codec.is_filterable() {
            return None;
        }
        match self.normalization.mode {
            NormalizationMode::Off => None,
            NormalizationMode::Peak | NormalizationMode::Rms => self
                .analysis
                .as_ref()
                .and_then(|cache| cache.fragment_for(input)),
            NormalizationMode::Ebu => Some(format!(
                "loudnorm=I={}:TP={}:LRA={}",
                self.normalization.target_db, EBU_TRUE_PEAK, EBU_LOUDNESS_RANGE
            )),
        }
    }

    /// See [`validate_for_encode`].
    pub fn validate_for_encode(&self, files: &[PathBuf]) -> Result<(), ConfigError> {
        validate_for_encode(self, files)
    }
}
