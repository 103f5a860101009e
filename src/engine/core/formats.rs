//! Static container, codec and audio compatibility tables.
//!
//! A container choice pairs an output wrapper with the video encoder used
//! inside it ("MKV (h264)" -> `libx264` in `.mkv`). Audio compatibility is
//! keyed by the output extension, so stream-copy mode (where the user picks
//! the extension) is checked against the same matrix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of command a container choice compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodeKind {
    /// Re-encode the video stream
    Transcode,
    /// Remux the video stream untouched (`-c:v copy`)
    StreamCopy,
    /// Extract a numbered image sequence
    SaveImages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSpec {
    pub id: &'static str,
    pub video_codec: &'static str,
    pub extension: &'static str,
    pub kind: EncodeKind,
}

pub const COPY_VIDEO_CODEC: &str = "Copy Video Codec";
pub const SAVE_IMAGES: &str = "Save Images From Video";

pub const CONTAINERS: &[ContainerSpec] = &[
    ContainerSpec {
        id: "AVI (XVID mpeg4)",
        video_codec: "mpeg4",
        extension: "avi",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MP4 (mpeg4)",
        video_codec: "mpeg4",
        extension: "mp4",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MP4 (h264)",
        video_codec: "libx264",
        extension: "mp4",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MKV (h264)",
        video_codec: "libx264",
        extension: "mkv",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MOV (h264)",
        video_codec: "libx264",
        extension: "mov",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MP4 (h265)",
        video_codec: "libx265",
        extension: "mp4",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MKV (h265)",
        video_codec: "libx265",
        extension: "mkv",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "WEBM (vp8)",
        video_codec: "libvpx",
        extension: "webm",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "WEBM (vp9)",
        video_codec: "libvpx-vp9",
        extension: "webm",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MKV (vp9)",
        video_codec: "libvpx-vp9",
        extension: "mkv",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "WEBM (av1)",
        video_codec: "libsvtav1",
        extension: "webm",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "MKV (av1)",
        video_codec: "libsvtav1",
        extension: "mkv",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: "OGV (theora)",
        video_codec: "libtheora",
        extension: "ogv",
        kind: EncodeKind::Transcode,
    },
    ContainerSpec {
        id: COPY_VIDEO_CODEC,
        video_codec: "copy",
        extension: "mkv",
        kind: EncodeKind::StreamCopy,
    },
    ContainerSpec {
        id: SAVE_IMAGES,
        video_codec: "",
        extension: "png",
        kind: EncodeKind::SaveImages,
    },
];

/// Extensions the user may pick in stream-copy mode.
pub const COPY_EXTENSIONS: &[&str] = &["mkv", "mp4", "mov", "avi", "webm", "ogv"];

pub fn container_spec(id: &str) -> Option<&'static ContainerSpec> {
    CONTAINERS.iter().find(|c| c.id == id)
}

/// Audio codec choices offered next to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AudioCodec {
    /// Let the encoder pick its default for the container
    #[default]
    Default,
    Wav,
    Flac,
    Aac,
    Alac,
    Ac3,
    Ogg,
    Mp3,
    Opus,
    Copy,
    NoAudio,
}

impl AudioCodec {
    pub const ALL: [AudioCodec; 11] = [
        AudioCodec::Default,
        AudioCodec::Wav,
        AudioCodec::Flac,
        AudioCodec::Aac,
        AudioCodec::Alac,
        AudioCodec::Ac3,
        AudioCodec::Ogg,
        AudioCodec::Mp3,
        AudioCodec::Opus,
        AudioCodec::Copy,
        AudioCodec::NoAudio,
    ];

    /// (label shown to the user, encoder name passed to `-c:a`)
    pub fn flag_pair(self) -> (&'static str, &'static str) {
        match self {
            AudioCodec::Default => ("Default", ""),
            AudioCodec::Wav => ("Wav", "pcm_s16le"),
            AudioCodec::Flac => ("Flac", "flac"),
            AudioCodec::Aac => ("Aac", "aac"),
            AudioCodec::Alac => ("Alac", "alac"),
            AudioCodec::Ac3 => ("Ac3", "ac3"),
            AudioCodec::Ogg => ("Ogg", "libvorbis"),
            AudioCodec::Mp3 => ("Mp3", "libmp3lame"),
            AudioCodec::Opus => ("Opus", "libopus"),
            AudioCodec::Copy => ("Copy", "copy"),
            AudioCodec::NoAudio => ("No Audio", ""),
        }
    }

    pub fn label(self) -> &'static str {
        self.flag_pair().0
    }

    pub fn encoder(self) -> &'static str {
        self.flag_pair().1
    }

    /// Whether bitrate/rate/channels may be set for this choice
    pub fn accepts_parameters(self) -> bool {
        !matches!(
            self,
            AudioCodec::Default | AudioCodec::Copy | AudioCodec::NoAudio
        )
    }

    /// Whether the stream is decoded and re-encoded, so an audio filter applies
    pub fn is_filterable(self) -> bool {
        !matches!(self, AudioCodec::Copy | AudioCodec::NoAudio)
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, AudioCodec::Wav | AudioCodec::Flac | AudioCodec::Alac)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| {
            c.label().to_ascii_lowercase() == wanted
                || (!c.encoder().is_empty() && c.encoder() == wanted)
                || (wanted == "none" && *c == AudioCodec::NoAudio)
        })
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const AUDIO_MKV: &[AudioCodec] = &AudioCodec::ALL;

const AUDIO_MP4: &[AudioCodec] = &[
    AudioCodec::Default,
    AudioCodec::Aac,
    AudioCodec::Alac,
    AudioCodec::Ac3,
    AudioCodec::Mp3,
    AudioCodec::Copy,
    AudioCodec::NoAudio,
];

const AUDIO_AVI: &[AudioCodec] = &[
    AudioCodec::Default,
    AudioCodec::Wav,
    AudioCodec::Ac3,
    AudioCodec::Mp3,
    AudioCodec::Copy,
    AudioCodec::NoAudio,
];

const AUDIO_WEBM: &[AudioCodec] = &[
    AudioCodec::Default,
    AudioCodec::Ogg,
    AudioCodec::Opus,
    AudioCodec::Copy,
    AudioCodec::NoAudio,
];

const AUDIO_OGV: &[AudioCodec] = &[
    AudioCodec::Default,
    AudioCodec::Flac,
    AudioCodec::Ogg,
    AudioCodec::Opus,
    AudioCodec::Copy,
    AudioCodec::NoAudio,
];

/// Container extension -> audio codecs that may be muxed into it.
pub const COMPATIBILITY_MATRIX: &[(&str, &[AudioCodec])] = &[
    ("mkv", AUDIO_MKV),
    ("mp4", AUDIO_MP4),
    ("mov", AUDIO_MP4),
    ("avi", AUDIO_AVI),
    ("webm", AUDIO_WEBM),
    ("ogv", AUDIO_OGV),
];

/// Audio codecs enabled for an output extension. Image outputs get none.
pub fn audio_codecs_for(extension: &str) -> &'static [AudioCodec] {
    COMPATIBILITY_MATRIX
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, codecs)| *codecs)
        .unwrap_or(&[])
}

pub fn is_audio_compatible(extension: &str, codec: AudioCodec) -> bool {
    audio_codecs_for(extension).contains(&codec)
}

/// What a video encoder accepts for rate control and tuning.
#[derive(Debug, Clone, Copy)]
pub struct CodecCaps {
    pub codec: &'static str,
    pub crf_range: Option<(u32, u32)>,
    /// Flag used for the speed/quality preset (`-preset` or `-deadline`)
    pub preset_flag: &'static str,
    pub presets: &'static [&'static str],
    pub profiles: &'static [&'static str],
    pub tunes: &'static [&'static str],
    pub supports_cpu_used: bool,
    /// Constant-quality mode needs an explicit `-b:v 0`
    pub crf_needs_zero_bitrate: bool,
}

const X26X_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

const SVT_PRESETS: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13",
];

pub const CODEC_CAPS: &[CodecCaps] = &[
    CodecCaps {
        codec: "libx264",
        crf_range: Some((0, 51)),
        preset_flag: "-preset",
        presets: X26X_PRESETS,
        profiles: &["baseline", "main", "high", "high10", "high422", "high444"],
        tunes: &[
            "film",
            "animation",
            "grain",
            "stillimage",
            "fastdecode",
            "zerolatency",
            "psnr",
            "ssim",
        ],
        supports_cpu_used: false,
        crf_needs_zero_bitrate: false,
    },
    CodecCaps {
        codec: "libx265",
        crf_range: Some((0, 51)),
        preset_flag: "-preset",
        presets: X26X_PRESETS,
        profiles: &["main", "main10", "mainstillpicture"],
        tunes: &[
            "psnr",
            "ssim",
            "grain",
            "zerolatency",
            "fastdecode",
            "animation",
        ],
        supports_cpu_used: false,
        crf_needs_zero_bitrate: false,
    },
    CodecCaps {
        codec: "libvpx",
        crf_range: Some((4, 63)),
        preset_flag: "-deadline",
        presets: &["best", "good", "realtime"],
        profiles: &[],
        tunes: &[],
        supports_cpu_used: true,
        crf_needs_zero_bitrate: true,
    },
    CodecCaps {
        codec: "libvpx-vp9",
        crf_range: Some((0, 63)),
        preset_flag: "-deadline",
        presets: &["best", "good", "realtime"],
        profiles: &[],
        tunes: &[],
        supports_cpu_used: true,
        crf_needs_zero_bitrate: true,
    },
    CodecCaps {
        codec: "libsvtav1",
        crf_range: Some((0, 63)),
        preset_flag: "-preset",
        presets: SVT_PRESETS,
        profiles: &[],
        tunes: &[],
        supports_cpu_used: false,
        crf_needs_zero_bitrate: false,
    },
    CodecCaps {
        codec: "mpeg4",
        crf_range: None,
        preset_flag: "",
        presets: &[],
        profiles: &[],
        tunes: &[],
        supports_cpu_used: false,
        crf_needs_zero_bitrate: false,
    },
    CodecCaps {
        codec: "libtheora",
        crf_range: None,
        preset_flag: "",
        presets: &[],
        profiles: &[],
        tunes: &[],
        supports_cpu_used: false,
        crf_needs_zero_bitrate: false,
    },
];

pub fn codec_caps(codec: &str) -> Option<&'static CodecCaps> {
    CODEC_CAPS.iter().find(|c| c.codec == codec)
}
