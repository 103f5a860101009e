use clap::{Args, Parser, Subcommand, ValueEnum};
use ffbatch::engine::NormalizationMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffbatch")]
#[command(
    about = "Compile encoding options into FFmpeg commands and run them as a batch",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Probe a video file to get its duration
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// List container/codec choices and the audio codecs each accepts
    Containers,

    /// Run the volume analysis and print the gain per file
    Analyze {
        /// Files or directories (scanned recursively)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = NormalizeArg::Peak)]
        mode: NormalizeArg,

        /// Target level in dB (default from config, or per mode)
        #[arg(long, allow_hyphen_values = true)]
        target: Option<f64>,
    },

    /// Show ffmpeg commands without executing
    DryRun(EncodeArgs),

    /// Encode every queued file
    Encode {
        #[command(flatten)]
        args: EncodeArgs,

        /// Write the batch report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NormalizeArg {
    Off,
    Peak,
    Rms,
    Ebu,
}

impl From<NormalizeArg> for NormalizationMode {
    fn from(arg: NormalizeArg) -> Self {
        match arg {
            NormalizeArg::Off => NormalizationMode::Off,
            NormalizeArg::Peak => NormalizationMode::Peak,
            NormalizeArg::Rms => NormalizationMode::Rms,
            NormalizeArg::Ebu => NormalizationMode::Ebu,
        }
    }
}

/// Flags mirroring the options model setters.
#[derive(Debug, Clone, Args)]
pub struct EncodeArgs {
    /// Files or directories (scanned recursively)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Start from a JSON options snapshot instead of the configured defaults
    #[arg(long, value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// Container/codec pair, e.g. "MP4 (h264)" (see `containers`)
    #[arg(long)]
    pub container: Option<String>,

    /// Output extension in "Copy Video Codec" mode
    #[arg(long)]
    pub ext: Option<String>,

    /// Video bitrate in kbit/s
    #[arg(long, conflicts_with = "crf")]
    pub bitrate: Option<u32>,

    #[arg(long)]
    pub crf: Option<u32>,

    #[arg(long)]
    pub two_pass: bool,

    #[arg(long)]
    pub preset: Option<String>,

    #[arg(long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub tune: Option<String>,

    #[arg(long)]
    pub pix_fmt: Option<String>,

    /// Display aspect ratio, e.g. 16:9
    #[arg(long)]
    pub aspect: Option<String>,

    /// Output frame rate (images per second when saving images)
    #[arg(long)]
    pub fps: Option<String>,

    /// e.g. crop=640:480:0:0
    #[arg(long)]
    pub crop: Option<String>,

    /// e.g. scale=w=1280:h=-2,setsar=1/1
    #[arg(long)]
    pub scale: Option<String>,

    /// transpose=1, transpose=2, 180, hflip or vflip
    #[arg(long)]
    pub rotate: Option<String>,

    /// yadif or w3fdif filter string
    #[arg(long, conflicts_with = "interlace")]
    pub deinterlace: Option<String>,

    /// e.g. interlace=scan=tff:lowpass=linear
    #[arg(long)]
    pub interlace: Option<String>,

    /// hqdn3d or nlmeans filter string
    #[arg(long)]
    pub denoise: Option<String>,

    /// Audio codec label: Default, Wav, Flac, Aac, Alac, Ac3, Ogg, Mp3, Opus, Copy, "No Audio"
    #[arg(long)]
    pub audio: Option<String>,

    /// Audio bitrate in kbit/s
    #[arg(long)]
    pub audio_bitrate: Option<u32>,

    /// Audio sample rate in Hz
    #[arg(long)]
    pub audio_rate: Option<u32>,

    #[arg(long)]
    pub audio_channels: Option<u8>,

    /// 16, 24 or 32 (lossless codecs only)
    #[arg(long)]
    pub bit_depth: Option<String>,

    #[arg(long, value_enum)]
    pub normalize: Option<NormalizeArg>,

    /// Normalization target in dB
    #[arg(long, allow_hyphen_values = true)]
    pub target: Option<f64>,

    #[arg(long)]
    pub threads: Option<u32>,

    #[arg(long, allow_hyphen_values = true)]
    pub cpu_used: Option<i32>,

    /// Map every input stream (-map 0)
    #[arg(long, conflicts_with = "audio_track")]
    pub map_all: bool,

    /// Keep video plus this audio track (zero-based)
    #[arg(long)]
    pub audio_track: Option<u32>,

    /// Start offset, HH:MM:SS[.mmm]
    #[arg(long, requires = "duration")]
    pub start: Option<String>,

    /// Length to encode, HH:MM:SS[.mmm]
    #[arg(long)]
    pub duration: Option<String>,

    #[arg(long)]
    pub overwrite: bool,

    /// FFmpeg -loglevel
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Write outputs here instead of next to each source
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Output name pattern: {basename}, {filename}, {ext}
    #[arg(long)]
    pub pattern: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
