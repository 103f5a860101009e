mod ffmpeg_cmd;
mod ffmpeg_info;
mod filters;
mod formats;
mod log;
mod options;
mod scan;
mod state;
mod types;

pub use ffmpeg_cmd::{
    DEFAULT_IMAGE_RATE, EncodePlan, EncoderCommand, FFMPEG_PROGRAM, build_save_images,
    build_single_pass, build_stream_copy, build_two_pass, format_plan, image_output_pattern,
    null_output_target, synthesize, two_pass_log_prefix,
};
pub use ffmpeg_info::{encoder_available, parse_ffprobe_duration, probe_duration, tool_version};
pub use filters::{
    Crop, Deinterlacer, Denoise, FieldOrder, FilterFragment, Interlace, Lacing, Rotation, Scale,
    VideoFilters, assemble,
};
pub use formats::{
    AudioCodec, CODEC_CAPS, COMPATIBILITY_MATRIX, CONTAINERS, COPY_EXTENSIONS, COPY_VIDEO_CODEC,
    CodecCaps, ContainerSpec, EncodeKind, SAVE_IMAGES, audio_codecs_for, codec_caps,
    container_spec, is_audio_compatible,
};
pub use log::{BATCH_LOG_NAME, write_batch_log};
pub use options::{
    AudioSettings, BitDepth, DEFAULT_CONTAINER, EBU_LOUDNESS_RANGE, EBU_TRUE_PEAK, LOG_LEVELS,
    Normalization, NormalizationMode, OptionsModel, PassMode, RateControl, StreamMap, TimeRange,
    format_timestamp, parse_timestamp,
};
pub use scan::{
    DEFAULT_FILENAME_PATTERN, build_job, build_job_queue, derive_output_path, is_video_file, scan,
};
pub use state::{BatchReport, BatchState, JobReport};
pub use types::{Job, JobStatus, ProgressParser, overall_progress};
