//! Command synthesis: turns an options snapshot plus a job into ordered
//! FFmpeg argument lists.
//!
//! Argument order is fixed for every mode:
//! loglevel, time range, input, video codec, pass marker, rate control,
//! preset/profile/tune/pix_fmt, aspect/frame rate, video filters, audio,
//! audio filter, threads/cpu-used, stream mapping, muxer, overwrite, output.

use super::filters::assemble;
use super::formats::{AudioCodec, EncodeKind, codec_caps};
use super::options::{OptionsModel, RateControl, StreamMap, format_timestamp};
use super::types::Job;
use crate::engine::validate::{ConfigError, validate_structure};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const FFMPEG_PROGRAM: &str = "ffmpeg";

/// Default `-r` when extracting images and no frame rate is set
pub const DEFAULT_IMAGE_RATE: &str = "1";

/// One FFmpeg invocation: program plus ordered argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderCommand {
    pub program: String,
    pub args: Vec<String>,
    /// 1 or 2 for two-pass commands
    pub pass: Option<u8>,
}

impl EncoderCommand {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            program: FFMPEG_PROGRAM.to_string(),
            args,
            pass: None,
        }
    }

    fn with_pass(mut self, pass: u8) -> Self {
        self.pass = Some(pass);
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following the first occurrence of `flag`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    /// Every value of a repeatable flag such as `-map`.
    pub fn flag_values(&self, flag: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    pub fn output(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Shell-pasteable form, tokens with whitespace or shell metacharacters quoted.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(display_token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn display_token(token: &str) -> Cow<'_, str> {
    let needs_quoting = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || "'\"$`\\|&;<>()*?!#~[]{}".contains(c));
    if !needs_quoting {
        return Cow::Borrowed(token);
    }
    shlex::try_quote(token).unwrap_or(Cow::Borrowed(token))
}

impl fmt::Display for EncoderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// The commands one job compiles to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodePlan {
    Single(EncoderCommand),
    TwoPass {
        first: EncoderCommand,
        second: EncoderCommand,
        /// `-passlogfile` prefix shared by both passes
        passlog: PathBuf,
    },
}

impl EncodePlan {
    pub fn commands(&self) -> Vec<&EncoderCommand> {
        match self {
            EncodePlan::Single(cmd) => vec![cmd],
            EncodePlan::TwoPass { first, second, .. } => vec![first, second],
        }
    }

    pub fn pass_count(&self) -> usize {
        self.commands().len()
    }

    /// Directory holding the pass log, removed once the job ends.
    pub fn passlog_dir(&self) -> Option<&Path> {
        match self {
            EncodePlan::Single(_) => None,
            EncodePlan::TwoPass { passlog, .. } => passlog.parent(),
        }
    }

    /// Shell form, passes joined with `&&`
    pub fn display(&self) -> String {
        self.commands()
            .iter()
            .map(|c| c.display())
            .collect::<Vec<_>>()
            .join(" \\\n&& ")
    }
}

pub fn null_output_target() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

pub fn two_pass_log_prefix(job: &Job) -> PathBuf {
    std::env::temp_dir()
        .join("ffbatch_2pass")
        .join(job.id.to_string())
        .join("ffmpeg2pass")
}

/// `<dir>/<stem>-%06d.<ext>`. An output path that already carries a
/// `%0Nd` counter is used as is; anything else is taken as the directory.
pub fn image_output_pattern(output: &Path, input: &Path, extension: &str) -> PathBuf {
    let has_counter = output
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("%0"));
    if has_counter {
        return output.to_path_buf();
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    output.join(format!("{stem}-%06d.{extension}"))
}

/// Ordered argument accumulator.
#[derive(Default)]
struct ArgList(Vec<String>);

impl ArgList {
    fn push(&mut self, token: impl Into<String>) -> &mut Self {
        self.0.push(token.into());
        self
    }

    fn flag(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.push(name).push(value)
    }

    fn finish(self) -> EncoderCommand {
        EncoderCommand::new(self.0)
    }
}

fn push_input(args: &mut ArgList, options: &OptionsModel, job: &Job) {
    args.flag("-loglevel", options.loglevel());
    if let Some(range) = options.time_range() {
        args.flag("-ss", format_timestamp(range.start_s));
        args.flag("-t", format_timestamp(range.duration_s));
    }
    args.flag("-i", job.input_path.display().to_string());
}

fn push_rate_control(args: &mut ArgList, options: &OptionsModel) {
    match options.rate_control() {
        RateControl::Auto => {}
        RateControl::Bitrate(kbps) => {
            args.flag("-b:v", format!("{kbps}k"));
        }
        RateControl::Crf(crf) => {
            args.flag("-crf", crf.to_string());
            if codec_caps(options.video_codec()).is_some_and(|c| c.crf_needs_zero_bitrate) {
                args.flag("-b:v", "0");
            }
        }
    }
}

fn push_codec_tuning(args: &mut ArgList, options: &OptionsModel) {
    let caps = codec_caps(options.video_codec());
    if let (Some(preset), Some(caps)) = (options.preset(), caps) {
        if !caps.preset_flag.is_empty() {
            args.flag(caps.preset_flag, preset);
        }
    }
    if let Some(profile) = options.profile() {
        args.flag("-profile:v", profile);
    }
    if let Some(tune) = options.tune() {
        args.flag("-tune", tune);
    }
    if let Some(pix_fmt) = options.pixel_format() {
        args.flag("-pix_fmt", pix_fmt);
    }
}

fn push_geometry(args: &mut ArgList, options: &OptionsModel) {
    if let Some(aspect) = options.aspect() {
        args.flag("-aspect", aspect);
    }
    if let Some(rate) = options.frame_rate() {
        args.flag("-r", rate);
    }
}

fn push_video_filters(args: &mut ArgList, options: &OptionsModel) {
    let graph = assemble(options.filters());
    if !graph.is_empty() {
        args.flag("-vf", graph);
    }
}

fn push_audio(args: &mut ArgList, options: &OptionsModel, job: &Job) {
    let audio = options.audio();
    match audio.codec {
        AudioCodec::Default => {}
        AudioCodec::NoAudio => {
            args.push("-an");
        }
        AudioCodec::Copy => {
            args.flag("-c:a", "copy");
        }
        codec => {
            let encoder = match (codec, audio.bit_depth) {
                (AudioCodec::Wav, Some(depth)) => depth.pcm_encoder(),
                _ => codec.encoder(),
            };
            args.flag("-c:a", encoder);
            if let Some(kbps) = audio.bitrate_kbps {
                args.flag("-b:a", format!("{kbps}k"));
            }
            if let Some(rate) = audio.sample_rate {
                args.flag("-ar", rate.to_string());
            }
            if let Some(channels) = audio.channels {
                args.flag("-ac", channels.to_string());
            }
            if let Some(fmt) = audio.bit_depth.and_then(|d| d.sample_fmt(codec)) {
                args.flag("-sample_fmt", fmt);
            }
        }
    }
    if let Some(filter) = options.audio_filter_for(&job.input_path) {
        args.flag("-af", filter);
    }
}

fn push_threads(args: &mut ArgList, options: &OptionsModel) {
    if let Some(threads) = options.threads() {
        args.flag("-threads", threads.to_string());
    }
    if let Some(cpu_used) = options.cpu_used() {
        args.flag("-cpu-used", cpu_used.to_string());
    }
}

fn push_mapping(args: &mut ArgList, options: &OptionsModel) {
    match options.stream_map() {
        StreamMap::Auto => {}
        StreamMap::All => {
            args.flag("-map", "0");
        }
        StreamMap::AudioTrack(track) => {
            args.flag("-map", "0:v?").flag("-map", format!("0:a:{track}?"));
        }
    }
}

/// Video part of the mapping, so pass 1 analyzes the streams pass 2 encodes.
fn push_video_mapping(args: &mut ArgList, options: &OptionsModel) {
    match options.stream_map() {
        StreamMap::Auto => {}
        StreamMap::All | StreamMap::AudioTrack(_) => {
            args.flag("-map", "0:v?");
        }
    }
}

fn push_overwrite(args: &mut ArgList, options: &OptionsModel) {
    args.push(if options.overwrite() { "-y" } else { "-n" });
}

/// Full single-pass transcode.
pub fn build_single_pass(options: &OptionsModel, job: &Job) -> EncoderCommand {
    let mut args = ArgList::default();
    push_input(&mut args, options, job);
    args.flag("-c:v", options.video_codec());
    push_rate_control(&mut args, options);
    push_codec_tuning(&mut args, options);
    push_geometry(&mut args, options);
    push_video_filters(&mut args, options);
    push_audio(&mut args, options, job);
    push_threads(&mut args, options);
    push_mapping(&mut args, options);
    push_overwrite(&mut args, options);
    args.push(job.output_path.display().to_string());
    args.finish()
}

/// Pass 1 (analysis, audio dropped, output discarded) and pass 2 (full
/// flag set). Both share codec, rate control, tuning, filters, time range
/// and the pass log prefix.
pub fn build_two_pass(options: &OptionsModel, job: &Job, passlog: &Path) -> EncodePlan {
    let passlog_str = passlog.display().to_string();

    let mut first = ArgList::default();
    push_input(&mut first, options, job);
    first.flag("-c:v", options.video_codec());
    first.flag("-passlogfile", passlog_str.clone()).flag("-pass", "1");
    push_rate_control(&mut first, options);
    push_codec_tuning(&mut first, options);
    push_geometry(&mut first, options);
    push_video_filters(&mut first, options);
    first.push("-an");
    push_threads(&mut first, options);
    push_video_mapping(&mut first, options);
    first.flag("-f", "rawvideo");
    first.push("-y");
    first.push(null_output_target());

    let mut second = ArgList::default();
    push_input(&mut second, options, job);
    second.flag("-c:v", options.video_codec());
    second.flag("-passlogfile", passlog_str).flag("-pass", "2");
    push_rate_control(&mut second, options);
    push_codec_tuning(&mut second, options);
    push_geometry(&mut second, options);
    push_video_filters(&mut second, options);
    push_audio(&mut second, options, job);
    push_threads(&mut second, options);
    push_mapping(&mut second, options);
    push_overwrite(&mut second, options);
    second.push(job.output_path.display().to_string());

    EncodePlan::TwoPass {
        first: first.finish().with_pass(1),
        second: second.finish().with_pass(2),
        passlog: passlog.to_path_buf(),
    }
}

/// Remux with `-c:v copy`. No rate control, tuning, filters or threads.
pub fn build_stream_copy(options: &OptionsModel, job: &Job) -> EncoderCommand {
    let mut args = ArgList::default();
    push_input(&mut args, options, job);
    args.flag("-c:v", "copy");
    push_geometry(&mut args, options);
    push_audio(&mut args, options, job);
    push_mapping(&mut args, options);
    push_overwrite(&mut args, options);
    args.push(job.output_path.display().to_string());
    args.finish()
}

/// Numbered image sequence, `-r` frames per second (default one).
pub fn build_save_images(options: &OptionsModel, job: &Job) -> EncoderCommand {
    let mut args = ArgList::default();
    push_input(&mut args, options, job);
    args.flag("-r", options.frame_rate().unwrap_or(DEFAULT_IMAGE_RATE));
    push_video_filters(&mut args, options);
    push_threads(&mut args, options);
    push_overwrite(&mut args, options);
    let pattern = image_output_pattern(
        &job.output_path,
        &job.input_path,
        options.output_extension(),
    );
    args.push(pattern.display().to_string());
    args.finish()
}

/// Compile one job. Structural configuration errors surface here; analysis
/// freshness is checked once per batch by `validate_for_encode`.
pub fn synthesize(options: &OptionsModel, job: &Job) -> Result<EncodePlan, ConfigError> {
    validate_structure(options)?;
    let plan = match options.kind() {
        EncodeKind::StreamCopy => EncodePlan::Single(build_stream_copy(options, job)),
        EncodeKind::SaveImages => EncodePlan::Single(build_save_images(options, job)),
        EncodeKind::Transcode if options.pass_mode() == super::options::PassMode::TwoPass => {
            build_two_pass(options, job, &two_pass_log_prefix(job))
        }
        EncodeKind::Transcode => EncodePlan::Single(build_single_pass(options, job)),
    };
    Ok(plan)
}

/// Dry-run text for a job, as a user would paste it into a shell.
pub fn format_plan(options: &OptionsModel, job: &Job) -> Result<String, ConfigError> {
    synthesize(options, job).map(|plan| plan.display())
}
