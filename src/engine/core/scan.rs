use super::ffmpeg_cmd::image_output_pattern;
use super::ffmpeg_info::probe_duration;
use super::formats::EncodeKind;
use super::options::OptionsModel;
use super::types::{Job, JobStatus};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Default video file extensions to scan for
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "wmv", "mpg", "mpeg", "ts", "ogv",
];

pub const DEFAULT_FILENAME_PATTERN: &str = "{basename}";

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Scan a directory recursively for video files, sorted by path
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_video_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Expand a pattern such as `{basename}_small` into an output path with the
/// given extension. Placeholders: `{basename}`, `{filename}`, `{ext}`.
pub fn derive_output_path(
    input: &Path,
    extension: &str,
    output_dir: Option<&Path>,
    pattern: Option<&str>,
) -> PathBuf {
    let basename = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let filename = input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let source_ext = input
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let stem = pattern
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_FILENAME_PATTERN)
        .replace("{basename}", basename)
        .replace("{filename}", filename)
        .replace("{ext}", source_ext);

    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let out = dir.join(format!("{stem}.{extension}"));
    // Same name as the source would clobber it
    if out == input {
        return dir.join(format!("{stem}_out.{extension}"));
    }
    out
}

/// Build one job. Image extraction writes `<dir>/<stem>-%06d.<ext>` next to
/// the source (or into `output_dir`). Jobs whose output already exists are
/// marked Skipped unless overwrite is on.
pub fn build_job(
    input_path: PathBuf,
    options: &OptionsModel,
    output_dir: Option<&Path>,
    pattern: Option<&str>,
    ffprobe: &Path,
) -> Job {
    let output_path = if options.kind() == EncodeKind::SaveImages {
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| input_path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        image_output_pattern(&dir, &input_path, options.output_extension())
    } else {
        derive_output_path(&input_path, options.output_extension(), output_dir, pattern)
    };

    let duration = probe_duration(ffprobe, &input_path)
        .inspect_err(|e| debug!(file = %input_path.display(), error = %e, "duration probe failed"))
        .ok();
    let mut job = Job::new(input_path, output_path).with_duration(duration);

    if !options.overwrite() && job.output_path.exists() {
        job.status = JobStatus::Skipped;
    }
    job
}

pub fn build_job_queue(
    files: Vec<PathBuf>,
    options: &OptionsModel,
    output_dir: Option<&Path>,
    pattern: Option<&str>,
    ffprobe: &Path,
) -> Vec<Job> {
    files
        .into_iter()
        .map(|input| build_job(input, options, output_dir, pattern, ffprobe))
        .collect()
}
