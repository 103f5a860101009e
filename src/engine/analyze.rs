//! Audio level pre-analysis for peak/RMS normalization.
//!
//! Each input gets one `volumedetect` run. The measured level is compared to
//! the target and, when it sits below it, turned into a positive
//! `volume=<gain>dB` fragment. Files already at or above the target are left
//! alone (no attenuation).

use crate::engine::core::{EncoderCommand, Normalization, NormalizationMode, null_output_target};
use crate::engine::runner::{CancelToken, ProcessRunner};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{info, warn};

static MAX_VOLUME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"max_volume:\s*(-?(?:inf|[0-9]+(?:\.[0-9]+)?))\s*dB").expect("valid regex")
});
static MEAN_VOLUME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mean_volume:\s*(-?(?:inf|[0-9]+(?:\.[0-9]+)?))\s*dB").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("volumedetect exited with {code:?}: {detail}")]
    ProcessFailed { code: Option<i32>, detail: String },

    #[error("no volumedetect report in ffmpeg output")]
    MissingReport,

    #[error("could not run ffmpeg: {0}")]
    Spawn(String),

    #[error("analysis cancelled")]
    Cancelled,
}

/// Levels reported by volumedetect, in dBFS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub max_db: f64,
    pub mean_db: f64,
}

/// Pull `max_volume` and `mean_volume` out of volumedetect's stderr report.
/// The last report wins if the output holds several.
pub fn parse_volumedetect(stderr: &str) -> Result<VolumeStats, AnalysisError> {
    let last = |re: &Regex| -> Option<f64> {
        re.captures_iter(stderr)
            .last()
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };
    match (last(&MAX_VOLUME_RE), last(&MEAN_VOLUME_RE)) {
        (Some(max_db), Some(mean_db)) => Ok(VolumeStats { max_db, mean_db }),
        _ => Err(AnalysisError::MissingReport),
    }
}

/// Gain needed to lift the measured level to `target_db`, or `None` when the
/// file is already there (or silent).
pub fn compute_gain(stats: &VolumeStats, mode: NormalizationMode, target_db: f64) -> Option<f64> {
    let level = match mode {
        NormalizationMode::Peak => stats.max_db,
        NormalizationMode::Rms => stats.mean_db,
        NormalizationMode::Off | NormalizationMode::Ebu => return None,
    };
    if !level.is_finite() || level >= target_db {
        return None;
    }
    Some(target_db - level)
}

pub fn gain_fragment(gain_db: f64) -> String {
    format!("volume={gain_db:.1}dB")
}

/// `ffmpeg -i <file> -vn -sn -dn -af volumedetect -f null <null>`
pub fn volumedetect_command(input: &Path) -> EncoderCommand {
    EncoderCommand::new(vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-vn".to_string(),
        "-sn".to_string(),
        "-dn".to_string(),
        "-af".to_string(),
        "volumedetect".to_string(),
        "-f".to_string(),
        "null".to_string(),
        null_output_target().to_string(),
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub stats: Result<VolumeStats, AnalysisError>,
    pub gain_db: Option<f64>,
    /// Human-readable status, e.g. why no gain is applied
    pub message: String,
}

impl FileAnalysis {
    fn evaluate(
        path: PathBuf,
        stats: Result<VolumeStats, AnalysisError>,
        norm: Normalization,
    ) -> Self {
        let (gain_db, message) = match &stats {
            Ok(s) => match compute_gain(s, norm.mode, norm.target_db) {
                Some(gain) => (
                    Some(gain),
                    format!(
                        "gain {gain:+.1} dB (max {:.1} dB, mean {:.1} dB)",
                        s.max_db, s.mean_db
                    ),
                ),
                None => (
                    None,
                    format!(
                        "volume unchanged: level already at or above {:.1} dB \
                         (max {:.1} dB, mean {:.1} dB)",
                        norm.target_db, s.max_db, s.mean_db
                    ),
                ),
            },
            Err(e) => (
                None,
                format!("analysis unavailable, encoding without normalization: {e}"),
            ),
        };
        Self {
            path,
            stats,
            gain_db,
            message,
        }
    }

    pub fn fragment(&self) -> Option<String> {
        self.gain_db.map(gain_fragment)
    }
}

/// Analysis results keyed to the exact file set and target they were made for.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationCache {
    files: Vec<PathBuf>,
    normalization: Normalization,
    results: BTreeMap<PathBuf, FileAnalysis>,
}

fn sorted_set(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut set = files.to_vec();
    set.sort();
    set.dedup();
    set
}

impl NormalizationCache {
    pub fn new(files: &[PathBuf], normalization: Normalization) -> Self {
        Self {
            files: sorted_set(files),
            normalization,
            results: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, analysis: FileAnalysis) {
        self.results.insert(analysis.path.clone(), analysis);
    }

    /// False once a file is added/removed or the mode/target changes.
    pub fn is_current_for(&self, files: &[PathBuf], normalization: Normalization) -> bool {
        self.normalization == normalization && self.files == sorted_set(files)
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn get(&self, path: &Path) -> Option<&FileAnalysis> {
        self.results.get(path)
    }

    pub fn fragment_for(&self, path: &Path) -> Option<String> {
        self.get(path).and_then(FileAnalysis::fragment)
    }

    /// Per-file fragment, `None` where no gain applies.
    pub fn fragments(&self) -> BTreeMap<PathBuf, Option<String>> {
        self.files
            .iter()
            .map(|p| (p.clone(), self.fragment_for(p)))
            .collect()
    }

    pub fn results(&self) -> impl Iterator<Item = &FileAnalysis> {
        self.results.values()
    }
}

/// Run volumedetect over every file.
pub fn analyze(
    files: &[PathBuf],
    normalization: Normalization,
    runner: &mut dyn ProcessRunner,
    cancel: &CancelToken,
) -> Result<NormalizationCache, AnalysisError> {
    analyze_with_callback(files, normalization, runner, cancel, |_| {})
}

/// Like [`analyze`], calling `on_file` as each result arrives.
/// Per-file failures are kept in the cache; only cancellation aborts.
pub fn analyze_with_callback<F>(
    files: &[PathBuf],
    normalization: Normalization,
    runner: &mut dyn ProcessRunner,
    cancel: &CancelToken,
    mut on_file: F,
) -> Result<NormalizationCache, AnalysisError>
where
    F: FnMut(&FileAnalysis),
{
    let mut cache = NormalizationCache::new(files, normalization);
    if !normalization.mode.needs_analysis() {
        return Ok(cache);
    }

    for path in sorted_set(files) {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let command = volumedetect_command(&path);
        let stats = match runner.run(&command, cancel, &mut |_| {}) {
            Ok(outcome) if outcome.cancelled => return Err(AnalysisError::Cancelled),
            Ok(outcome) if outcome.success => parse_volumedetect(&outcome.stderr),
            Ok(outcome) => Err(AnalysisError::ProcessFailed {
                code: outcome.exit_code,
                detail: outcome.stderr_tail(3),
            }),
            Err(e) => Err(AnalysisError::Spawn(format!("{e:#}"))),
        };

        let analysis = FileAnalysis::evaluate(path, stats, normalization);
        if analysis.stats.is_err() {
            warn!(file = %analysis.path.display(), "{}", analysis.message);
        } else {
            info!(file = %analysis.path.display(), "{}", analysis.message);
        }
        on_file(&analysis);
        cache.insert(analysis);
    }

    Ok(cache)
}
