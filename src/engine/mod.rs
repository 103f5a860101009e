// Encoding option compiler and batch engine, independent of any front-end

pub mod analyze;
pub mod core;
pub mod runner;
pub mod validate;
pub mod worker;

pub use analyze::{AnalysisError, FileAnalysis, NormalizationCache, VolumeStats, analyze};
pub use core::*;
pub use runner::{CancelToken, FfmpegRunner, ProcessRunner, RunOutcome};
pub use validate::{ConfigError, validate_for_encode};
pub use worker::{BatchError, BatchHandle, BatchSequencer, WorkerMessage, spawn_batch};
