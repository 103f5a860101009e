//! Batch sequencer: one worker thread, jobs in order, passes in order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::analyze::{AnalysisError, analyze_with_callback};
use super::core::{
    BatchReport, BatchState, EncodeKind, EncodePlan, Job, JobReport, JobStatus, OptionsModel,
    ProgressParser, null_output_target, overall_progress, synthesize, write_batch_log,
};
use super::runner::{CancelToken, ProcessRunner};
use super::validate::{ConfigError, validate_structure};

/// Message from the worker to whoever drives the batch
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    BatchStarted { total_jobs: usize },

    StateChanged(BatchState),

    /// One file's volume analysis finished
    AnalysisNotice {
        path: PathBuf,
        message: String,
        gain_db: Option<f64>,
    },

    JobStarted { job_id: Uuid, pass_count: u8 },

    /// Progress update during encoding; `progress_pct` spans all passes
    ProgressUpdate {
        job_id: Uuid,
        pass: u8,
        progress_pct: f64,
        out_time_s: f64,
        fps: Option<f64>,
        speed: Option<f64>,
        bitrate_kbps: Option<f64>,
        size_bytes: Option<u64>,
    },

    JobCompleted { job_id: Uuid },

    JobFailed {
        job_id: Uuid,
        error: String,
        failed_pass: Option<u8>,
    },

    BatchCompleted { report: BatchReport },

    /// Nothing was encoded
    BatchFailed { reason: String },
}

/// Problems that stop a batch before any encode starts.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no jobs to encode")]
    NoJobs,

    #[error("cannot read input {path}: {reason}")]
    UnreadableInput { path: PathBuf, reason: String },

    #[error("destination directory {0} does not exist")]
    MissingDestination(PathBuf),

    #[error("output {0} is the same file as its input")]
    DestinationIsSource(PathBuf),

    #[error("time range ends at {end_s:.3}s but {path} is only {duration_s:.3}s long")]
    TimeRangeBeyondDuration {
        path: PathBuf,
        end_s: f64,
        duration_s: f64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("audio analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("batch worker thread panicked")]
    WorkerPanicked,
}

/// How one job ended
enum JobOutcome {
    Done,
    Failed { error: String, pass: Option<u8> },
    Cancelled,
}

pub struct BatchSequencer<R: ProcessRunner> {
    options: OptionsModel,
    runner: R,
    cancel: CancelToken,
    tx: Sender<WorkerMessage>,
    state: BatchState,
    log_dir: Option<PathBuf>,
}

impl<R: ProcessRunner> BatchSequencer<R> {
    /// The sequencer keeps its own copy of the options; analysis results are
    /// attached to that copy only.
    pub fn new(options: OptionsModel, runner: R, tx: Sender<WorkerMessage>) -> Self {
        Self {
            options,
            runner,
            cancel: CancelToken::new(),
            tx,
            state: BatchState::Idle,
            log_dir: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Append the batch report to `ffbatch.log` in this directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn send(&self, msg: WorkerMessage) {
        // Receiver gone means nobody is listening; keep working
        let _ = self.tx.send(msg);
    }

    fn set_state(&mut self, next: BatchState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal batch transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "batch state");
        self.state = next.clone();
        self.send(WorkerMessage::StateChanged(next));
    }

    /// Run the whole batch. Fatal errors are returned (and reported as
    /// `BatchFailed`); per-job failures end up in the report.
    pub fn run(&mut self, jobs: Vec<Job>) -> Result<BatchReport, BatchError> {
        self.send(WorkerMessage::BatchStarted {
            total_jobs: jobs.len(),
        });
        self.set_state(BatchState::Validating);

        match self.run_inner(jobs) {
            Ok(report) => {
                self.finish_log(&report);
                self.send(WorkerMessage::BatchCompleted {
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, "batch aborted before encoding");
                self.set_state(BatchState::Failed(err.to_string()));
                self.send(WorkerMessage::BatchFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn run_inner(&mut self, mut jobs: Vec<Job>) -> Result<BatchReport, BatchError> {
        let started_at = Local::now();
        if jobs.is_empty() {
            return Err(BatchError::NoJobs);
        }

        let files: Vec<PathBuf> = jobs
            .iter()
            .filter(|j| j.is_pending())
            .map(|j| j.input_path.clone())
            .collect();
        for job in jobs.iter().filter(|j| j.is_pending()) {
            self.validate_job(job)?;
        }
        // Structural errors surface before the analysis spawns anything
        validate_structure(&self.options)?;

        let norm = self.options.normalization();
        let fresh = self
            .options
            .analysis()
            .is_some_and(|cache| cache.is_current_for(&files, norm));
        if norm.mode.needs_analysis() && !fresh {
            let total = files.len();
            self.set_state(BatchState::AnalyzingAudio { done: 0, total });
            let tx = self.tx.clone();
            let mut done = 0;
            let result = analyze_with_callback(
                &files,
                norm,
                &mut self.runner,
                &self.cancel,
                |analysis| {
                    done += 1;
                    let _ = tx.send(WorkerMessage::AnalysisNotice {
                        path: analysis.path.clone(),
                        message: analysis.message.clone(),
                        gain_db: analysis.gain_db,
                    });
                    let _ = tx.send(WorkerMessage::StateChanged(BatchState::AnalyzingAudio {
                        done,
                        total,
                    }));
                },
            );
            match result {
                Ok(cache) => self.options.set_analysis(cache),
                Err(AnalysisError::Cancelled) => {
                    self.set_state(BatchState::Cancelled);
                    return Ok(self.build_report(&jobs, &HashMap::new(), started_at, true));
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.options.validate_for_encode(&files)?;

        // Every plan is built before anything runs, so configuration
        // errors never leave a half-finished batch behind.
        let mut plans = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let plan = if job.is_pending() {
                Some(synthesize(&self.options, job)?)
            } else {
                None
            };
            plans.push(plan);
        }

        let mut failed_passes = HashMap::new();
        let mut cancelled = false;
        for (job, plan) in jobs.iter_mut().zip(plans) {
            let Some(plan) = plan else {
                debug!(file = %job.input_path.display(), "skipping, output exists");
                continue;
            };
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            match self.encode_job(job, &plan) {
                JobOutcome::Done => {
                    job.status = JobStatus::Done;
                    info!(file = %job.output_path.display(), "encoded");
                    self.send(WorkerMessage::JobCompleted { job_id: job.id });
                }
                JobOutcome::Failed { error, pass } => {
                    job.status = JobStatus::Failed;
                    job.last_error = Some(error.clone());
                    if let Some(p) = pass {
                        failed_passes.insert(job.id, p);
                    }
                    warn!(file = %job.input_path.display(), pass = ?pass, "encode failed");
                    self.send(WorkerMessage::JobFailed {
                        job_id: job.id,
                        error,
                        failed_pass: pass,
                    });
                }
                JobOutcome::Cancelled => {
                    job.status = JobStatus::Cancelled;
                    cancelled = true;
                    break;
                }
            }
        }

        self.set_state(if cancelled {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        });
        Ok(self.build_report(&jobs, &failed_passes, started_at, cancelled))
    }

    fn validate_job(&self, job: &Job) -> Result<(), BatchError> {
        fs::File::open(&job.input_path).map_err(|e| BatchError::UnreadableInput {
            path: job.input_path.clone(),
            reason: e.to_string(),
        })?;

        if job.output_path == job.input_path {
            return Err(BatchError::DestinationIsSource(job.output_path.clone()));
        }
        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(BatchError::MissingDestination(parent.to_path_buf()));
            }
        }

        if let Some(range) = self.options.time_range() {
            match job.duration_s {
                // Small slack for container rounding
                Some(duration_s) if range.end_s() > duration_s + 0.001 => {
                    return Err(BatchError::TimeRangeBeyondDuration {
                        path: job.input_path.clone(),
                        end_s: range.end_s(),
                        duration_s,
                    });
                }
                Some(_) => {}
                None => warn!(
                    file = %job.input_path.display(),
                    "duration unknown, time range not checked"
                ),
            }
        }
        Ok(())
    }

    fn encode_job(&mut self, job: &mut Job, plan: &EncodePlan) -> JobOutcome {
        let commands = plan.commands();
        let pass_count = commands.len();
        job.status = JobStatus::Running;
        job.progress_pct = 0.0;
        self.send(WorkerMessage::JobStarted {
            job_id: job.id,
            pass_count: pass_count as u8,
        });

        if let Some(dir) = plan.passlog_dir() {
            if let Err(e) = fs::create_dir_all(dir) {
                return JobOutcome::Failed {
                    error: format!("Failed to create pass log directory {}: {e}", dir.display()),
                    pass: None,
                };
            }
        }

        // A time range shortens what FFmpeg actually encodes
        let basis = self
            .options
            .time_range()
            .map(|r| r.duration_s)
            .or(job.duration_s);

        // Only output this job wrote may be removed on failure
        let preexisting = job.output_path.exists() && !self.options.overwrite();
        let mut wrote_output = false;

        let mut outcome = JobOutcome::Done;
        for (idx, command) in commands.iter().enumerate() {
            let pass = command.pass.unwrap_or(1);
            wrote_output |= command.pass != Some(1);
            self.state = BatchState::Encoding {
                job_id: job.id,
                pass,
                pass_count: pass_count as u8,
            };
            self.send(WorkerMessage::StateChanged(self.state.clone()));
            job.current_pass = Some(pass);

            let tx = self.tx.clone();
            let job_id = job.id;
            let mut last = ProgressParser::new();
            let mut on_progress = |parser: &ProgressParser| {
                let pct = overall_progress(idx, pass_count, parser.progress_pct(basis));
                last = parser.clone();
                let _ = tx.send(WorkerMessage::ProgressUpdate {
                    job_id,
                    pass,
                    progress_pct: pct,
                    out_time_s: parser.out_time_s(),
                    fps: parser.fps,
                    speed: parser.speed,
                    bitrate_kbps: parser.bitrate_kbps,
                    size_bytes: parser.total_size,
                });
            };

            let result = self.runner.run(command, &self.cancel, &mut on_progress);
            let pct = overall_progress(idx, pass_count, last.progress_pct(basis));
            job.apply_progress(&last, pct);

            let pass_tag = (pass_count > 1).then_some(pass);
            match result {
                Ok(run) if run.cancelled => {
                    outcome = JobOutcome::Cancelled;
                    break;
                }
                Ok(run) if run.success => {}
                Ok(run) => {
                    let prefix = pass_tag.map(|p| format!(" (pass {p})")).unwrap_or_default();
                    outcome = JobOutcome::Failed {
                        error: format!(
                            "Encoding failed{prefix} with exit code {}\n{}",
                            run.exit_code
                                .map(|c| c.to_string())
                                .unwrap_or_else(|| "none".to_string()),
                            run.stderr_tail(10)
                        ),
                        pass: pass_tag,
                    };
                    break;
                }
                Err(e) => {
                    outcome = JobOutcome::Failed {
                        error: format!("{e:#}"),
                        pass: pass_tag,
                    };
                    break;
                }
            }
        }

        if let JobOutcome::Done = outcome {
            if self.options.kind() != EncodeKind::SaveImages && !job.output_path.exists() {
                outcome = JobOutcome::Failed {
                    error: "Output file not created".to_string(),
                    pass: None,
                };
            } else {
                job.progress_pct = 100.0;
            }
        }

        if let JobOutcome::Failed { .. } = outcome {
            if wrote_output && !preexisting {
                self.remove_partial_output(job);
            }
        }
        if let Some(dir) = plan.passlog_dir() {
            if let Err(e) = fs::remove_dir_all(dir) {
                debug!(dir = %dir.display(), error = %e, "pass log cleanup failed");
            }
        }
        job.current_pass = None;
        outcome
    }

    /// Partial files from a failed encode are removed; a cancelled one is kept.
    fn remove_partial_output(&self, job: &Job) {
        if self.options.kind() == EncodeKind::SaveImages
            || job.output_path == Path::new(null_output_target())
            || !job.output_path.is_file()
        {
            return;
        }
        match fs::remove_file(&job.output_path) {
            Ok(()) => debug!(file = %job.output_path.display(), "removed partial output"),
            Err(e) => warn!(
                file = %job.output_path.display(),
                error = %e,
                "could not remove partial output"
            ),
        }
    }

    fn build_report(
        &self,
        jobs: &[Job],
        failed_passes: &HashMap<Uuid, u8>,
        started_at: chrono::DateTime<Local>,
        cancelled: bool,
    ) -> BatchReport {
        let analysis = self.options.analysis();
        let entries = jobs
            .iter()
            .map(|job| {
                let mut entry = JobReport::from_job(job);
                entry.failed_pass = failed_passes.get(&job.id).copied();
                entry.normalization = analysis
                    .and_then(|cache| cache.get(&job.input_path))
                    .map(|a| a.message.clone());
                entry
            })
            .collect();
        BatchReport::new(entries, started_at, cancelled)
    }

    fn finish_log(&self, report: &BatchReport) {
        let Some(dir) = &self.log_dir else {
            return;
        };
        match write_batch_log(dir, &report.to_log_text()) {
            Ok(path) => debug!(log = %path.display(), "batch report written"),
            Err(e) => warn!(error = %e, "could not write batch log"),
        }
    }
}

/// A batch running on its worker thread.
pub struct BatchHandle {
    pub events: Receiver<WorkerMessage>,
    pub cancel: CancelToken,
    join: JoinHandle<Result<BatchReport, BatchError>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<BatchReport, BatchError> {
        self.join.join().map_err(|_| BatchError::WorkerPanicked)?
    }
}

/// Start the sequencer on one worker thread.
pub fn spawn_batch<R>(
    options: OptionsModel,
    jobs: Vec<Job>,
    runner: R,
    cancel: CancelToken,
    log_dir: Option<PathBuf>,
) -> BatchHandle
where
    R: ProcessRunner + 'static,
{
    let (tx, rx) = mpsc::channel();
    let mut sequencer = BatchSequencer::new(options, runner, tx).with_cancel(cancel.clone());
    if let Some(dir) = log_dir {
        sequencer = sequencer.with_log_dir(dir);
    }
    let join = thread::spawn(move || sequencer.run(jobs));
    BatchHandle {
        events: rx,
        cancel,
        join,
    }
}
