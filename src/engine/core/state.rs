use super::types::{Job, JobStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where the batch sequencer is.
///
/// `Idle -> Validating -> AnalyzingAudio? -> Encoding* -> Completed | Failed | Cancelled`
#[derive(Debug, Clone, PartialEq)]
pub enum BatchState {
    Idle,
    Validating,
    AnalyzingAudio { done: usize, total: usize },
    Encoding { job_id: Uuid, pass: u8, pass_count: u8 },
    Completed,
    Failed(String),
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::Failed(_) | BatchState::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(&self, next: &BatchState) -> bool {
        use BatchState::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, AnalyzingAudio { .. } | Encoding { .. } | Completed | Failed(_)) => true,
            (AnalyzingAudio { .. }, AnalyzingAudio { .. } | Encoding { .. } | Completed) => true,
            (Encoding { .. }, Encoding { .. } | Completed) => true,
            (Validating | AnalyzingAudio { .. } | Encoding { .. }, Cancelled) => true,
            (AnalyzingAudio { .. }, Failed(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Idle => write!(f, "idle"),
            BatchState::Validating => write!(f, "validating"),
            BatchState::AnalyzingAudio { done, total } => {
                write!(f, "analyzing audio {}/{}", done, total)
            }
            BatchState::Encoding {
                pass, pass_count, ..
            } => write!(f, "encoding (pass {}/{})", pass, pass_count),
            BatchState::Completed => write!(f, "completed"),
            BatchState::Failed(reason) => write!(f, "failed: {}", reason),
            BatchState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: JobStatus,
    pub failed_pass: Option<u8>,
    pub error: Option<String>,
    /// Normalization status for the file, if analysis ran
    pub normalization: Option<String>,
}

impl JobReport {
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id,
            input_path: job.input_path.clone(),
            output_path: job.output_path.clone(),
            status: job.status,
            failed_pass: None,
            error: job.last_error.clone(),
            normalization: None,
        }
    }
}

/// Consolidated outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub cancelled: bool,
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn new(jobs: Vec<JobReport>, started_at: DateTime<Local>, cancelled: bool) -> Self {
        Self {
            started_at,
            finished_at: Local::now(),
            cancelled,
            jobs,
        }
    }

    fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(JobStatus::Done)
    }

    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(JobStatus::Skipped)
    }

    /// Jobs never dispatched (cancellation) plus the one interrupted
    pub fn not_run(&self) -> usize {
        self.count(JobStatus::Pending) + self.count(JobStatus::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed() == 0
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} done, {} failed, {} skipped",
            self.completed(),
            self.failed(),
            self.skipped()
        );
        if self.cancelled {
            line.push_str(&format!(", {} not run (cancelled)", self.not_run()));
        }
        line
    }

    /// Multi-line text for the batch log.
    pub fn to_log_text(&self) -> String {
        let mut text = format!(
            "=== Batch {} -> {} ===\n{}\n",
            self.started_at.format("%H:%M:%S"),
            self.finished_at.format("%H:%M:%S"),
            self.summary()
        );
        for job in &self.jobs {
            text.push_str(&format!(
                "{:?}: {} -> {}",
                job.status,
                job.input_path.display(),
                job.output_path.display()
            ));
            if let Some(pass) = job.failed_pass {
                text.push_str(&format!(" (pass {})", pass));
            }
            if let Some(norm) = &job.normalization {
                text.push_str(&format!("\n    audio: {}", norm));
            }
            if let Some(err) = &job.error {
                for line in err.lines() {
                    text.push_str(&format!("\n    {}", line));
                }
            }
            text.push('\n');
        }
        text
    }

    /// Write the report as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .context("Failed to write report")?;
        Ok(())
    }
}
