use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    /// Output exists and overwrite is off
    Skipped,
    /// Stopped mid-run by the user
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub input_path: PathBuf,
    /// Output file, or the destination directory / `%06d` pattern for image extraction
    pub output_path: PathBuf,
    pub status: JobStatus,

    // Derived / runtime
    pub duration_s: Option<f64>,
    pub progress_pct: f64,
    pub out_time_s: f64,
    pub current_pass: Option<u8>,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub bitrate_kbps: Option<f64>,
    pub size_bytes: Option<u64>,

    pub last_error: Option<String>,
}

impl Job {
    /// Create a new pending job
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_path,
            output_path,
            status: JobStatus::Pending,
            duration_s: None,
            progress_pct: 0.0,
            out_time_s: 0.0,
            current_pass: None,
            fps: None,
            speed: None,
            bitrate_kbps: None,
            size_bytes: None,
            last_error: None,
        }
    }

    pub fn with_duration(mut self, duration_s: Option<f64>) -> Self {
        self.duration_s = duration_s;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }

    /// Copy live stats from a progress block.
    pub fn apply_progress(&mut self, parser: &ProgressParser, progress_pct: f64) {
        self.out_time_s = parser.out_time_s();
        self.progress_pct = progress_pct;
        self.fps = parser.fps;
        self.speed = parser.speed;
        self.bitrate_kbps = parser.bitrate_kbps;
        self.size_bytes = parser.total_size;
    }
}

/// Parser for ffmpeg progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub out_time_us: u64,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub bitrate_kbps: Option<f64>,
    pub total_size: Option<u64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of ffmpeg progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            match key.trim() {
                "out_time_us" => {
                    if let Ok(us) = value.parse::<u64>() {
                        self.out_time_us = us;
                    }
                }
                "fps" => {
                    if let Ok(f) = value.parse::<f64>() {
                        self.fps = Some(f);
                    }
                }
                "speed" => {
                    // "1.23x"
                    if let Ok(s) = value.trim_end_matches('x').parse::<f64>() {
                        self.speed = Some(s);
                    }
                }
                "bitrate" => {
                    // "123.4kbits/s", or "N/A" before the first packet
                    if let Ok(b) = value.trim_end_matches("kbits/s").parse::<f64>() {
                        self.bitrate_kbps = Some(b);
                    }
                }
                "total_size" => {
                    if let Ok(size) = value.parse::<u64>() {
                        self.total_size = Some(size);
                    }
                }
                "progress" => {
                    if value == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Percentage of `duration_s` covered so far, clamped to 100
    pub fn progress_pct(&self, duration_s: Option<f64>) -> f64 {
        match duration_s {
            Some(dur) if dur > 0.0 => (self.out_time_s() / dur * 100.0).min(100.0),
            _ => 0.0,
        }
    }
}

/// Map a pass-local percentage onto the job's overall 0-100 range.
/// Pass 1 of 2 covers 0-50, pass 2 covers 50-100.
pub fn overall_progress(pass_index: usize, pass_count: usize, pass_pct: f64) -> f64 {
    if pass_count <= 1 {
        return pass_pct;
    }
    let span = 100.0 / pass_count as f64;
    span * pass_index as f64 + pass_pct * span / 100.0
}
