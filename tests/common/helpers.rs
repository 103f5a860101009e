#![allow(dead_code)]

use ffbatch::engine::{
    CancelToken, EncoderCommand, Job, OptionsModel, ProcessRunner, ProgressParser, RunOutcome,
    null_output_target,
};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const PROGRESS_BLOCK: &[&str] = &[
    "frame=250",
    "fps=50.0",
    "bitrate=1200.5kbits/s",
    "total_size=1500000",
    "out_time_us=5000000",
    "speed=2.0x",
    "progress=end",
];

/// stderr of a volumedetect run
pub fn volumedetect_report(max_db: f64, mean_db: f64) -> String {
    format!(
        "[Parsed_volumedetect_0 @ 0x5581] n_samples: 882000\n\
         [Parsed_volumedetect_0 @ 0x5581] mean_volume: {mean_db:.1} dB\n\
         [Parsed_volumedetect_0 @ 0x5581] max_volume: {max_db:.1} dB\n\
         [Parsed_volumedetect_0 @ 0x5581] histogram_0db: 10\n"
    )
}

/// Stands in for FFmpeg: replays queued outcomes (default success), records
/// every command, writes the output file on success.
#[derive(Default)]
pub struct ScriptedRunner {
    outcomes: VecDeque<RunOutcome>,
    calls: Arc<Mutex<Vec<EncoderCommand>>>,
    cancel_on_call: Option<usize>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = RunOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Raise the cancel token while the Nth call (1-based) is running.
    pub fn cancel_on_call(mut self, call: usize) -> Self {
        self.cancel_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<EncoderCommand>>> {
        self.calls.clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(
        &mut self,
        command: &EncoderCommand,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&ProgressParser),
    ) -> anyhow::Result<RunOutcome> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(command.clone());
            calls.len()
        };
        if self.cancel_on_call == Some(call) {
            cancel.cancel();
            return Ok(RunOutcome::cancelled());
        }

        let outcome = self
            .outcomes
            .pop_front()
            .unwrap_or_else(|| RunOutcome::succeeded(""));

        let mut parser = ProgressParser::new();
        for line in PROGRESS_BLOCK {
            parser.parse_line(line);
            on_progress(&parser);
        }

        if outcome.success {
            if let Some(out) = command.output() {
                if out != null_output_target() && !out.contains('%') {
                    fs::write(out, b"encoded")?;
                }
            }
        } else if let Some(out) = command.output() {
            // A failing encoder usually leaves a truncated file behind,
            // unless -n made it refuse an existing output
            let refused = command.args.iter().any(|a| a == "-n") && Path::new(out).exists();
            if out != null_output_target() && !out.contains('%') && !refused {
                fs::write(out, b"partial")?;
            }
        }
        Ok(outcome)
    }
}

/// Job with a fixed path pair, for synthesis tests that never touch disk
pub fn job(input: &str, output: &str) -> Job {
    Job::new(PathBuf::from(input), PathBuf::from(output))
}

/// Create `name` with dummy content and a 10 s job writing `<stem>.mkv` next to it
pub fn disk_job(dir: &Path, name: &str) -> Job {
    let input = dir.join(name);
    fs::write(&input, b"source").unwrap();
    let stem = Path::new(name).file_stem().unwrap().to_string_lossy();
    let output = dir.join("out").join(format!("{stem}.mkv"));
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    Job::new(input, output).with_duration(Some(10.0))
}

pub fn crf_options(crf: u32) -> OptionsModel {
    let mut options = OptionsModel::new();
    options.set_crf(crf).unwrap();
    options
}

pub fn two_pass_options(kbps: u32) -> OptionsModel {
    let mut options = OptionsModel::new();
    options.set_bitrate(kbps).unwrap();
    options
        .set_pass_mode(ffbatch::engine::PassMode::TwoPass)
        .unwrap();
    options
}
