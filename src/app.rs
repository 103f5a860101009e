use crate::cli::{Cli, Commands, EncodeArgs, NormalizeArg};
use anyhow::{Context, Result, bail};
use ffbatch::config::Config;
use ffbatch::engine::{
    self, AudioCodec, BatchState, BitDepth, CancelToken, FfmpegRunner, Job, JobStatus,
    NormalizationMode, OptionsModel, PassMode, StreamMap, TimeRange, WorkerMessage,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;

pub fn run(cli: Cli) {
    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "config unreadable, using defaults");
        Config::default()
    });

    let result = match cli.command {
        Commands::CheckFfmpeg => handle_check_ffmpeg(&config),
        Commands::Probe { file } => handle_probe(&config, &file),
        Commands::Containers => {
            handle_containers();
            Ok(())
        }
        Commands::Analyze {
            inputs,
            mode,
            target,
        } => handle_analyze(&config, &inputs, mode, target),
        Commands::DryRun(args) => handle_dry_run(&config, &args),
        Commands::Encode { args, report } => handle_encode(&config, &args, report.as_deref()),
        Commands::InitConfig => handle_init_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn handle_check_ffmpeg(config: &Config) -> Result<()> {
    let version = engine::tool_version(&config.paths.ffmpeg)?;
    println!("ffmpeg found: {}", version);
    let probe_version = engine::tool_version(&config.paths.ffprobe)?;
    println!("ffprobe found: {}", probe_version);

    let mut codecs: Vec<&str> = engine::CONTAINERS
        .iter()
        .map(|c| c.video_codec)
        .filter(|c| !c.is_empty() && *c != "copy")
        .collect();
    codecs.sort_unstable();
    codecs.dedup();
    for codec in codecs {
        let state = if engine::encoder_available(&config.paths.ffmpeg, codec) {
            "available"
        } else {
            "MISSING"
        };
        println!("  {:<12} {}", codec, state);
    }
    Ok(())
}

fn handle_probe(config: &Config, file: &Path) -> Result<()> {
    let duration = engine::probe_duration(&config.paths.ffprobe, file)?;
    println!("Duration: {:.2} seconds", duration);
    Ok(())
}

fn handle_containers() {
    for spec in engine::CONTAINERS {
        let audio: Vec<&str> = engine::audio_codecs_for(spec.extension)
            .iter()
            .map(|c| c.label())
            .collect();
        let codec = if spec.video_codec.is_empty() {
            "-"
        } else {
            spec.video_codec
        };
        println!(
            "{:<24} {:<12} .{:<5} audio: {}",
            spec.id,
            codec,
            spec.extension,
            if audio.is_empty() {
                "none".to_string()
            } else {
                audio.join(", ")
            }
        );
    }
}

/// Expand directories into the video files below them.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(engine::scan(input)?);
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        bail!("No video files found");
    }
    Ok(files)
}

fn handle_analyze(
    config: &Config,
    inputs: &[PathBuf],
    mode: NormalizeArg,
    target: Option<f64>,
) -> Result<()> {
    let files = collect_inputs(inputs)?;
    let mode = NormalizationMode::from(mode);
    let target_db = target.unwrap_or_else(|| default_target(config, mode));

    let mut options = OptionsModel::new();
    options.set_normalization(mode, target_db)?;

    let mut runner = FfmpegRunner::with_program(&config.paths.ffmpeg);
    let cancel = install_cancel_handler()?;
    let cache = engine::analyze(&files, options.normalization(), &mut runner, &cancel)?;

    for result in cache.results() {
        println!("{}", result.path.display());
        println!("    {}", result.message);
        if let Some(fragment) = result.fragment() {
            println!("    -af {}", fragment);
        }
    }
    Ok(())
}

fn default_target(config: &Config, mode: NormalizationMode) -> f64 {
    match mode {
        NormalizationMode::Peak => config.defaults.normalization_target,
        other => other.default_target(),
    }
}

/// Options from the snapshot (or config defaults) with every flag applied
/// through the model's setters.
fn build_options(config: &Config, args: &EncodeArgs) -> Result<OptionsModel> {
    let mut options = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<OptionsModel>(&text)
                .with_context(|| format!("Failed to parse options snapshot {}", path.display()))?
        }
        None => config.options_model()?,
    };

    if let Some(container) = &args.container {
        options.set_container(container)?;
    }
    if let Some(ext) = &args.ext {
        options.set_output_extension(ext)?;
    }
    if let Some(kbps) = args.bitrate {
        options.set_bitrate(kbps)?;
    }
    if let Some(crf) = args.crf {
        options.set_crf(crf)?;
    }
    if args.two_pass {
        options.set_pass_mode(PassMode::TwoPass)?;
    }
    if args.preset.is_some() {
        options.set_preset(args.preset.as_deref())?;
    }
    if args.profile.is_some() {
        options.set_profile(args.profile.as_deref())?;
    }
    if args.tune.is_some() {
        options.set_tune(args.tune.as_deref())?;
    }
    if args.pix_fmt.is_some() {
        options.set_pixel_format(args.pix_fmt.as_deref());
    }
    if args.aspect.is_some() {
        options.set_aspect(args.aspect.as_deref())?;
    }
    if args.fps.is_some() {
        options.set_frame_rate(args.fps.as_deref())?;
    }

    if let Some(crop) = &args.crop {
        options.set_crop(Some(crop.parse()?));
    }
    if let Some(scale) = &args.scale {
        options.set_scale(Some(scale.parse()?))?;
    }
    if let Some(rotate) = &args.rotate {
        options.set_rotation(Some(rotate.parse()?));
    }
    if let Some(deinterlace) = &args.deinterlace {
        options.set_deinterlace(deinterlace.parse()?);
    }
    if let Some(interlace) = &args.interlace {
        options.set_interlace(interlace.parse()?);
    }
    if let Some(denoise) = &args.denoise {
        options.set_denoise(Some(denoise.parse()?));
    }

    if let Some(label) = &args.audio {
        let codec = AudioCodec::from_label(label)
            .with_context(|| format!("Unknown audio codec '{}'", label))?;
        options.set_audio_codec(codec)?;
    }
    if args.audio_bitrate.is_some() {
        options.set_audio_bitrate(args.audio_bitrate)?;
    }
    if args.audio_rate.is_some() {
        options.set_audio_rate(args.audio_rate)?;
    }
    if args.audio_channels.is_some() {
        options.set_audio_channels(args.audio_channels)?;
    }
    if let Some(depth) = &args.bit_depth {
        options.set_audio_bit_depth(Some(depth.parse::<BitDepth>()?))?;
    }
    if let Some(mode) = args.normalize {
        let mode = NormalizationMode::from(mode);
        let target = args.target.unwrap_or_else(|| default_target(config, mode));
        options.set_normalization(mode, target)?;
    }

    if args.threads.is_some() {
        options.set_threads(args.threads);
    }
    if args.cpu_used.is_some() {
        options.set_cpu_used(args.cpu_used)?;
    }
    if args.map_all {
        options.set_stream_map(StreamMap::All);
    } else if let Some(track) = args.audio_track {
        options.set_stream_map(StreamMap::AudioTrack(track));
    }
    if let Some(duration) = &args.duration {
        let start = args
            .start
            .as_deref()
            .map(engine::parse_timestamp)
            .transpose()?
            .unwrap_or(0.0);
        let duration = engine::parse_timestamp(duration)?;
        options.set_time_range(Some(TimeRange::new(start, duration)?));
    }
    if args.overwrite {
        options.set_overwrite(true);
    }
    if let Some(level) = &args.loglevel {
        options.set_loglevel(level)?;
    }

    Ok(options)
}

fn build_jobs(config: &Config, args: &EncodeArgs, options: &OptionsModel) -> Result<Vec<Job>> {
    let files = collect_inputs(&args.inputs)?;
    let output_dir = args
        .output_dir
        .as_deref()
        .or(config.defaults.output_dir.as_deref());
    let pattern = args
        .pattern
        .as_deref()
        .unwrap_or(config.defaults.filename_pattern.as_str());
    Ok(engine::build_job_queue(
        files,
        options,
        output_dir,
        Some(pattern),
        &config.paths.ffprobe,
    ))
}

fn handle_dry_run(config: &Config, args: &EncodeArgs) -> Result<()> {
    let options = build_options(config, args)?;
    let jobs = build_jobs(config, args, &options)?;

    if options.normalization().mode.needs_analysis() && options.analysis().is_none() {
        println!("# volume analysis runs at encode time; -af volume=... is not shown");
    }

    for job in &jobs {
        if job.status == JobStatus::Skipped {
            println!("# skipped (output exists): {}", job.output_path.display());
            continue;
        }
        let plan = engine::synthesize(&options, job)?;
        println!("{}\n", plan.display());
    }
    Ok(())
}

/// Ctrl+C raises the token, which kills the running ffmpeg.
fn install_cancel_handler() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(cancel)
}

fn handle_encode(config: &Config, args: &EncodeArgs, report_path: Option<&Path>) -> Result<()> {
    let options = build_options(config, args)?;
    let jobs = build_jobs(config, args, &options)?;
    let names: HashMap<_, _> = jobs
        .iter()
        .map(|j| (j.id, j.input_path.display().to_string()))
        .collect();

    let log_dir = match args.output_dir.as_ref().or(config.defaults.output_dir.as_ref()) {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let cancel = install_cancel_handler()?;
    let runner = FfmpegRunner::with_program(&config.paths.ffmpeg);
    let handle = engine::spawn_batch(options, jobs, runner, cancel, Some(log_dir));

    for msg in handle.events.iter() {
        match msg {
            WorkerMessage::BatchStarted { total_jobs } => {
                println!("Batch: {} job(s)", total_jobs);
            }
            WorkerMessage::StateChanged(BatchState::AnalyzingAudio { done, total }) => {
                print!("\rAnalyzing audio {}/{}", done, total);
                std::io::stdout().flush().ok();
            }
            WorkerMessage::StateChanged(_) => {}
            WorkerMessage::AnalysisNotice { path, message, .. } => {
                println!("\n{}: {}", path.display(), message);
            }
            WorkerMessage::JobStarted { job_id, pass_count } => {
                let name = names.get(&job_id).map(String::as_str).unwrap_or("?");
                if pass_count > 1 {
                    println!("Encoding ({} passes): {}", pass_count, name);
                } else {
                    println!("Encoding: {}", name);
                }
            }
            WorkerMessage::ProgressUpdate {
                pass,
                progress_pct,
                fps,
                speed,
                ..
            } => {
                print!("\rPass {} | Progress: {:.1}%", pass, progress_pct);
                if let Some(fps) = fps {
                    print!(" | FPS: {:.1}", fps);
                }
                if let Some(speed) = speed {
                    print!(" | Speed: {:.2}x", speed);
                }
                std::io::stdout().flush().ok();
            }
            WorkerMessage::JobCompleted { .. } => println!("\n✓ Completed"),
            WorkerMessage::JobFailed { error, .. } => println!("\n✗ {}", error),
            WorkerMessage::BatchCompleted { .. } | WorkerMessage::BatchFailed { .. } => {}
        }
    }

    let report = handle.wait()?;
    println!("\n{}", report.summary());
    if let Some(path) = report_path {
        report.save_json(path)?;
        println!("Report written to {}", path.display());
    }
    if !report.is_success() {
        process::exit(1);
    }
    Ok(())
}

fn handle_init_config() -> Result<()> {
    if Config::exists() {
        let cfg = Config::load()?;
        println!(
            "Config loaded successfully from {}",
            Config::config_path()?.display()
        );
        println!("{:#?}", cfg);
    } else {
        Config::default().save()?;
        println!("Default config saved to {}", Config::config_path()?.display());
    }
    Ok(())
}
