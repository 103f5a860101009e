// Volume analysis, gain offsets and their path into -af

use ffbatch::engine::analyze::{compute_gain, parse_volumedetect};
use ffbatch::engine::{
    AnalysisError, AudioCodec, CancelToken, ConfigError, NormalizationMode, OptionsModel,
    RunOutcome, VolumeStats, analyze, synthesize,
};
use std::path::PathBuf;

use crate::common::helpers::*;

fn files() -> Vec<PathBuf> {
    vec![PathBuf::from("/media/b.mp4"), PathBuf::from("/media/a.mp4")]
}

fn peak_options(target: f64) -> OptionsModel {
    let mut options = OptionsModel::new();
    options
        .set_normalization(NormalizationMode::Peak, target)
        .unwrap();
    options
}

#[test]
fn test_offset_sign_follows_target() {
    let quiet = VolumeStats {
        max_db: -12.0,
        mean_db: -30.0,
    };
    assert_eq!(compute_gain(&quiet, NormalizationMode::Peak, -1.0), Some(11.0));
    assert_eq!(compute_gain(&quiet, NormalizationMode::Rms, -20.0), Some(10.0));

    // Never attenuate
    let loud = VolumeStats {
        max_db: -0.5,
        mean_db: -14.0,
    };
    assert_eq!(compute_gain(&loud, NormalizationMode::Peak, -1.0), None);
    assert_eq!(compute_gain(&loud, NormalizationMode::Rms, -20.0), None);
}

#[test]
fn test_silent_file_gets_no_gain() {
    let stats = parse_volumedetect("mean_volume: -inf dB\nmax_volume: -inf dB\n").unwrap();
    assert_eq!(compute_gain(&stats, NormalizationMode::Peak, -1.0), None);
}

#[test]
fn test_analysis_feeds_per_file_audio_filter() {
    let options = peak_options(-1.0);
    let mut runner = ScriptedRunner::with_outcomes([
        RunOutcome::succeeded(volumedetect_report(-6.0, -20.0)),
        RunOutcome::succeeded(volumedetect_report(0.0, -10.0)),
    ]);
    let calls = runner.calls();

    let cache = analyze(
        &files(),
        options.normalization(),
        &mut runner,
        &CancelToken::new(),
    )
    .unwrap();

    // One volumedetect run per file, in sorted order
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].flag_value("-i"), Some("/media/a.mp4"));
    assert_eq!(calls[0].flag_value("-af"), Some("volumedetect"));
    assert_eq!(calls[1].flag_value("-i"), Some("/media/b.mp4"));

    let mut options = options;
    options.set_analysis(cache);
    options.validate_for_encode(&files()).unwrap();

    let a = synthesize(&options, &job("/media/a.mp4", "/out/a.mkv")).unwrap();
    assert_eq!(a.commands()[0].flag_value("-af"), Some("volume=5.0dB"));

    let b = synthesize(&options, &job("/media/b.mp4", "/out/b.mkv")).unwrap();
    assert!(!b.commands()[0].has_flag("-af"));

    let messages: Vec<&str> = options
        .analysis()
        .unwrap()
        .results()
        .map(|r| r.message.as_str())
        .collect();
    assert!(messages[1].starts_with("volume unchanged"));
}

#[test]
fn test_failed_analysis_is_reported_per_file() {
    let mut runner = ScriptedRunner::with_outcomes([
        RunOutcome::failed(1, "a.mp4: Invalid data found when processing input"),
        RunOutcome::succeeded(volumedetect_report(-9.5, -25.0)),
    ]);
    let cache = analyze(
        &files(),
        peak_options(-1.0).normalization(),
        &mut runner,
        &CancelToken::new(),
    )
    .unwrap();

    let a = cache.get(&PathBuf::from("/media/a.mp4")).unwrap();
    assert!(matches!(a.stats, Err(AnalysisError::ProcessFailed { .. })));
    assert_eq!(a.fragment(), None);
    assert_eq!(
        cache.fragment_for(&PathBuf::from("/media/b.mp4")).as_deref(),
        Some("volume=8.5dB")
    );
}

#[test]
fn test_cancel_aborts_analysis() {
    let mut runner = ScriptedRunner::new().cancel_on_call(1);
    let result = analyze(
        &files(),
        peak_options(-1.0).normalization(),
        &mut runner,
        &CancelToken::new(),
    );
    assert_eq!(result, Err(AnalysisError::Cancelled));
}

#[test]
fn test_changing_target_invalidates_analysis() {
    let mut options = peak_options(-1.0);
    let mut runner = ScriptedRunner::with_outcomes([
        RunOutcome::succeeded(volumedetect_report(-6.0, -20.0)),
        RunOutcome::succeeded(volumedetect_report(-6.0, -20.0)),
    ]);
    let cache = analyze(
        &files(),
        options.normalization(),
        &mut runner,
        &CancelToken::new(),
    )
    .unwrap();
    options.set_analysis(cache);
    assert!(options.validate_for_encode(&files()).is_ok());

    options
        .set_normalization(NormalizationMode::Peak, -3.0)
        .unwrap();
    assert!(options.analysis().is_none());
    assert_eq!(
        options.validate_for_encode(&files()),
        Err(ConfigError::AnalysisMissing)
    );
}

#[test]
fn test_changing_file_set_makes_analysis_stale() {
    let mut options = peak_options(-1.0);
    let mut runner = ScriptedRunner::new();
    let cache = analyze(
        &files(),
        options.normalization(),
        &mut runner,
        &CancelToken::new(),
    )
    .unwrap();
    options.set_analysis(cache);

    let mut more = files();
    more.push(PathBuf::from("/media/c.mp4"));
    assert_eq!(
        options.validate_for_encode(&more),
        Err(ConfigError::AnalysisStale)
    );
}

#[test]
fn test_ebu_uses_loudnorm_without_analysis() {
    let mut options = OptionsModel::new();
    options
        .set_normalization(NormalizationMode::Ebu, -16.0)
        .unwrap();

    let mut runner = ScriptedRunner::new();
    let calls = runner.calls();
    let cache = analyze(
        &files(),
        options.normalization(),
        &mut runner,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(cache.results().count(), 0);

    let plan = synthesize(&options, &job("/media/a.mp4", "/out/a.mkv")).unwrap();
    assert_eq!(
        plan.commands()[0].flag_value("-af"),
        Some("loudnorm=I=-16:TP=-1.5:LRA=11")
    );
}

#[test]
fn test_copied_audio_turns_normalization_off() {
    let mut options = peak_options(-1.0);
    options.set_audio_codec(AudioCodec::Copy).unwrap();
    assert_eq!(options.normalization().mode, NormalizationMode::Off);

    assert!(matches!(
        options.set_normalization(NormalizationMode::Rms, -20.0),
        Err(ConfigError::NormalizationUnavailable(AudioCodec::Copy))
    ));
}

#[test]
fn test_threshold_range_is_checked() {
    let mut options = OptionsModel::new();
    assert_eq!(
        options.set_normalization(NormalizationMode::Peak, 3.0),
        Err(ConfigError::InvalidThreshold(3.0))
    );
    assert!(
        options
            .set_normalization(NormalizationMode::Peak, f64::NAN)
            .is_err()
    );
}
