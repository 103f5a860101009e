// Options snapshot -> FFmpeg argument lists

use ffbatch::engine::{
    AudioCodec, BitDepth, COPY_VIDEO_CODEC, ConfigError, EncodePlan, NormalizationMode,
    OptionsModel, PassMode, SAVE_IMAGES, StreamMap, TimeRange, null_output_target, synthesize,
};

use crate::common::assertions::*;
use crate::common::helpers::*;

fn single(options: &OptionsModel) -> String {
    let plan = synthesize(options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert_eq!(plan.pass_count(), 1);
    plan.commands()[0].display()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_mkv_h264_crf_single_pass() {
    let cmd = single(&crf_options(23));

    assert_cmd_has_flag_value(&cmd, "-c:v", "libx264");
    assert_cmd_has_flag_value(&cmd, "-crf", "23");
    assert_cmd_not_contains(&cmd, "-b:v");
    assert_cmd_not_contains(&cmd, "-vf");
    assert_cmd_not_contains(&cmd, "-pass");
    assert!(cmd.ends_with("/media/out.mkv"));
}

#[test]
fn test_two_pass_bitrate_produces_two_commands() {
    let options = two_pass_options(1500);
    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert_eq!(plan.pass_count(), 2);

    let commands = plan.commands();
    let first = commands[0].display();
    let second = commands[1].display();

    assert_cmd_has_flag_value(&first, "-pass", "1");
    assert_cmd_contains(&first, " -an ");
    assert_cmd_has_flag_value(&first, "-f", "rawvideo");
    assert_cmd_not_contains(&first, "-crf");
    assert_eq!(commands[0].output(), Some(null_output_target()));

    assert_cmd_has_flag_value(&second, "-pass", "2");
    assert_cmd_has_flag_value(&second, "-b:v", "1500k");
    assert!(second.ends_with("/media/out.mkv"));
}

#[test]
fn test_copy_video_codec_keeps_only_stream_flags() {
    let mut options = OptionsModel::new();
    options.set_container(COPY_VIDEO_CODEC).unwrap();
    options.set_audio_codec(AudioCodec::Aac).unwrap();
    options.set_audio_bitrate(Some(192)).unwrap();
    options.set_aspect(Some("16:9")).unwrap();
    options.set_frame_rate(Some("25")).unwrap();
    options.set_crop(Some("crop=640:480".parse().unwrap()));

    let cmd = single(&options);

    assert_cmd_has_flag_value(&cmd, "-c:v", "copy");
    assert_cmd_has_flag_value(&cmd, "-c:a", "aac");
    assert_cmd_has_flag_value(&cmd, "-b:a", "192k");
    assert_cmd_has_flag_value(&cmd, "-aspect", "16:9");
    assert_cmd_has_flag_value(&cmd, "-r", "25");
    for absent in ["-b:v", "-crf", "-preset", "-vf", "-threads", "-pass"] {
        assert_cmd_not_contains(&cmd, absent);
    }
}

#[test]
fn test_copy_mode_rejects_rate_control_and_two_pass() {
    let mut options = OptionsModel::new();
    options.set_container(COPY_VIDEO_CODEC).unwrap();
    assert!(matches!(
        options.set_crf(23),
        Err(ConfigError::RateControlUnavailable(_))
    ));
    assert!(matches!(
        options.set_pass_mode(PassMode::TwoPass),
        Err(ConfigError::TwoPassUnavailable(_))
    ));
}

// ============================================================================
// Two-pass invariants
// ============================================================================

#[test]
fn test_two_pass_commands_share_encoding_settings() {
    let mut options = two_pass_options(2500);
    options.set_preset(Some("slow")).unwrap();
    options.set_scale(Some("scale=w=1280:h=-2".parse().unwrap())).unwrap();
    options
        .set_time_range(Some(TimeRange::new(60.0, 30.0).unwrap()));
    options.set_threads(Some(4));

    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    let EncodePlan::TwoPass {
        first,
        second,
        passlog,
    } = &plan
    else {
        panic!("expected a two-pass plan");
    };

    for flag in ["-c:v", "-b:v", "-preset", "-vf", "-ss", "-t", "-threads"] {
        assert_eq!(
            first.flag_value(flag),
            second.flag_value(flag),
            "{flag} differs between passes"
        );
    }
    let log = passlog.display().to_string();
    assert_eq!(first.flag_value("-passlogfile"), Some(log.as_str()));
    assert_eq!(second.flag_value("-passlogfile"), Some(log.as_str()));
    assert_eq!(first.pass, Some(1));
    assert_eq!(second.pass, Some(2));
    assert_eq!(plan.passlog_dir(), passlog.parent());
}

#[test]
fn test_two_pass_first_pass_drops_audio_settings() {
    let mut options = two_pass_options(1500);
    options.set_audio_codec(AudioCodec::Opus).unwrap();
    options.set_audio_bitrate(Some(128)).unwrap();
    options.set_stream_map(StreamMap::All);

    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    let commands = plan.commands();
    assert!(!commands[0].has_flag("-c:a"));
    assert_eq!(commands[0].flag_values("-map"), vec!["0:v?"]);
    assert_eq!(commands[1].flag_value("-c:a"), Some("libopus"));
    assert_eq!(commands[1].flag_values("-map"), vec!["0"]);
}

#[test]
fn test_two_pass_without_rate_control_is_rejected() {
    let mut options = OptionsModel::new();
    options.set_pass_mode(PassMode::TwoPass).unwrap();
    let result = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv"));
    assert_eq!(result, Err(ConfigError::TwoPassNeedsRateControl));
}

#[test]
fn test_container_switch_to_copy_resets_two_pass() {
    let mut options = two_pass_options(1500);
    options.set_container(COPY_VIDEO_CODEC).unwrap();
    assert_eq!(options.pass_mode(), PassMode::OnePass);
    assert_eq!(
        synthesize(&options, &job("/media/in.mp4", "/media/out.mkv"))
            .unwrap()
            .pass_count(),
        1
    );
}

// ============================================================================
// Codec-specific flags
// ============================================================================

#[test]
fn test_vpx_crf_adds_zero_bitrate_and_deadline() {
    let mut options = OptionsModel::new();
    options.set_container("WEBM (vp9)").unwrap();
    options.set_crf(31).unwrap();
    options.set_preset(Some("good")).unwrap();
    options.set_cpu_used(Some(2)).unwrap();

    let cmd = single(&options);
    assert_cmd_has_flag_value(&cmd, "-c:v", "libvpx-vp9");
    assert_cmd_has_flag_value(&cmd, "-crf", "31");
    assert_cmd_has_flag_value(&cmd, "-b:v", "0");
    assert_cmd_has_flag_value(&cmd, "-deadline", "good");
    assert_cmd_has_flag_value(&cmd, "-cpu-used", "2");
    assert_cmd_not_contains(&cmd, "-preset");
}

#[test]
fn test_container_switch_resets_codec_options() {
    let mut options = crf_options(20);
    options.set_preset(Some("slow")).unwrap();
    options.set_tune(Some("film")).unwrap();

    options.set_container("WEBM (vp9)").unwrap();
    assert_eq!(options.preset(), None);
    assert_eq!(options.tune(), None);
    assert_eq!(options.crf(), None);

    // x264 presets mean nothing to libvpx
    assert!(matches!(
        options.set_preset(Some("slow")),
        Err(ConfigError::UnsupportedOption { .. })
    ));
}

#[test]
fn test_audio_choices() {
    let mut options = OptionsModel::new();
    options.set_audio_codec(AudioCodec::NoAudio).unwrap();
    let cmd = single(&options);
    assert_cmd_contains(&cmd, " -an ");
    assert_cmd_not_contains(&cmd, "-c:a");

    options.set_audio_codec(AudioCodec::Wav).unwrap();
    options.set_audio_bit_depth(Some(BitDepth::S24)).unwrap();
    options.set_audio_rate(Some(48000)).unwrap();
    options.set_audio_channels(Some(2)).unwrap();
    let cmd = single(&options);
    assert_cmd_has_flag_value(&cmd, "-c:a", "pcm_s24le");
    assert_cmd_has_flag_value(&cmd, "-ar", "48000");
    assert_cmd_has_flag_value(&cmd, "-ac", "2");

    options.set_audio_codec(AudioCodec::Default).unwrap();
    let cmd = single(&options);
    assert_cmd_not_contains(&cmd, "-c:a");
    assert_cmd_not_contains(&cmd, "-ar");
}

#[test]
fn test_incompatible_audio_is_rejected() {
    let mut options = OptionsModel::new();
    options.set_container("WEBM (vp9)").unwrap();
    assert!(matches!(
        options.set_audio_codec(AudioCodec::Aac),
        Err(ConfigError::IncompatibleAudio { .. })
    ));
}

#[test]
fn test_time_range_precedes_input() {
    let mut options = crf_options(23);
    options.set_time_range(Some("-ss 00:01:00 -t 00:00:30.5".parse().unwrap()));
    let cmd = single(&options);

    assert_cmd_has_flag_value(&cmd, "-ss", "00:01:00.000");
    assert_cmd_has_flag_value(&cmd, "-t", "00:00:30.500");
    assert_flag_order(&cmd, "-ss", "-i ");
}

#[test]
fn test_overwrite_and_loglevel() {
    let mut options = crf_options(23);
    let cmd = single(&options);
    assert_cmd_contains(&cmd, " -n ");
    assert_cmd_has_flag_value(&cmd, "-loglevel", "warning");

    options.set_overwrite(true);
    options.set_loglevel("error").unwrap();
    let cmd = single(&options);
    assert_cmd_contains(&cmd, " -y ");
    assert_cmd_not_contains(&cmd, " -n ");
    assert_cmd_has_flag_value(&cmd, "-loglevel", "error");
    assert_mutually_exclusive(&cmd, &[" -y ", " -n "]);
}

#[test]
fn test_stream_map_audio_track() {
    let mut options = crf_options(23);
    options.set_stream_map(StreamMap::AudioTrack(1));
    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert_eq!(plan.commands()[0].flag_values("-map"), vec!["0:v?", "0:a:1?"]);

    options.set_stream_map(StreamMap::Auto);
    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert!(!plan.commands()[0].has_flag("-map"));
}

#[test]
fn test_two_pass_passes_select_the_same_video_streams() {
    let mut options = two_pass_options(1500);
    options.set_stream_map(StreamMap::AudioTrack(1));
    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    let commands = plan.commands();
    assert_eq!(commands[0].flag_values("-map"), vec!["0:v?"]);
    assert_eq!(commands[1].flag_values("-map"), vec!["0:v?", "0:a:1?"]);
    assert_flag_order(&commands[0].display(), "-map", null_output_target());

    options.set_stream_map(StreamMap::Auto);
    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert!(plan.commands().iter().all(|c| !c.has_flag("-map")));
}

#[test]
fn test_save_images_uses_numbered_pattern() {
    let mut options = OptionsModel::new();
    options.set_container(SAVE_IMAGES).unwrap();

    let plan = synthesize(&options, &job("/media/clip.mp4", "/media/frames")).unwrap();
    let command = plan.commands()[0];
    assert_eq!(command.flag_value("-r"), Some("1"));
    assert!(!command.has_flag("-c:v"));
    assert!(!command.has_flag("-c:a"));
    assert_eq!(command.output(), Some("/media/frames/clip-%06d.png"));

    options.set_frame_rate(Some("0.5")).unwrap();
    let plan = synthesize(&options, &job("/media/clip.mp4", "/media/frames")).unwrap();
    assert_eq!(plan.commands()[0].flag_value("-r"), Some("0.5"));
}

#[test]
fn test_save_images_disables_normalization() {
    let mut options = OptionsModel::new();
    options
        .set_normalization(NormalizationMode::Ebu, -16.0)
        .unwrap();
    options.set_container(SAVE_IMAGES).unwrap();
    assert_eq!(options.normalization().mode, NormalizationMode::Off);
    assert!(matches!(
        options.set_normalization(NormalizationMode::Peak, -1.0),
        Err(ConfigError::NormalizationUnavailable(_))
    ));
}

#[test]
fn test_dry_run_text_splits_back_into_args() {
    let options = crf_options(23);
    let plan = synthesize(&options, &job("/media/my clip.mp4", "/media/my clip.mkv")).unwrap();
    let command = plan.commands()[0];

    let words = shlex::split(&command.display()).expect("display is shell-parsable");
    assert_eq!(words[0], "ffmpeg");
    assert_eq!(&words[1..], command.args.as_slice());
    assert_eq!(command.flag_value("-i"), Some("/media/my clip.mp4"));
}
