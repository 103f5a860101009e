// Filter graph assembly through the options model

use ffbatch::engine::{
    Crop, Deinterlacer, Denoise, Interlace, Lacing, OptionsModel, Rotation, Scale, VideoFilters,
    assemble, synthesize,
};

use crate::common::assertions::*;
use crate::common::helpers::*;

#[test]
fn test_crop_scale_rotate_exact_chain() {
    let mut options = OptionsModel::new();
    options.set_crop(Some("crop=640:480:0:0".parse().unwrap()));
    options.set_scale(Some("scale=w=1280".parse().unwrap())).unwrap();
    options.set_rotation(Some("transpose=1".parse().unwrap()));

    assert_eq!(
        assemble(options.filters()),
        "crop=640:480:0:0,scale=w=1280,transpose=1"
    );

    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert_eq!(
        plan.commands()[0].flag_value("-vf"),
        Some("crop=640:480:0:0,scale=w=1280,transpose=1")
    );
}

#[test]
fn test_order_ignores_enable_order() {
    let mut options = OptionsModel::new();
    options.set_denoise(Some("hqdn3d".parse().unwrap()));
    options.set_deinterlace("yadif".parse().unwrap());
    options.set_rotation(Some(Rotation::FlipVertical));
    options.set_scale(Some("setdar=16/9".parse().unwrap())).unwrap();
    options.set_crop(Some("crop=w=1920:h=800".parse().unwrap()));

    assert_eq!(
        options.filters().to_string(),
        "crop=1920:800,setdar=16/9,vflip,yadif=0:-1:0,hqdn3d=4:3:6:4.5"
    );
}

#[test]
fn test_no_filters_means_no_vf_flag() {
    let options = OptionsModel::new();
    assert!(options.filters().is_empty());
    let cmd = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv"))
        .unwrap()
        .commands()[0]
        .display();
    assert_cmd_not_contains(&cmd, "-vf");
}

#[test]
fn test_interlace_replaces_deinterlace() {
    let mut options = OptionsModel::new();
    options.set_deinterlace("w3fdif=filter=simple:deint=interlaced".parse().unwrap());
    assert_eq!(
        options.filters().to_string(),
        "w3fdif=filter=simple:deint=interlaced"
    );

    options.set_interlace("interlace=scan=bff:lowpass=off".parse().unwrap());
    assert!(matches!(options.filters().lacing, Some(Lacing::Interlace(_))));
    assert_eq!(options.filters().to_string(), "interlace=scan=bff:lowpass=off");

    options.set_deinterlace(Deinterlacer::Yadif {
        mode: 1,
        parity: 0,
        deint: 1,
    });
    assert_eq!(options.filters().to_string(), "yadif=1:0:1");

    options.clear_lacing();
    assert!(options.filters().is_empty());
}

#[test]
fn test_scale_with_aspect_filters() {
    let scale: Scale = "scale=1280:-2,setsar=1/1".parse().unwrap();
    let filters = VideoFilters {
        scale: Some(scale),
        ..VideoFilters::default()
    };
    assert_eq!(assemble(&filters), "scale=w=1280:h=-2,setsar=1/1");
}

#[test]
fn test_upside_down_rotation_is_double_transpose() {
    let filters = VideoFilters {
        rotation: Some("180".parse().unwrap()),
        denoise: Some(Denoise::Nlmeans {
            strength: 2.0,
            patch: 7,
            research: 15,
        }),
        ..VideoFilters::default()
    };
    assert_eq!(
        assemble(&filters),
        "transpose=2,transpose=2,nlmeans=s=2:p=7:r=15"
    );
}

#[test]
fn test_malformed_filters_are_rejected() {
    assert!("crop=0:480".parse::<Crop>().is_err());
    assert!("crop=abc".parse::<Crop>().is_err());
    assert!("scale=".parse::<Scale>().is_err());
    assert!("setdar=16/0".parse::<Scale>().is_err());
    assert!("transpose=7".parse::<Rotation>().is_err());
    assert!("yadif=9".parse::<Deinterlacer>().is_err());
    assert!("interlace=scan=xyz".parse::<Interlace>().is_err());
    assert!("blur".parse::<Denoise>().is_err());
}

#[test]
fn test_stream_copy_ignores_filters() {
    let mut options = OptionsModel::new();
    options.set_crop(Some("crop=640:480".parse().unwrap()));
    options.set_container(ffbatch::engine::COPY_VIDEO_CODEC).unwrap();
    let plan = synthesize(&options, &job("/media/in.mp4", "/media/out.mkv")).unwrap();
    assert!(!plan.commands()[0].has_flag("-vf"));
}
