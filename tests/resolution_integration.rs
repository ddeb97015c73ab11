//! Encode job resolution on discovered adapters

use std::path::PathBuf;

use lamco_qsv::encode::{
    setup_job, EncodeJob, JobParameters, OptionError, ResolveError, ResolvedEncode,
};
use lamco_qsv::hardware::scripted::ScriptedRuntime;
use lamco_qsv::hardware::session::{HyperMode, MemoryType, RateControlMethod};
use lamco_qsv::hardware::{AdapterRegistry, Codec, EncoderKind, ImplementationKind};

fn registry(name: &str) -> AdapterRegistry {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name);
    let mut runtime = ScriptedRuntime::load(&path).unwrap();
    let mut displays = runtime.displays();
    let mut registry = AdapterRegistry::new();
    registry.discover(&mut runtime, &mut displays).unwrap();
    registry
}

/// Run a job the way the CLI does
fn run(registry: &AdapterRegistry, mut job: JobParameters) -> (u32, ResolvedEncode) {
    let setup = setup_job(registry, &job);
    setup.apply_to(&mut job);
    let profile = registry
        .encoder_profile(setup.context.index, job.encoder.codec())
        .unwrap();
    let mut encode = EncodeJob::new(profile, setup.context.tier, job).unwrap();
    encode.apply_options().unwrap();
    encode.sanitize().unwrap();
    (setup.context.index, encode.resolve().unwrap())
}

#[test]
fn test_av1_lookahead_icq_on_default_adapter() {
    let registry = registry("dual-adapter.toml");
    let job = JobParameters::with_quality(EncoderKind::Av1, 20.0).option("la", "1");

    let (index, resolved) = run(&registry, job);
    assert_eq!(index, 1);
    assert_eq!(resolved.config.output.method, Some(RateControlMethod::LaIcq));
    assert_eq!(resolved.config.output.icq_quality, 20);
    assert!(resolved.config.low_power);
    assert_eq!(resolved.side_channel.get("low_power"), Some("1"));
}

#[test]
fn test_gpu_option_selects_adapter() {
    let registry = registry("dual-adapter.toml");
    let job = JobParameters::with_bitrate(EncoderKind::H264, 5000)
        .option("gpu", "0")
        .option("la", "1");

    let (index, resolved) = run(&registry, job);
    assert_eq!(index, 0);
    assert_eq!(resolved.config.output.method, Some(RateControlMethod::La));
    assert_eq!(resolved.config.output.target_kbps, 5000);
    // G8 default
    assert_eq!(resolved.side_channel.get("async_depth"), Some("6"));
}

#[test]
fn test_hevc_hyper_encode() {
    let registry = registry("dual-adapter.toml");
    let job = JobParameters::with_quality(EncoderKind::H265, 24.0)
        .option("gpu", "0")
        .option("hyperencode", "on")
        .option("async-depth", "2");

    let (_, resolved) = run(&registry, job);
    assert_eq!(resolved.config.hyper_mode, HyperMode::On);
    assert_eq!(resolved.config.async_depth, 60);
    assert_eq!(resolved.config.gop.idr_interval, Some(1));
    assert!(resolved.config.gop.pic_size <= 60);
    assert_eq!(resolved.side_channel.get("dual_gfx"), Some("on"));
    assert_eq!(resolved.config.output.method, Some(RateControlMethod::Icq));
}

#[test]
fn test_video_memory_limits_lookahead() {
    let registry = registry("dual-adapter.toml");
    let job = JobParameters::with_bitrate(EncoderKind::H264, 8000)
        .option("gpu", "0")
        .option("memory-type", "video")
        .option("la", "1")
        .option("la-depth", "100");

    let (_, resolved) = run(&registry, job);
    assert_eq!(resolved.config.memory_type, MemoryType::Video);
    assert_eq!(resolved.config.gop.ref_dist, 4);
    assert_eq!(resolved.config.coding.lookahead_depth, 44);
    assert_eq!(resolved.side_channel.get("look_ahead_depth"), Some("44"));
}

#[test]
fn test_bad_options_do_not_abort() {
    let registry = registry("skylake.toml");
    let job = JobParameters::with_quality(EncoderKind::H264, 23.0)
        .option("bogus", "1")
        .option("la-depth", "abc")
        .option("palette", "1")
        .option("cavlc", "1");

    let context = registry.context();
    let profile = registry.encoder_profile(context.index, Codec::Avc).unwrap();
    let mut encode = EncodeJob::new(profile, context.tier, job).unwrap();
    let reports = encode.apply_options().unwrap();

    assert!(matches!(reports[0].result, Err(OptionError::BadName { .. })));
    assert_eq!(reports[1].result, Err(OptionError::bad_value("la-depth", "abc")));
    assert_eq!(reports[2].result, Err(OptionError::unsupported("palette")));
    assert!(reports[3].is_applied());

    encode.sanitize().unwrap();
    let resolved = encode.resolve().unwrap();
    assert_eq!(resolved.side_channel.get("cavlc"), Some("1"));
    assert_eq!(resolved.config.output.method, Some(RateControlMethod::Icq));
}

#[test]
fn test_interlaced_lookahead_on_skylake() {
    let registry = registry("skylake.toml");
    let job = JobParameters::with_bitrate(EncoderKind::H264, 3000)
        .option("la", "1")
        .option("tff", "1");

    let (_, resolved) = run(&registry, job);
    assert_eq!(resolved.config.output.method, Some(RateControlMethod::La));
    // G5 default
    assert_eq!(resolved.config.async_depth, 4);
}

#[test]
fn test_unavailable_encoder_rejected() {
    let registry = registry("skylake.toml");
    assert!(registry.encoder_profile(0, Codec::Hevc).is_none());

    let hevc = registry
        .select(0)
        .unwrap()
        .profile(Codec::Hevc, ImplementationKind::Hardware)
        .unwrap();
    let job = JobParameters::with_quality(EncoderKind::H265, 25.0);
    let err = EncodeJob::new(hevc, registry.tier(0), job).unwrap_err();
    assert_eq!(err, ResolveError::Unavailable { codec: Codec::Hevc });
}
