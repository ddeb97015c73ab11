//! Parameter Resolution Benchmarks
//!
//! Measures option application and full job resolution against a fixed
//! capability profile, plus discovery on a scripted two-adapter machine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;

use lamco_qsv::encode::{resolve_job, EncodeConfiguration, JobParameters, OptionKeyRegistry};
use lamco_qsv::hardware::scripted::ScriptedRuntime;
use lamco_qsv::hardware::{
    AdapterRegistry, ApiVersion, CapabilityFlag, CapabilitySet, Codec, CodecCapabilityProfile,
    EncoderKind, GenerationTier, ImplementationKind,
};

fn hevc_profile() -> CodecCapabilityProfile {
    CodecCapabilityProfile::new(
        Codec::Hevc,
        ImplementationKind::Hardware,
        ApiVersion::new(2, 9),
        true,
        CapabilitySet::from_flags(&[
            CapabilityFlag::LowPower,
            CapabilityFlag::RateControlLa,
            CapabilityFlag::RateControlIcq,
            CapabilityFlag::VuiSignalInfo,
            CapabilityFlag::CodingOption2,
            CapabilityFlag::ExtBrc,
            CapabilityFlag::HyperEncode,
        ]),
    )
}

/// Benchmark a single option lookup and apply
fn bench_option_apply(c: &mut Criterion) {
    let profile = hevc_profile();
    let mut group = c.benchmark_group("option_apply");

    for (key, value) in [
        ("gop-pic-size", "120"),
        ("la", "1"),
        ("colorprim", "bt2020"),
        ("no-extbrc", ""),
    ] {
        group.bench_function(BenchmarkId::new("apply", key), |b| {
            let mut config = EncodeConfiguration::new(EncoderKind::H265, 6);
            b.iter(|| {
                black_box(OptionKeyRegistry::apply(
                    &mut config,
                    &profile,
                    black_box(key),
                    black_box(value),
                ))
            })
        });
    }

    group.finish();
}

/// Benchmark full resolution for typical jobs
fn bench_resolve_job(c: &mut Criterion) {
    let profile = hevc_profile();
    let mut group = c.benchmark_group("resolve_job");

    let jobs = [
        (
            "icq",
            JobParameters::with_quality(EncoderKind::H265, 23.0),
        ),
        (
            "la_vbv",
            JobParameters::with_bitrate(EncoderKind::H265, 120_000)
                .option("la", "1")
                .option("vbv-maxrate", "150000")
                .option("vbv-bufsize", "300000"),
        ),
        (
            "hyper",
            JobParameters::with_quality(EncoderKind::H265, 25.0)
                .option("hyperencode", "adaptive")
                .option("gop-pic-size", "240"),
        ),
    ];

    for (name, job) in jobs {
        group.bench_function(BenchmarkId::new("resolve", name), |b| {
            b.iter(|| black_box(resolve_job(&profile, GenerationTier::G9, job.clone())))
        });
    }

    group.finish();
}

/// Benchmark discovery on the dual-adapter fixture
fn bench_discovery(c: &mut Criterion) {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("dual-adapter.toml");
    let runtime = ScriptedRuntime::load(&path).unwrap();

    c.bench_function("discover_dual_adapter", |b| {
        b.iter(|| {
            let mut runtime = runtime.clone();
            let mut displays = runtime.displays();
            let mut registry = AdapterRegistry::new();
            registry.discover(&mut runtime, &mut displays).unwrap();
            black_box(registry.default_index())
        })
    });
}

criterion_group!(
    benches,
    bench_option_apply,
    bench_resolve_job,
    bench_discovery
);
criterion_main!(benches);
