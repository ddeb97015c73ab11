//! lamco-qsv-info - Quick Sync adapter inspector
//!
//! Discovers adapters, reports their capabilities and optionally resolves
//! an encode job against one of them.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamco_qsv::config::Config;
use lamco_qsv::encode::job::split_option_string;
use lamco_qsv::encode::{setup_job, EncodeJob, JobParameters, OptionReport, ResolvedEncode};
use lamco_qsv::hardware::report::RegistryReport;
use lamco_qsv::hardware::scripted::ScriptedRuntime;
use lamco_qsv::hardware::{AdapterRegistry, DiscoveryError, EncoderKind};
use lamco_qsv::utils::format_user_error;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Command-line arguments for lamco-qsv-info
#[derive(Parser, Debug)]
#[command(name = "lamco-qsv-info")]
#[command(version, about = "Intel Quick Sync adapter inspector", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Scripted runtime fixture to discover against
    #[arg(long, env = "LAMCO_QSV_RUNTIME")]
    pub runtime: Option<PathBuf>,

    /// Encoder to resolve a job for (h264, h265, h265_10bit, av1, av1_10bit)
    #[arg(short, long)]
    pub encoder: Option<EncoderKind>,

    /// Target quality (ICQ or QP)
    #[arg(short, long)]
    pub quality: Option<f64>,

    /// Target bitrate in kbps
    #[arg(short, long)]
    pub bitrate: Option<u32>,

    /// Encoder options (key=value:key2=value2)
    #[arg(short, long)]
    pub options: Option<String>,

    /// Codec profile name
    #[arg(long)]
    pub profile: Option<String>,

    /// Adapter index for the job
    #[arg(long)]
    pub gpu: Option<u32>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let result = run(&args);
    if let Err(e) = &result {
        eprintln!("{}", format_user_error(e));
    }
    result
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    init_logging(args, &config)?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-qsv v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("════════════════════════════════════════════════════════");
    debug!("Config: {:?}", config);

    let fixture = args
        .runtime
        .clone()
        .or_else(|| config.discovery.runtime_fixture.clone())
        .ok_or_else(|| DiscoveryError::LoaderUnavailable {
            reason: "no vendor runtime linked into this build; pass --runtime <fixture.toml>"
                .to_string(),
        })?;

    let mut runtime = ScriptedRuntime::load(&fixture)?;
    let mut displays = runtime.displays();
    let mut registry = AdapterRegistry::with_preference(config.discovery.preference);
    registry
        .discover(&mut runtime, &mut displays)
        .context("Adapter discovery failed")?;

    let report = RegistryReport::from_registry(&registry);
    let job = build_job(args, &config);

    let resolved = match job {
        Some(job) => Some(resolve(&registry, job)?),
        None => None,
    };

    match args.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "registry": report,
                "job": resolved.as_ref().map(|(reports, resolved)| serde_json::json!({
                    "options": reports.iter().map(option_json).collect::<Vec<_>>(),
                    "resolved": resolved,
                })),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            registry.log_summary();
            if let Some((reports, resolved)) = &resolved {
                print_resolved(reports, resolved);
            }
        }
    }

    Ok(())
}

/// Job from the config file with command-line overrides, if any target is set
fn build_job(args: &Args, config: &Config) -> Option<JobParameters> {
    let requested = args.quality.is_some() || args.bitrate.is_some() || args.encoder.is_some();
    if !requested && !config.has_job() {
        return None;
    }

    let mut job = config.to_job_parameters();
    if let Some(encoder) = args.encoder {
        job.encoder = encoder;
    }
    if let Some(quality) = args.quality {
        job.quality = quality;
    }
    if let Some(bitrate) = args.bitrate {
        job.bitrate_kbps = bitrate;
    }
    if let Some(profile) = &args.profile {
        job.profile = Some(profile.clone());
    }
    if let Some(options) = &args.options {
        job.options.extend(split_option_string(options));
    }
    if let Some(gpu) = args.gpu {
        job.options.push(("gpu".to_string(), gpu.to_string()));
    }
    Some(job)
}

fn resolve(
    registry: &AdapterRegistry,
    mut job: JobParameters,
) -> Result<(Vec<OptionReport>, ResolvedEncode)> {
    let setup = setup_job(registry, &job);
    setup.apply_to(&mut job);
    info!(
        "Resolving {} job on adapter {} ({})",
        job.encoder, setup.context.index, setup.context.tier
    );

    let codec = job.encoder.codec();
    let profile = registry
        .encoder_profile(setup.context.index, codec)
        .with_context(|| {
            format!("{} encoder unavailable on adapter {}", codec, setup.context.index)
        })?;

    let mut encode = EncodeJob::new(profile, setup.context.tier, job)?;
    let reports = encode.apply_options()?;
    encode.sanitize()?;
    let resolved = encode.resolve()?;
    Ok((reports, resolved))
}

fn option_json(report: &OptionReport) -> serde_json::Value {
    serde_json::json!({
        "key": report.key,
        "value": report.value,
        "error": report.result.as_ref().err().map(|e| e.to_string()),
    })
}

fn print_resolved(reports: &[OptionReport], resolved: &ResolvedEncode) {
    for report in reports {
        if let Err(e) = &report.result {
            warn!("Option {}={} skipped: {}", report.key, report.value, e);
        }
    }

    let output = &resolved.config.output;
    println!("encoder:      {}", resolved.config.encoder);
    if let Some(method) = output.method {
        println!("rate control: {}", method);
    }
    println!(
        "gop:          {} (ref dist {})",
        resolved.config.gop.pic_size, resolved.config.gop.ref_dist
    );
    println!("async depth:  {}", resolved.config.async_depth);
    println!("options:");
    for (key, value) in resolved.side_channel.iter() {
        println!("  {key}={value}");
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<()> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let log_format = args
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());
    let log_file = args.log_file.as_ref().or(config.logging.log_file.as_ref());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("lamco_qsv={log_level},warn"))
    });

    // stdout carries reports; logs go to stderr
    if let Some(log_file_path) = log_file {
        let file = File::create(log_file_path)
            .with_context(|| format!("Failed to create log file: {}", log_file_path.display()))?;

        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path.display());
    } else {
        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
        }
    }

    Ok(())
}
