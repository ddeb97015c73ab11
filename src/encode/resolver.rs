//! Encoder parameter resolution
//!
//! An [`EncodeJob`] turns [`JobParameters`] into a final
//! [`EncodeConfiguration`] for one adapter and codec. Resolution runs in
//! fixed steps, each allowed exactly once and in order:
//!
//! ```text
//! Created ─► apply_options() ─► OptionsApplied ─► sanitize() ─► Sanitized ─► resolve() ─► Resolved
//! ```
//!
//! The output pairs the typed configuration with [`SideChannelOptions`]
//! carrying the same decisions as pass-through options for the encode
//! session. Raw vendor parameters travel inside `qsv_params`.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::hardware::session::{MemoryType, RateControlMethod};
use crate::hardware::{CapabilityFlag, Codec, CodecCapabilityProfile, GenerationTier};

use super::config::{
    target_usage_preset, CodecProfile, EncodeConfiguration, JobParameters, INVALID_QUALITY,
};
use super::error::{OptionError, ResolveError, ResolveResult};
use super::job::{default_async_depth, parse_profile};
use super::options::OptionKeyRegistry;
use super::side_channel::SideChannelOptions;

/// Vendor BRC fields are 16 bits wide; larger values are scaled by this step
const BRC_STEP: f64 = 65536.0;

/// Largest bitrate the vendor interface accepts, in kbps
pub const MAX_BITRATE_KBPS: u32 = i32::MAX as u32;

/// GOP flag: no scene-change I frames
pub const GOP_STRICT: u32 = 2;

/// Lookahead depth the driver hangs on
const HANG_LOOKAHEAD_DEPTH: u16 = 10;

/// Video-memory lookahead budget shared with the reference distance
const VIDEO_MEMORY_SURFACES: u16 = 48;

/// Position of a job in the resolution sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolveState {
    Created,
    OptionsApplied,
    Sanitized,
    Resolved,
}

/// Outcome of one encoder option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionReport {
    pub key: String,
    pub value: String,
    pub result: Result<(), OptionError>,
}

impl OptionReport {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// Final configuration plus encoder pass-through options
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEncode {
    pub config: EncodeConfiguration,
    pub side_channel: SideChannelOptions,
}

/// BRC multiplier keeping every bitrate field below 65536 once divided
pub fn brc_multiplier(bitrate: u32, vbv_max: u32, vbv_size: u32, vbv_init: f32) -> u16 {
    let largest = f64::from(bitrate.max(vbv_max).max(vbv_size)).max(f64::from(vbv_init));
    ((largest + BRC_STEP) / BRC_STEP).min(f64::from(u16::MAX)) as u16
}

/// Default GOP length: two seconds of frames, at most 120
pub fn default_gop_size(frame_rate_num: u32, frame_rate_den: u32) -> i32 {
    let rate = f64::from(frame_rate_num) / f64::from(frame_rate_den) + 0.5;
    (rate * 2.0).min(120.0) as i32
}

/// Default reference distance for a codec and generation
pub fn default_ref_dist(codec: Codec, tier: GenerationTier) -> i32 {
    if tier >= GenerationTier::G8 && matches!(codec, Codec::Hevc | Codec::Av1) {
        8
    } else {
        4
    }
}

/// Upper QP bound for CQP mode
fn qp_upper_bound(config: &EncodeConfiguration) -> f64 {
    if config.codec() == Codec::Av1 {
        255.0
    } else if config.profile == Some(CodecProfile::HevcMain10) {
        63.0
    } else {
        51.0
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

// =============================================================================
// EncodeJob
// =============================================================================

/// Resolution state for one encode job
#[derive(Debug)]
pub struct EncodeJob<'a> {
    profile: &'a CodecCapabilityProfile,
    tier: GenerationTier,
    job: JobParameters,
    config: EncodeConfiguration,
    state: ResolveState,
}

impl<'a> EncodeJob<'a> {
    /// Start a job on the adapter that produced `profile`
    ///
    /// Fails with [`ResolveError::Unavailable`] when the profile is for a
    /// different codec or the encoder did not initialize during probing.
    pub fn new(
        profile: &'a CodecCapabilityProfile,
        tier: GenerationTier,
        job: JobParameters,
    ) -> ResolveResult<Self> {
        let codec = job.encoder.codec();
        if profile.codec() != codec || !profile.is_available() {
            return Err(ResolveError::Unavailable { codec });
        }

        let async_depth = job.async_depth.unwrap_or_else(|| default_async_depth(tier));
        let mut config = EncodeConfiguration::new(job.encoder, async_depth);
        config.memory_type = job.memory_type;
        config.pic_struct = job.pic_struct;
        config.low_power = profile.low_power();

        Ok(Self {
            profile,
            tier,
            job,
            config,
            state: ResolveState::Created,
        })
    }

    pub fn state(&self) -> ResolveState {
        self.state
    }

    pub fn config(&self) -> &EncodeConfiguration {
        &self.config
    }

    fn advance(&mut self, from: ResolveState, to: ResolveState) -> ResolveResult<()> {
        if self.state != from {
            return Err(ResolveError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        Ok(())
    }

    /// Apply the profile name and every encoder option in order
    ///
    /// Returns one report per option. Failed options are logged and skipped.
    pub fn apply_options(&mut self) -> ResolveResult<Vec<OptionReport>> {
        self.advance(ResolveState::Created, ResolveState::OptionsApplied)?;
        let mut reports = Vec::with_capacity(self.job.options.len() + 1);

        let profile_result = parse_profile(
            &mut self.config,
            self.job.profile.as_deref(),
            self.job.encoder,
            self.tier,
        );
        if let Some(name) = &self.job.profile {
            if let Err(e) = &profile_result {
                warn!("Ignoring profile: {}", e);
            }
            reports.push(OptionReport {
                key: "profile".to_string(),
                value: name.clone(),
                result: profile_result,
            });
        }

        for (key, value) in &self.job.options {
            let result = OptionKeyRegistry::apply(&mut self.config, self.profile, key, value);
            match &result {
                Ok(()) => debug!("Applied option {}={}", key, value),
                Err(OptionError::BadName { .. }) => warn!("Bad option key {:?}", key),
                Err(OptionError::BadValue { .. }) => {
                    warn!("Bad value {:?} for option {}", value, key)
                }
                Err(OptionError::Unsupported { .. }) => warn!("Unsupported option {}", key),
            }
            reports.push(OptionReport {
                key: key.clone(),
                value: value.clone(),
                result,
            });
        }

        if self.config.async_depth == 0 {
            self.config.async_depth = default_async_depth(self.tier);
        }

        self.state = ResolveState::OptionsApplied;
        Ok(reports)
    }

    /// Drop rate-control features the adapter cannot deliver
    pub fn sanitize(&mut self) -> ResolveResult<()> {
        self.advance(ResolveState::OptionsApplied, ResolveState::Sanitized)?;
        let has_quality = self.job.quality > INVALID_QUALITY;
        let rate = &mut self.config.rate;

        // Low-power ICQ is misreported below G8
        if !self.profile.has(CapabilityFlag::RateControlIcq)
            || (self.config.low_power && self.tier < GenerationTier::G8)
        {
            rate.icq = false;
        } else {
            rate.icq = rate.icq && has_quality;
        }

        if !self.profile.has(CapabilityFlag::RateControlLa) {
            rate.lookahead = false;
        } else if rate.lookahead
            && !self.profile.has(CapabilityFlag::RateControlLaInterlaced)
            && !self.config.pic_struct.is_progressive()
        {
            info!("Lookahead not used (lookahead is progressive-only)");
            rate.lookahead = false;
        } else {
            rate.lookahead = rate.lookahead && (rate.icq || !has_quality);
        }

        self.state = ResolveState::Sanitized;
        Ok(())
    }

    /// Compute the final configuration
    ///
    /// On [`ResolveError::InvalidRateControl`] the job stays sanitized and
    /// nothing is modified.
    pub fn resolve(&mut self) -> ResolveResult<ResolvedEncode> {
        self.advance(ResolveState::Sanitized, ResolveState::Resolved)?;

        let mut config = self.config.clone();
        let mut side = SideChannelOptions::new();
        emit_coding_options(&config, &mut side);

        self.resolve_rate_control(&mut config, &mut side)?;
        self.resolve_gop(&mut config, &mut side);
        self.resolve_memory_limits(&mut config, &mut side);
        self.emit_tail(&config, &mut side);

        self.config = config.clone();
        self.state = ResolveState::Resolved;
        Ok(ResolvedEncode {
            config,
            side_channel: side,
        })
    }

    fn resolve_rate_control(
        &self,
        config: &mut EncodeConfiguration,
        side: &mut SideChannelOptions,
    ) -> ResolveResult<()> {
        let quality = self.job.quality;
        let bitrate = self.job.bitrate_kbps.min(MAX_BITRATE_KBPS);
        let rate = config.rate.clone();
        let multiplier = brc_multiplier(
            bitrate,
            rate.vbv_max_bitrate,
            rate.vbv_buffer_size,
            rate.vbv_buffer_init,
        );
        let m = f64::from(multiplier);
        let out = &mut config.output;

        if rate.vbv_buffer_size > 0 {
            let init = f64::from(rate.vbv_buffer_init);
            let size = f64::from(rate.vbv_buffer_size);
            if init > 1.0 {
                out.initial_delay_kb = ((init / 8.0) / m) as u16;
                side.append_param("InitialDelayInKB", out.initial_delay_kb.into());
            } else if init > 0.0 {
                out.initial_delay_kb = ((size * init / 8.0) / m) as u16;
                side.append_param("InitialDelayInKB", out.initial_delay_kb.into());
            }
            out.buffer_size_kb = ((rate.vbv_buffer_size / 8) / u32::from(multiplier)) as u16;
            side.append_param("BufferSizeInKB", out.buffer_size_kb.into());
            out.brc_multiplier = multiplier;
        }
        if rate.vbv_max_bitrate > 0 {
            out.max_kbps = (rate.vbv_max_bitrate / u32::from(multiplier)) as u16;
            side.append_param("MaxKbps", out.max_kbps.into());
            out.brc_multiplier = multiplier;
        }

        let method = if quality > INVALID_QUALITY {
            if rate.icq {
                out.icq_quality = quality.clamp(1.0, 51.0) as u16;
                side.append_param("ICQQuality", out.icq_quality.into());
                if rate.lookahead {
                    RateControlMethod::LaIcq
                } else {
                    RateControlMethod::Icq
                }
            } else {
                let bound = qp_upper_bound(config);
                let qp = |offset: i16| (quality + f64::from(offset)).clamp(0.0, bound) as u16;
                let out = &mut config.output;
                out.qp_i = qp(rate.cqp_offsets[0]);
                out.qp_p = qp(rate.cqp_offsets[1]);
                out.qp_b = qp(rate.cqp_offsets[2]);
                side.append_param("QPI", out.qp_i.into());
                side.append_param("QPP", out.qp_p.into());
                side.append_param("QPB", out.qp_b.into());

                // CQP with external BRC corrupts output
                config.coding.extbrc = Some(false);
                side.set("extbrc", 0);
                RateControlMethod::Cqp
            }
        } else if bitrate > 0 {
            let out = &mut config.output;
            out.target_kbps = (bitrate / u32::from(multiplier)) as u16;
            side.append_param("TargetKbps", out.target_kbps.into());
            out.brc_multiplier = multiplier;
            if rate.lookahead {
                config.coding.extbrc = Some(false);
                side.set("extbrc", 0);
                RateControlMethod::La
            } else if bitrate == rate.vbv_max_bitrate {
                RateControlMethod::Cbr
            } else {
                RateControlMethod::Vbr
            }
        } else {
            error!(
                "Invalid rate control (quality {}, bitrate {})",
                quality, bitrate
            );
            return Err(ResolveError::InvalidRateControl { quality, bitrate });
        };

        config.output.method = Some(method);
        side.append_param("RateControlMethod", method.vendor_id());

        if rate.vbv_max_bitrate > 0 || rate.vbv_buffer_size > 0 {
            match method {
                RateControlMethod::La | RateControlMethod::LaIcq => {
                    info!("Lookahead enabled, ignoring VBV")
                }
                RateControlMethod::Icq => info!("ICQ rate control, ignoring VBV"),
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_gop(&self, config: &mut EncodeConfiguration, side: &mut SideChannelOptions) {
        let codec = config.codec();
        if config.gop.ref_dist < 0 {
            config.gop.ref_dist = default_ref_dist(codec, self.tier);
        }
        if config.gop.pic_size < 0 {
            config.gop.pic_size =
                default_gop_size(self.job.frame_rate_num, self.job.frame_rate_den);
        }

        if config.hyper_mode.is_enabled() {
            match codec {
                Codec::Hevc => config.gop.idr_interval = Some(1),
                Codec::Avc => config.gop.idr_interval = Some(0),
                Codec::Av1 => {}
            }
            side.append_param("IdrInterval", config.gop.idr_interval.unwrap_or(0).into());

            config.gop.pic_size = config.gop.pic_size.min(60);
            config.async_depth = config.async_depth.max(60);
            side.set("async_depth", config.async_depth);
            side.set("dual_gfx", config.hyper_mode.key());
            info!("Hyper encode mode: {}", config.hyper_mode.key());
        }
        side.append_param("GopPicSize", config.gop.pic_size as u32);
    }

    fn resolve_memory_limits(
        &self,
        config: &mut EncodeConfiguration,
        side: &mut SideChannelOptions,
    ) {
        let lookahead = config.rate.lookahead;
        let mut ref_dist = config.gop.ref_dist.max(0) as u16;
        let mut depth = config.coding.lookahead_depth;

        // Too many in-flight video surfaces hang the driver
        if config.memory_type == MemoryType::Video {
            ref_dist = ref_dist.min(if lookahead { 8 } else { 16 });
            let budget = if lookahead {
                VIDEO_MEMORY_SURFACES - ref_dist - 3 * u16::from(ref_dist == 0)
            } else {
                0
            };
            depth = depth.min(budget);
        } else {
            ref_dist = ref_dist.min(16);
            depth = depth.min(if lookahead { 100 } else { 0 });
        }
        side.append_param("GopRefDist", ref_dist.into());

        if lookahead {
            depth = depth.max(HANG_LOOKAHEAD_DEPTH + 1);
        }
        side.set("look_ahead_depth", depth);

        config.gop.ref_dist = i32::from(ref_dist);
        config.coding.lookahead_depth = depth;
    }

    fn emit_tail(&self, config: &EncodeConfiguration, side: &mut SideChannelOptions) {
        if self.profile.has(CapabilityFlag::LowPower) {
            side.set("low_power", flag(config.low_power));
            if config.low_power {
                info!("Using low power mode");
            }
        }

        if self.profile.has(CapabilityFlag::Av1ScreenContent) {
            let tools = config.screen_content;
            if tools.intra_block_copy {
                side.set("intrabc", 1);
                info!("Screen content coding: intra block copy on");
            }
            if tools.palette {
                side.set("palette_mode", 1);
                info!("Screen content coding: palette on");
            }
        }

        side.append_param("BRCParamMultiplier", config.output.brc_multiplier.into());
        let gop_flags = if config.gop.strict { GOP_STRICT } else { 0 };
        side.append_param("GopOptFlag", gop_flags);
    }
}

/// Options that pass straight through to the encoder
fn emit_coding_options(config: &EncodeConfiguration, side: &mut SideChannelOptions) {
    if let Some(tu) = config.target_usage {
        side.set("preset", target_usage_preset(tu));
    }
    if let Some(refs) = config.ref_frames {
        side.set("refs", refs);
    }
    if let Some(strategy) = config.gop.b_pyramid {
        side.set("b_strategy", strategy);
    }

    let coding = &config.coding;
    let toggles = [
        ("adaptive_i", coding.adaptive_i),
        ("adaptive_b", coding.adaptive_b),
        ("cavlc", coding.cavlc),
        ("mbbrc", coding.mbbrc),
        ("extbrc", coding.extbrc),
        ("repeat_pps", coding.repeat_pps),
    ];
    for (key, value) in toggles {
        if let Some(value) = value {
            side.set(key, flag(value));
        }
    }
    if let Some(ds) = coding.lookahead_downsampling {
        side.set("look_ahead_downsampling", ds);
    }
    if let Some(trellis) = coding.trellis {
        side.set("trellis", trellis);
    }

    let vui = &config.vui;
    for (key, value) in [
        ("color_primaries", vui.colour_primaries),
        ("color_trc", vui.transfer),
        ("colorspace", vui.matrix),
    ] {
        if let Some(value) = value {
            side.set(key, value);
        }
    }

    side.set("async_depth", config.async_depth);
}

/// Run every resolution step for a job
///
/// Option failures are logged and reported through the logs only; use
/// [`EncodeJob`] directly to inspect them.
pub fn resolve_job(
    profile: &CodecCapabilityProfile,
    tier: GenerationTier,
    job: JobParameters,
) -> ResolveResult<ResolvedEncode> {
    let mut encode = EncodeJob::new(profile, tier, job)?;
    encode.apply_options()?;
    encode.sanitize()?;
    encode.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::side_channel::QSV_PARAMS_KEY;
    use crate::hardware::session::{HyperMode, PicStruct};
    use crate::hardware::{ApiVersion, CapabilitySet, EncoderKind, ImplementationKind};
    use proptest::prelude::*;

    fn profile(codec: Codec, low_power: bool, flags: &[CapabilityFlag]) -> CodecCapabilityProfile {
        CodecCapabilityProfile::new(
            codec,
            ImplementationKind::Hardware,
            ApiVersion::new(2, 9),
            low_power,
            CapabilitySet::from_flags(flags),
        )
    }

    const LA_ICQ: &[CapabilityFlag] = &[
        CapabilityFlag::RateControlLa,
        CapabilityFlag::RateControlIcq,
    ];

    #[test]
    fn test_scenario_lookahead_icq_on_av1() {
        let p = profile(Codec::Av1, true, LA_ICQ);
        let job = JobParameters::with_quality(EncoderKind::Av1, 20.0).option("la", "1");
        let resolved = resolve_job(&p, GenerationTier::G8, job).unwrap();

        assert_eq!(resolved.config.output.method, Some(RateControlMethod::LaIcq));
        assert_eq!(resolved.config.output.icq_quality, 20);
        assert_eq!(resolved.side_channel.param("ICQQuality"), Some("20"));
        assert_eq!(resolved.side_channel.param("RateControlMethod"), Some("11"));
    }

    #[test]
    fn test_huge_bitrate_clamped_before_scaling() {
        let p = profile(Codec::Avc, false, &[]);
        let job = JobParameters::with_bitrate(EncoderKind::H264, u32::MAX);
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();

        let out = &resolved.config.output;
        assert_eq!(out.method, Some(RateControlMethod::Vbr));
        assert_eq!(out.brc_multiplier, 32768);
        // 65535 * 32768 = i32::MAX - 32767
        assert_eq!(out.target_kbps, 65535);
    }

    #[test]
    fn test_scenario_lookahead_dropped_without_flag() {
        let p = profile(Codec::Avc, false, &[CapabilityFlag::RateControlIcq]);
        let job = JobParameters::with_quality(EncoderKind::H264, 22.0).option("la", "true");
        let mut encode = EncodeJob::new(&p, GenerationTier::G5, job).unwrap();

        let reports = encode.apply_options().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0].result, Err(OptionError::Unsupported { .. })));
        encode.sanitize().unwrap();
        let resolved = encode.resolve().unwrap();

        assert!(!resolved.config.rate.lookahead);
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::Icq));
        assert_eq!(resolved.config.output.icq_quality, 22);
        assert_eq!(resolved.side_channel.get("look_ahead_depth"), Some("0"));
    }

    #[test]
    fn test_scenario_bad_gop_value_isolated() {
        let p = profile(Codec::Hevc, false, &[CapabilityFlag::RateControlIcq]);
        let job = JobParameters::with_quality(EncoderKind::H265, 25.0)
            .option("gop-pic-size", "invalid")
            .option("tu", "7")
            .option("gop-ref-dist", "3");
        let mut encode = EncodeJob::new(&p, GenerationTier::G9, job).unwrap();

        let reports = encode.apply_options().unwrap();
        assert_eq!(
            reports[0].result,
            Err(OptionError::bad_value("gop-pic-size", "invalid"))
        );
        assert!(reports[1].is_applied());
        assert!(reports[2].is_applied());

        encode.sanitize().unwrap();
        let resolved = encode.resolve().unwrap();
        // 30 fps default: (30 + 0.5) * 2
        assert_eq!(resolved.config.gop.pic_size, 61);
        assert_eq!(resolved.config.gop.ref_dist, 3);
        assert_eq!(resolved.config.target_usage, Some(7));
        assert_eq!(resolved.side_channel.get("preset"), Some("veryfast"));
    }

    #[test]
    fn test_scenario_hyper_encode_limits() {
        let p = profile(
            Codec::Hevc,
            true,
            &[CapabilityFlag::RateControlIcq, CapabilityFlag::HyperEncode],
        );
        let mut job = JobParameters::with_quality(EncoderKind::H265, 24.0)
            .option("gop-pic-size", "200")
            .option("hyperencode", "adaptive");
        job.async_depth = Some(4);
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();

        assert!(resolved.config.gop.pic_size <= 60);
        assert!(resolved.config.async_depth >= 60);
        assert_eq!(resolved.config.gop.idr_interval, Some(1));
        assert_eq!(resolved.config.hyper_mode, HyperMode::Adaptive);
        assert_eq!(resolved.side_channel.get("async_depth"), Some("60"));
        assert_eq!(resolved.side_channel.get("dual_gfx"), Some("adaptive"));
        assert_eq!(resolved.side_channel.param("IdrInterval"), Some("1"));
        assert_eq!(resolved.side_channel.param("GopPicSize"), Some("60"));
    }

    #[test]
    fn test_hevc_main10_qp_boundary() {
        let p = profile(Codec::Hevc, false, &[]);
        let job = |quality| {
            let mut job = JobParameters::with_quality(EncoderKind::H265_10bit, quality);
            job.profile = Some("main10".to_string());
            job
        };

        let resolved = resolve_job(&p, GenerationTier::G7, job(63.0)).unwrap();
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::Cqp));
        assert_eq!(resolved.config.output.qp_i, 63);

        let resolved = resolve_job(&p, GenerationTier::G7, job(64.0)).unwrap();
        assert_eq!(resolved.config.output.qp_i, 63);
        assert_eq!(resolved.config.output.qp_b, 63);
        assert_eq!(resolved.side_channel.get("extbrc"), Some("0"));

        let p8 = profile(Codec::Hevc, false, &[]);
        let job = JobParameters::with_quality(EncoderKind::H265, 60.0);
        let resolved = resolve_job(&p8, GenerationTier::G7, job).unwrap();
        assert_eq!(resolved.config.output.qp_i, 51);
    }

    #[test]
    fn test_cqp_offsets_and_av1_bound() {
        let p = profile(Codec::Av1, false, &[CapabilityFlag::RateControlIcq]);
        let job = JobParameters::with_quality(EncoderKind::Av1, 120.0)
            .option("force-cqp", "1")
            .option("cqp-offset-b", "-10");
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();
        let out = &resolved.config.output;
        assert_eq!(out.method, Some(RateControlMethod::Cqp));
        assert_eq!((out.qp_i, out.qp_p, out.qp_b), (120, 122, 110));
        assert_eq!(
            resolved.side_channel.param("QPB"),
            Some("110"),
            "{:?}",
            resolved.side_channel.get(QSV_PARAMS_KEY)
        );
    }

    #[test]
    fn test_low_power_icq_disabled_before_g8() {
        let p = profile(
            Codec::Hevc,
            true,
            &[CapabilityFlag::RateControlIcq, CapabilityFlag::LowPower],
        );
        let job = JobParameters::with_quality(EncoderKind::H265, 26.0);
        let resolved = resolve_job(&p, GenerationTier::G7, job.clone()).unwrap();
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::Cqp));
        assert_eq!(resolved.side_channel.get("low_power"), Some("1"));

        let resolved = resolve_job(&p, GenerationTier::G8, job).unwrap();
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::Icq));
    }

    #[test]
    fn test_bitrate_modes() {
        let p = profile(Codec::Avc, false, &[]);
        let job = JobParameters::with_bitrate(EncoderKind::H264, 6000);
        let resolved = resolve_job(&p, GenerationTier::G5, job).unwrap();
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::Vbr));
        assert_eq!(resolved.config.output.target_kbps, 6000);
        assert_eq!(resolved.config.output.brc_multiplier, 1);
        assert_eq!(resolved.side_channel.param("RateControlMethod"), Some("2"));

        let job = JobParameters::with_bitrate(EncoderKind::H264, 6000)
            .option("vbv-maxrate", "6000")
            .option("vbv-bufsize", "12000")
            .option("vbv-init", "0.5");
        let resolved = resolve_job(&p, GenerationTier::G5, job).unwrap();
        let out = &resolved.config.output;
        assert_eq!(out.method, Some(RateControlMethod::Cbr));
        assert_eq!(out.max_kbps, 6000);
        assert_eq!(out.buffer_size_kb, 1500);
        assert_eq!(out.initial_delay_kb, 750);
        assert_eq!(
            resolved.side_channel.get(QSV_PARAMS_KEY),
            Some(
                "InitialDelayInKB=750:BufferSizeInKB=1500:MaxKbps=6000:TargetKbps=6000:\
                 RateControlMethod=1:GopPicSize=61:GopRefDist=4:BRCParamMultiplier=1"
            )
        );
    }

    #[test]
    fn test_bitrate_lookahead_forces_extbrc_off() {
        let p = profile(
            Codec::Avc,
            false,
            &[
                CapabilityFlag::RateControlLa,
                CapabilityFlag::CodingOption2,
                CapabilityFlag::ExtBrc,
            ],
        );
        let job = JobParameters::with_bitrate(EncoderKind::H264, 100_000)
            .option("la", "1")
            .option("extbrc", "1")
            .option("la-depth", "10");
        let resolved = resolve_job(&p, GenerationTier::G6, job).unwrap();
        let out = &resolved.config.output;
        assert_eq!(out.method, Some(RateControlMethod::La));
        assert_eq!(out.brc_multiplier, 2);
        assert_eq!(out.target_kbps, 50_000);
        assert_eq!(resolved.side_channel.get("extbrc"), Some("0"));
        // depth 10 hangs the driver
        assert_eq!(resolved.config.coding.lookahead_depth, 11);
    }

    #[test]
    fn test_interlaced_lookahead_needs_flag() {
        let p = profile(Codec::Avc, false, &[CapabilityFlag::RateControlLa]);
        let mut job = JobParameters::with_bitrate(EncoderKind::H264, 4000).option("la", "1");
        job.pic_struct = PicStruct::FieldTff;
        let resolved = resolve_job(&p, GenerationTier::G6, job.clone()).unwrap();
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::Vbr));

        let p = profile(
            Codec::Avc,
            false,
            &[
                CapabilityFlag::RateControlLa,
                CapabilityFlag::RateControlLaInterlaced,
            ],
        );
        let resolved = resolve_job(&p, GenerationTier::G6, job).unwrap();
        assert_eq!(resolved.config.output.method, Some(RateControlMethod::La));
    }

    #[test]
    fn test_video_memory_limits() {
        let p = profile(Codec::Hevc, false, LA_ICQ);
        let mut job = JobParameters::with_quality(EncoderKind::H265, 23.0)
            .option("la", "1")
            .option("la-depth", "100")
            .option("gop-ref-dist", "20");
        job.memory_type = MemoryType::Video;
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();
        assert_eq!(resolved.config.gop.ref_dist, 8);
        assert_eq!(resolved.config.coding.lookahead_depth, 40);

        let mut job = JobParameters::with_quality(EncoderKind::H265, 23.0)
            .option("la", "1")
            .option("gop-ref-dist", "0");
        job.memory_type = MemoryType::Video;
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();
        assert_eq!(resolved.config.gop.ref_dist, 0);
        assert_eq!(resolved.config.coding.lookahead_depth, 40);

        let job = JobParameters::with_quality(EncoderKind::H265, 23.0)
            .option("la", "1")
            .option("la-depth", "100")
            .option("gop-ref-dist", "20");
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();
        assert_eq!(resolved.config.gop.ref_dist, 16);
        assert_eq!(resolved.config.coding.lookahead_depth, 100);
    }

    #[test]
    fn test_default_ref_dist_by_generation() {
        assert_eq!(default_ref_dist(Codec::Hevc, GenerationTier::G8), 8);
        assert_eq!(default_ref_dist(Codec::Av1, GenerationTier::G9), 8);
        assert_eq!(default_ref_dist(Codec::Avc, GenerationTier::G9), 4);
        assert_eq!(default_ref_dist(Codec::Hevc, GenerationTier::G7), 4);
    }

    #[test]
    fn test_default_gop_size() {
        assert_eq!(default_gop_size(25, 1), 51);
        assert_eq!(default_gop_size(30000, 1001), 60);
        assert_eq!(default_gop_size(120, 1), 120);
    }

    #[test]
    fn test_screen_content_side_options() {
        let p = profile(
            Codec::Av1,
            true,
            &[CapabilityFlag::Av1ScreenContent, CapabilityFlag::LowPower],
        );
        let job = JobParameters::with_bitrate(EncoderKind::Av1, 3000)
            .option("palette", "1")
            .option("intrabc", "0");
        let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();
        assert_eq!(resolved.side_channel.get("palette_mode"), Some("1"));
        assert_eq!(resolved.side_channel.get("intrabc"), None);
    }

    #[test]
    fn test_invalid_rate_control() {
        let p = profile(Codec::Avc, false, &[]);
        let mut encode = EncodeJob::new(&p, GenerationTier::G5, JobParameters::default()).unwrap();
        encode.apply_options().unwrap();
        encode.sanitize().unwrap();
        assert_eq!(
            encode.resolve(),
            Err(ResolveError::InvalidRateControl {
                quality: INVALID_QUALITY,
                bitrate: 0
            })
        );
        assert_eq!(encode.state(), ResolveState::Sanitized);
    }

    #[test]
    fn test_out_of_order_calls() {
        let p = profile(Codec::Avc, false, &[]);
        let job = JobParameters::with_bitrate(EncoderKind::H264, 1000);
        let mut encode = EncodeJob::new(&p, GenerationTier::G5, job).unwrap();

        assert_eq!(
            encode.sanitize(),
            Err(ResolveError::InvalidTransition {
                from: ResolveState::Created,
                to: ResolveState::Sanitized
            })
        );
        encode.apply_options().unwrap();
        assert!(encode.apply_options().is_err());
        encode.sanitize().unwrap();
        encode.resolve().unwrap();
        assert_eq!(encode.state(), ResolveState::Resolved);
        assert!(matches!(
            encode.resolve(),
            Err(ResolveError::InvalidTransition {
                from: ResolveState::Resolved,
                ..
            })
        ));
    }

    #[test]
    fn test_unavailable_codec() {
        let p = CodecCapabilityProfile::unavailable(
            Codec::Av1,
            ImplementationKind::Hardware,
            ApiVersion::new(2, 9),
        );
        let job = JobParameters::with_quality(EncoderKind::Av1, 30.0);
        assert_eq!(
            EncodeJob::new(&p, GenerationTier::G9, job).unwrap_err(),
            ResolveError::Unavailable { codec: Codec::Av1 }
        );

        let p = profile(Codec::Hevc, false, &[]);
        let job = JobParameters::with_quality(EncoderKind::H264, 30.0);
        assert!(EncodeJob::new(&p, GenerationTier::G9, job).is_err());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let p = profile(Codec::Hevc, false, LA_ICQ);
        let job = JobParameters::with_bitrate(EncoderKind::H265, 8000)
            .option("la", "1")
            .option("vbv-bufsize", "16000")
            .option("scenecut", "0");
        let first = resolve_job(&p, GenerationTier::G9, job.clone()).unwrap();
        let second = resolve_job(&p, GenerationTier::G9, job).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.side_channel.param("GopOptFlag"), Some("2"));
    }

    proptest! {
        #[test]
        fn prop_brc_fields_fit_in_16_bits(
            bitrate in 0u32..=i32::MAX as u32,
            vbv_max in 0u32..=i32::MAX as u32,
            vbv_size in 0u32..=i32::MAX as u32,
        ) {
            let m = u32::from(brc_multiplier(bitrate, vbv_max, vbv_size, 0.0));
            prop_assert!(m >= 1);
            for value in [bitrate, vbv_max, vbv_size] {
                let scaled = value / m;
                prop_assert!(scaled <= u32::from(u16::MAX));
                // Lossy but bounded
                prop_assert!(value - scaled * m < m);
            }
        }

        #[test]
        fn prop_target_kbps_round_trips_for_any_bitrate(bitrate in 1u32..=u32::MAX) {
            let p = profile(Codec::Avc, false, &[]);
            let job = JobParameters::with_bitrate(EncoderKind::H264, bitrate);
            let resolved = resolve_job(&p, GenerationTier::G9, job).unwrap();

            let accepted = bitrate.min(MAX_BITRATE_KBPS);
            let m = u32::from(resolved.config.output.brc_multiplier);
            let scaled = u32::from(resolved.config.output.target_kbps);
            prop_assert!(m >= 1);
            prop_assert!(accepted - scaled * m < m);
        }
    }
}
