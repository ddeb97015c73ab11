//! Per-codec capability probing
//!
//! The vendor query API is known to lie in both directions, so probing is
//! layered:
//!
//! 1. Availability: a mode-2 query with a nominal parameter set, confirmed
//!    by a real encoder init/close. A successful query alone is not trusted.
//! 2. Flags that cannot be queried are derived from [`GenerationTier`] and
//!    the implementation kind.
//! 3. Flags implied by the API version.
//! 4. Queryable features, each probed in isolation. Some of them are also
//!    gated on a minimum generation because older drivers report them
//!    incorrectly.
//!
//! No individual failure is propagated: a failed query leaves its flag
//! unset and probing moves on.

use serde::Serialize;
use tracing::{debug, warn};

use super::capabilities::{CapabilityFlag, CapabilitySet};
use super::error::{ProbeError, ProbeResult};
use super::generation::GenerationTier;
use super::session::{
    CodingOption2, DeviceSession, ExtensionBuffer, HyperMode, PicStruct, RateControlMethod,
    VideoParams,
};
use super::{ApiVersion, Codec, ImplementationKind};

/// What to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTarget {
    pub codec: Codec,
    pub kind: ImplementationKind,
    /// API version negotiated by the session
    pub version: ApiVersion,
    /// Generation of the adapter the session belongs to
    pub tier: GenerationTier,
    /// Probe the fixed-function (low-power) encoder; ignored for software
    pub low_power: bool,
}

/// Confirmed capabilities of one codec/implementation pair
///
/// Built once by [`probe`] and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecCapabilityProfile {
    codec: Codec,
    kind: ImplementationKind,
    available: bool,
    capabilities: CapabilitySet,
    version: ApiVersion,
    low_power: bool,
}

impl CodecCapabilityProfile {
    /// Profile of an available encoder with a known capability set
    pub fn new(
        codec: Codec,
        kind: ImplementationKind,
        version: ApiVersion,
        low_power: bool,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            codec,
            kind,
            available: true,
            capabilities,
            version,
            low_power,
        }
    }

    pub fn unavailable(codec: Codec, kind: ImplementationKind, version: ApiVersion) -> Self {
        Self {
            codec,
            kind,
            available: false,
            capabilities: CapabilitySet::empty(),
            version,
            low_power: false,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn kind(&self) -> ImplementationKind {
        self.kind
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn has(&self, flag: CapabilityFlag) -> bool {
        self.capabilities.contains(flag)
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Whether the low-power encoder was the one probed
    pub fn low_power(&self) -> bool {
        self.low_power
    }
}

/// Probe one codec/implementation pair on an open session
pub fn probe<S: DeviceSession + ?Sized>(
    session: &mut S,
    target: &ProbeTarget,
) -> CodecCapabilityProfile {
    let codec = target.codec;
    let version = target.version;
    // Software has no fixed-function encoder
    let low_power = target.low_power && target.kind.is_hardware();

    if !version.is_minimum_supported() {
        debug!(
            "Skipping {} {} probe: API {} below minimum",
            target.kind, codec, version
        );
        return CodecCapabilityProfile::unavailable(codec, target.kind, version);
    }

    // Step 1: availability (query + init)
    if let Err(e) = check_availability(session, target.kind, codec, low_power) {
        debug!("{} {} encoder unavailable: {}", target.kind, codec, e);
        // Step 2: no further flags for an encoder that cannot run
        return CodecCapabilityProfile::unavailable(codec, target.kind, version);
    }

    let mut caps = CapabilitySet::empty();

    // Step 3: flags that can't be queried
    apply_generation_gates(&mut caps, target);

    // Step 4: flags implied by the API version
    if version.at_least(1, 6) {
        caps.insert(CapabilityFlag::MsdkApi1_6);
    }
    if version.at_least(1, 19) && target.tier >= GenerationTier::G7 {
        caps.insert(CapabilityFlag::VppScaling);
    }
    if version.at_least(1, 33) && target.tier >= GenerationTier::G7 {
        caps.insert(CapabilityFlag::VppInterpolation);
    }

    // Step 5: queryable features, each isolated
    probe_rate_control(session, target, low_power, &mut caps);
    probe_signal_and_coding(session, target, low_power, &mut caps);
    probe_hdr_metadata(session, target, low_power, &mut caps);
    if low_power {
        probe_low_power_extensions(session, target, &mut caps);
    }

    debug!(
        "{} {} capabilities: {}",
        target.kind,
        codec,
        caps.summary()
    );

    CodecCapabilityProfile::new(codec, target.kind, version, low_power, caps)
}

fn check_availability<S: DeviceSession + ?Sized>(
    session: &mut S,
    kind: ImplementationKind,
    codec: Codec,
    low_power: bool,
) -> ProbeResult<()> {
    let response = session.query_params(&VideoParams::nominal(codec, low_power))?;
    if response.codec != Some(codec) {
        return Err(ProbeError::CodecMismatch {
            expected: codec,
            returned: response.codec,
        });
    }

    // The query may claim support (e.g. HEVC on Haswell) that init then refuses
    let init = session.init_encoder(&response);
    session.close_encoder();
    if let (Err(e), Codec::Avc) = (&init, codec) {
        // AVC init should never fail once the query passed
        warn!("{} {} encoder init failed: {}", kind, codec, e);
    }
    init
}

fn apply_generation_gates(caps: &mut CapabilitySet, target: &ProbeTarget) {
    if target.kind.is_hardware() {
        if target.tier >= GenerationTier::G3 {
            caps.insert(CapabilityFlag::BRefPyramid);
        }
        let low_power_encoder = match target.codec {
            Codec::Avc | Codec::Hevc => target.tier >= GenerationTier::G7,
            Codec::Av1 => target.tier > GenerationTier::G8,
        };
        if low_power_encoder {
            caps.insert(CapabilityFlag::LowPower);
        }
    } else if target.version.at_least(1, 6) {
        caps.insert(CapabilityFlag::BRefPyramid);
    }
}

/// Record the outcome of one isolated query
fn confirm(caps: &mut CapabilitySet, flag: CapabilityFlag, outcome: ProbeResult<bool>) {
    match outcome {
        Ok(true) => {
            if !caps.insert(flag) {
                debug!("{} confirmed but its prerequisite is missing", flag);
            }
        }
        Ok(false) => debug!("{} not supported", flag),
        Err(e) => debug!("{} probe failed: {}", flag, e),
    }
}

/// Mode-2 check that the runtime keeps the requested rate control (and,
/// for interlaced lookahead, the requested field order)
fn query_rate_control<S: DeviceSession + ?Sized>(
    session: &mut S,
    request: VideoParams,
) -> ProbeResult<bool> {
    let response = session.query_params(&request)?;
    Ok(response.rate_control == request.rate_control
        && response.frame.pic_struct == request.frame.pic_struct)
}

fn probe_rate_control<S: DeviceSession + ?Sized>(
    session: &mut S,
    target: &ProbeTarget,
    low_power: bool,
    caps: &mut CapabilitySet,
) {
    // Mode 1 gives false negatives here, so use mode 2 and treat an error
    // as unsupported. LA and ICQ together imply LA_ICQ.
    if target.version.at_least(1, 7) {
        let la = VideoParams::nominal(target.codec, low_power)
            .with_rate_control(RateControlMethod::La);
        confirm(caps, CapabilityFlag::RateControlLa, query_rate_control(session, la));

        if caps.contains(CapabilityFlag::RateControlLa) {
            let interlaced = la.with_pic_struct(PicStruct::FieldTff);
            confirm(
                caps,
                CapabilityFlag::RateControlLaInterlaced,
                query_rate_control(session, interlaced),
            );
        }
    }

    if target.version.at_least(1, 8) {
        let mut icq = VideoParams::nominal(target.codec, low_power)
            .with_rate_control(RateControlMethod::Icq);
        icq.icq_quality = 20;
        confirm(caps, CapabilityFlag::RateControlIcq, query_rate_control(session, icq));
    }
}

fn probe_signal_and_coding<S: DeviceSession + ?Sized>(
    session: &mut S,
    target: &ProbeTarget,
    low_power: bool,
    caps: &mut CapabilitySet,
) {
    let params = VideoParams::nominal(target.codec, low_power);
    let version = target.version;
    let hardware = target.kind.is_hardware();
    let tier = target.tier;

    if version.at_least(1, 3) {
        let outcome = session
            .query_features(
                &params,
                &ExtensionBuffer::VideoSignalInfo {
                    colour_description: true,
                },
            )
            .map(|_| true);
        if let (Err(e), Codec::Avc) = (&outcome, target.codec) {
            warn!("{} VideoSignalInfo check failed: {}", target.kind, e);
        }
        confirm(caps, CapabilityFlag::VuiSignalInfo, outcome);
    }

    // Every runtime supports the first coding-option block
    let outcome = session
        .query_features(
            &params,
            &ExtensionBuffer::CodingOption {
                au_delimiter: false,
                pic_timing_sei: false,
                cavlc: false,
            },
        )
        .map(|_| true);
    if let (Err(e), Codec::Avc) = (&outcome, target.codec) {
        warn!("{} CodingOption check failed: {}", target.kind, e);
    }
    confirm(caps, CapabilityFlag::CodingOption1, outcome);

    // Mode 1 over-reports here rather than under-reporting, which is the
    // easier direction to sanitize
    if version.at_least(1, 6) {
        let request = ExtensionBuffer::CodingOption2(CodingOption2::probe_request());
        match session.query_features(&params, &request) {
            Ok(response) => {
                caps.insert(CapabilityFlag::CodingOption2);
                let echoed = match response {
                    ExtensionBuffer::CodingOption2(fields) => fields,
                    _ => CodingOption2::default(),
                };

                if hardware && tier >= GenerationTier::G3 && echoed.mbbrc {
                    caps.insert(CapabilityFlag::Mbbrc);
                }
                if hardware && tier >= GenerationTier::G2 && echoed.ext_brc {
                    caps.insert(CapabilityFlag::ExtBrc);
                }
                if version.at_least(1, 7)
                    && hardware
                    && tier >= GenerationTier::G3
                    && echoed.trellis != 0
                {
                    caps.insert(CapabilityFlag::Trellis);
                }
                if version.at_least(1, 8) {
                    if echoed.repeat_pps {
                        caps.insert(CapabilityFlag::RepeatPps);
                    }
                    if caps.contains(CapabilityFlag::BRefPyramid) && echoed.b_ref_pyramid {
                        caps.insert(CapabilityFlag::BRefType);
                    }
                    if caps.contains(CapabilityFlag::RateControlLa) && echoed.lookahead_ds != 0 {
                        caps.insert(CapabilityFlag::LookaheadDownsampling);
                    }
                    if echoed.adaptive_i && echoed.adaptive_b {
                        caps.insert(CapabilityFlag::AdaptiveIB);
                    }
                    if echoed.num_mb_per_slice != 0 {
                        caps.insert(CapabilityFlag::MbPerSlice);
                    }
                }
            }
            Err(e) => warn!("{} {} CodingOption2 check failed: {}", target.kind, target.codec, e),
        }
    }

    if version.at_least(1, 13) && target.codec == Codec::Avc {
        let outcome = session
            .query_features(&params, &ExtensionBuffer::ChromaLocInfo { present: true })
            .map(|_| true);
        confirm(caps, CapabilityFlag::VuiChromaLocation, outcome);
    }
}

fn probe_hdr_metadata<S: DeviceSession + ?Sized>(
    session: &mut S,
    target: &ProbeTarget,
    low_power: bool,
    caps: &mut CapabilitySet,
) {
    if !target.version.at_least(1, 25) || target.codec == Codec::Avc {
        return;
    }

    let params = VideoParams::nominal(target.codec, low_power);
    let mastering = session
        .query_features(
            &params,
            &ExtensionBuffer::MasteringDisplayColourVolume {
                insert_payload: false,
            },
        )
        .map(|_| true);
    confirm(caps, CapabilityFlag::VuiMasteringDisplay, mastering);

    let light_level = session
        .query_features(
            &params,
            &ExtensionBuffer::ContentLightLevel {
                insert_payload: false,
            },
        )
        .map(|_| true);
    confirm(caps, CapabilityFlag::VuiContentLightLevel, light_level);
}

fn probe_low_power_extensions<S: DeviceSession + ?Sized>(
    session: &mut S,
    target: &ProbeTarget,
    caps: &mut CapabilitySet,
) {
    // Both adapters of a cooperative pair need identical structure
    let cooperative = VideoParams::cooperative(target.codec, true);
    let hyper = session
        .query_features(&cooperative, &ExtensionBuffer::HyperMode(HyperMode::On))
        .map(|response| response == ExtensionBuffer::HyperMode(HyperMode::On));
    confirm(caps, CapabilityFlag::HyperEncode, hyper);

    if target.codec != Codec::Av1 {
        return;
    }

    let params = VideoParams::nominal(Codec::Av1, true);
    let bitstream = session
        .query_features(
            &params,
            &ExtensionBuffer::Av1Bitstream {
                write_ivf_headers: false,
            },
        )
        .map(|_| true);
    confirm(caps, CapabilityFlag::Av1Bitstream, bitstream);

    let screen_content = session
        .query_features(
            &params,
            &ExtensionBuffer::Av1ScreenContentTools {
                intra_block_copy: true,
                palette: true,
            },
        )
        .map(|response| {
            matches!(
                response,
                ExtensionBuffer::Av1ScreenContentTools {
                    intra_block_copy: true,
                    ..
                }
            )
        });
    confirm(caps, CapabilityFlag::Av1ScreenContent, screen_content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::session::MockDeviceSession;

    fn target(codec: Codec, kind: ImplementationKind, tier: GenerationTier) -> ProbeTarget {
        ProbeTarget {
            codec,
            kind,
            version: ApiVersion::new(2, 9),
            tier,
            low_power: true,
        }
    }

    /// Session that echoes every request back
    fn echo_session() -> MockDeviceSession {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| Ok(*req));
        session.expect_init_encoder().returning(|_| Ok(()));
        session.expect_close_encoder().return_const(());
        session
            .expect_query_features()
            .returning(|_, req| Ok(*req));
        session
    }

    #[test]
    fn test_failed_query_is_unavailable() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().times(1).returning(|_| {
            Err(ProbeError::CallFailed {
                call: "query_params",
                status: -3,
            })
        });
        session.expect_init_encoder().never();

        let profile = probe(
            &mut session,
            &target(Codec::Hevc, ImplementationKind::Hardware, GenerationTier::G8),
        );
        assert!(!profile.is_available());
        assert!(profile.capabilities().is_empty());
    }

    #[test]
    fn test_query_success_but_init_failure_is_unavailable() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| Ok(*req));
        session.expect_init_encoder().times(1).returning(|_| {
            Err(ProbeError::CallFailed {
                call: "init_encoder",
                status: -16,
            })
        });
        session.expect_close_encoder().times(1).return_const(());
        session.expect_query_features().never();

        let profile = probe(
            &mut session,
            &target(Codec::Hevc, ImplementationKind::Hardware, GenerationTier::G3),
        );
        assert!(!profile.is_available());
        assert!(profile.capabilities().is_empty());
    }

    #[test]
    fn test_codec_mismatch_is_unavailable() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| {
            let mut response = *req;
            response.codec = Some(Codec::Avc);
            Ok(response)
        });
        session.expect_init_encoder().never();

        let profile = probe(
            &mut session,
            &target(Codec::Av1, ImplementationKind::Hardware, GenerationTier::G9),
        );
        assert!(!profile.is_available());
    }

    #[test]
    fn test_old_api_is_not_probed() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().never();

        let mut t = target(Codec::Avc, ImplementationKind::Hardware, GenerationTier::G5);
        t.version = ApiVersion::new(1, 2);
        assert!(!probe(&mut session, &t).is_available());
    }

    #[test]
    fn test_full_hardware_probe() {
        let mut session = echo_session();
        let profile = probe(
            &mut session,
            &target(Codec::Av1, ImplementationKind::Hardware, GenerationTier::G9),
        );

        assert!(profile.is_available());
        assert!(profile.low_power());
        for flag in [
            CapabilityFlag::BRefPyramid,
            CapabilityFlag::LowPower,
            CapabilityFlag::RateControlLa,
            CapabilityFlag::RateControlLaInterlaced,
            CapabilityFlag::RateControlIcq,
            CapabilityFlag::CodingOption2,
            CapabilityFlag::Mbbrc,
            CapabilityFlag::BRefType,
            CapabilityFlag::LookaheadDownsampling,
            CapabilityFlag::VuiMasteringDisplay,
            CapabilityFlag::HyperEncode,
            CapabilityFlag::Av1Bitstream,
            CapabilityFlag::Av1ScreenContent,
            CapabilityFlag::VppInterpolation,
        ] {
            assert!(profile.has(flag), "missing {flag}");
        }
        // Chroma location is only probed for AVC
        assert!(!profile.has(CapabilityFlag::VuiChromaLocation));
        assert!(profile.capabilities().prerequisites_hold());
    }

    #[test]
    fn test_software_forces_low_power_off() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| {
            assert!(!req.low_power);
            Ok(*req)
        });
        session.expect_init_encoder().returning(|_| Ok(()));
        session.expect_close_encoder().return_const(());
        session.expect_query_features().returning(|params, req| {
            assert!(!params.low_power);
            Ok(*req)
        });

        let profile = probe(
            &mut session,
            &target(Codec::Avc, ImplementationKind::Software, GenerationTier::G9),
        );
        assert!(profile.is_available());
        assert!(!profile.low_power());
        // Software B-pyramid comes from the API version, not the tier
        assert!(profile.has(CapabilityFlag::BRefPyramid));
        assert!(!profile.has(CapabilityFlag::LowPower));
        // Extended BRC flags are hardware-only
        assert!(!profile.has(CapabilityFlag::Mbbrc));
        assert!(!profile.has(CapabilityFlag::HyperEncode));
    }

    #[test]
    fn test_old_generation_ignores_reported_brc_flags() {
        let mut session = echo_session();
        let profile = probe(
            &mut session,
            &target(Codec::Avc, ImplementationKind::Hardware, GenerationTier::G2),
        );
        assert!(profile.has(CapabilityFlag::CodingOption2));
        assert!(profile.has(CapabilityFlag::ExtBrc));
        assert!(!profile.has(CapabilityFlag::Mbbrc));
        assert!(!profile.has(CapabilityFlag::Trellis));
        // No B-pyramid below G3, so no direct B-ref control either
        assert!(!profile.has(CapabilityFlag::BRefType));
    }

    #[test]
    fn test_lookahead_failure_does_not_abort_other_probes() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| {
            if req.rate_control == Some(RateControlMethod::La) {
                Err(ProbeError::CallFailed {
                    call: "query_params",
                    status: -3,
                })
            } else {
                Ok(*req)
            }
        });
        session.expect_init_encoder().returning(|_| Ok(()));
        session.expect_close_encoder().return_const(());
        session.expect_query_features().returning(|_, req| Ok(*req));

        let profile = probe(
            &mut session,
            &target(Codec::Hevc, ImplementationKind::Hardware, GenerationTier::G8),
        );
        assert!(!profile.has(CapabilityFlag::RateControlLa));
        assert!(!profile.has(CapabilityFlag::LookaheadDownsampling));
        assert!(profile.has(CapabilityFlag::RateControlIcq));
        assert!(profile.has(CapabilityFlag::VuiSignalInfo));
    }

    #[test]
    fn test_lookahead_downgraded_rate_control_is_rejected() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| {
            let mut response = *req;
            if req.rate_control == Some(RateControlMethod::La) {
                response.rate_control = Some(RateControlMethod::Vbr);
            }
            Ok(response)
        });
        session.expect_init_encoder().returning(|_| Ok(()));
        session.expect_close_encoder().return_const(());
        session.expect_query_features().returning(|_, req| Ok(*req));

        let profile = probe(
            &mut session,
            &target(Codec::Avc, ImplementationKind::Hardware, GenerationTier::G6),
        );
        assert!(!profile.has(CapabilityFlag::RateControlLa));
        assert!(profile.has(CapabilityFlag::VuiChromaLocation));
    }

    #[test]
    fn test_hyper_mode_must_be_echoed() {
        let mut session = MockDeviceSession::new();
        session.expect_query_params().returning(|req| Ok(*req));
        session.expect_init_encoder().returning(|_| Ok(()));
        session.expect_close_encoder().return_const(());
        session.expect_query_features().returning(|params, req| match req {
            ExtensionBuffer::HyperMode(_) => {
                assert_eq!(params.gop_pic_size, 60);
                Ok(ExtensionBuffer::HyperMode(HyperMode::Off))
            }
            other => Ok(*other),
        });

        let profile = probe(
            &mut session,
            &target(Codec::Hevc, ImplementationKind::Hardware, GenerationTier::G9),
        );
        assert!(!profile.has(CapabilityFlag::HyperEncode));
        assert!(profile.has(CapabilityFlag::LowPower));
    }
}
