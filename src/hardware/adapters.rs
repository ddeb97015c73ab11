//! Adapter registry
//!
//! Discovery runs once per process. It enumerates every hardware
//! implementation matching the Intel vendor filter, classifies each adapter,
//! picks the highest-generation one as the default, and then probes the
//! software and hardware codec paths of every adapter.
//!
//! After discovery the registry is read-only. Per-job adapter selection is
//! an explicit [`AdapterContext`] value rather than shared mutable state, so
//! one job choosing `gpu=1` never affects another.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::error::{DiscoveryError, DiscoveryResult};
use super::generation::{classify, DecodeSupport, GenerationTier, PlatformCode};
use super::probe::{probe, CodecCapabilityProfile, ProbeTarget};
use super::session::{
    DeviceRuntime, DeviceSession, DisplayProvider, ImplementationFilter, MediaAdapterType,
    PlatformInfo, SessionTarget,
};
use super::{ApiVersion, Codec, EncoderKind, ImplementationKind, INTEL_VENDOR_ID};

/// AVC decode is limited to this many pixels in each dimension
pub const AVC_DECODE_MAX_DIMENSION: u32 = 4096;

/// Version requested when opening the software and hardware probing sessions
///
/// Some driver combinations misbehave with an unset version, so ask for the
/// lowest real one.
const PROBE_SESSION_VERSION: ApiVersion = ApiVersion::new(1, 0);

/// Identity of one discovered adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterDescriptor {
    /// Vendor-assigned adapter index
    pub index: u32,
    pub media_type: MediaAdapterType,
    pub platform: PlatformCode,
    pub tier: GenerationTier,
    pub impl_name: String,
    pub impl_path: Option<PathBuf>,
    /// DRM render node number (`128` for `/dev/dri/renderD128`)
    pub render_node: Option<u32>,
}

/// Which implementation wins when both software and hardware are available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplementationPreference {
    #[default]
    Hardware,
    Software,
}

impl ImplementationPreference {
    fn kind(&self) -> ImplementationKind {
        match self {
            ImplementationPreference::Hardware => ImplementationKind::Hardware,
            ImplementationPreference::Software => ImplementationKind::Software,
        }
    }
}

/// Everything discovery learned about one adapter
#[derive(Debug, Clone, Serialize)]
pub struct AdapterDetails {
    pub descriptor: AdapterDescriptor,
    pub software_version: Option<ApiVersion>,
    pub hardware_version: Option<ApiVersion>,
    profiles: Vec<CodecCapabilityProfile>,
    preferred: BTreeMap<Codec, ImplementationKind>,
}

impl AdapterDetails {
    fn new(descriptor: AdapterDescriptor) -> Self {
        Self {
            descriptor,
            software_version: None,
            hardware_version: None,
            profiles: Vec::new(),
            preferred: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> u32 {
        self.descriptor.index
    }

    pub fn tier(&self) -> GenerationTier {
        self.descriptor.tier
    }

    /// All probed profiles
    pub fn profiles(&self) -> &[CodecCapabilityProfile] {
        &self.profiles
    }

    pub fn profile(
        &self,
        codec: Codec,
        kind: ImplementationKind,
    ) -> Option<&CodecCapabilityProfile> {
        self.profiles
            .iter()
            .find(|p| p.codec() == codec && p.kind() == kind)
    }

    /// Implementation kind selected for `codec`, if any is available
    pub fn preferred_kind(&self, codec: Codec) -> Option<ImplementationKind> {
        self.preferred.get(&codec).copied()
    }

    /// The profile encode jobs should use for `codec`
    pub fn preferred_profile(&self, codec: Codec) -> Option<&CodecCapabilityProfile> {
        self.preferred_kind(codec)
            .and_then(|kind| self.profile(codec, kind))
    }

    fn select_preferred(&mut self, preference: ImplementationPreference) {
        let wanted = preference.kind();
        for codec in Codec::ALL {
            let available = |kind| {
                self.profile(codec, kind)
                    .is_some_and(CodecCapabilityProfile::is_available)
            };
            let choice = if available(wanted) {
                Some(wanted)
            } else if available(wanted.other()) {
                Some(wanted.other())
            } else {
                None
            };
            if let Some(kind) = choice {
                self.preferred.insert(codec, kind);
            }
        }
    }
}

/// Adapter chosen for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdapterContext {
    pub index: u32,
    pub tier: GenerationTier,
    /// True when the job asked for this adapter rather than getting the default
    pub explicit: bool,
}

/// Discovered adapters and their probed capabilities
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: Vec<AdapterDetails>,
    default_index: u32,
    preference: ImplementationPreference,
}

impl AdapterRegistry {
    /// Create an empty registry that prefers hardware implementations
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preference(preference: ImplementationPreference) -> Self {
        Self {
            preference,
            ..Self::default()
        }
    }

    /// Enumerate, classify, and probe every adapter
    ///
    /// Returns the discovered adapters. Only loader failure and an empty
    /// enumeration are errors; individual adapters that fail to open are
    /// logged and skipped.
    pub fn discover<R, D>(
        &mut self,
        runtime: &mut R,
        displays: &mut D,
    ) -> DiscoveryResult<&[AdapterDetails]>
    where
        R: DeviceRuntime,
        D: DisplayProvider + ?Sized,
    {
        if !self.adapters.is_empty() {
            return Err(DiscoveryError::AlreadyInitialized);
        }

        info!("Discovering Quick Sync adapters...");

        let filter = ImplementationFilter {
            kind: ImplementationKind::Hardware,
            vendor_id: INTEL_VENDOR_ID,
        };
        let implementations =
            runtime
                .enumerate(&filter)
                .map_err(|e| DiscoveryError::LoaderUnavailable {
                    reason: e.to_string(),
                })?;
        debug!("Loader reported {} implementation(s)", implementations.len());

        let mut descriptors = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut max_tier = GenerationTier::G0;
        let mut default_index = None;

        for implementation in implementations {
            let mut session = match runtime.open_session(&SessionTarget::Enumerated {
                ordinal: implementation.ordinal,
            }) {
                Ok(session) => session,
                Err(e) => {
                    warn!(
                        "Failed to open session on implementation {} ({}): {}",
                        implementation.ordinal, implementation.impl_name, e
                    );
                    errors.push(format!("{}: {}", implementation.impl_name, e));
                    continue;
                }
            };

            let display = implementation
                .render_node
                .and_then(|node| displays.acquire(node));
            if let Some(handle) = &display {
                if let Err(e) = session.set_display_handle(handle) {
                    debug!("Failed to set display handle: {}", e);
                }
            }

            let platform = match session.query_platform() {
                Ok(platform) => platform,
                Err(e) => {
                    warn!(
                        "Platform query failed on implementation {}: {}",
                        implementation.ordinal, e
                    );
                    PlatformInfo::default()
                }
            };

            let tier = classify(platform.code);
            if tier > max_tier {
                max_tier = tier;
                default_index = Some(implementation.vendor_impl_id);
            }

            session.close();
            // Display must outlive the session that used it
            if let Some(handle) = display {
                displays.release(handle);
            }

            debug!(
                "Adapter {}: {} ({}), tier {}",
                implementation.vendor_impl_id, platform.code, platform.media_type, tier
            );

            descriptors.push(AdapterDescriptor {
                index: implementation.vendor_impl_id,
                media_type: platform.media_type,
                platform: platform.code,
                tier,
                impl_name: implementation.impl_name,
                impl_path: implementation.impl_path,
                render_node: implementation.render_node,
            });
        }

        let Some(first) = descriptors.first() else {
            let reason = if errors.is_empty() {
                "no implementation matched the vendor filter".to_string()
            } else {
                errors.join("; ")
            };
            return Err(DiscoveryError::NoAdapters { reason });
        };
        self.default_index = default_index.unwrap_or(first.index);

        for descriptor in descriptors {
            let details = collect_details(runtime, displays, descriptor, self.preference);
            self.adapters.push(details);
        }

        info!(
            "Discovered {} adapter(s), default adapter {}",
            self.adapters.len(),
            self.default_index
        );
        Ok(&self.adapters)
    }

    pub fn adapters(&self) -> &[AdapterDetails] {
        &self.adapters
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Index of the highest-generation adapter
    pub fn default_index(&self) -> u32 {
        self.default_index
    }

    pub fn preference(&self) -> ImplementationPreference {
        self.preference
    }

    pub fn select(&self, index: u32) -> DiscoveryResult<&AdapterDetails> {
        self.get(index)
            .ok_or(DiscoveryError::AdapterNotFound { index })
    }

    fn get(&self, index: u32) -> Option<&AdapterDetails> {
        self.adapters.iter().find(|a| a.index() == index)
    }

    /// Render node number for an adapter, `0` when unknown
    pub fn render_handle(&self, index: u32) -> u32 {
        self.get(index)
            .and_then(|a| a.descriptor.render_node)
            .unwrap_or(0)
    }

    /// Generation of an adapter; `Unspecified` for unknown indices
    pub fn tier(&self, index: u32) -> GenerationTier {
        self.get(index)
            .map(AdapterDetails::tier)
            .unwrap_or_default()
    }

    /// Context for a job using the default adapter
    pub fn context(&self) -> AdapterContext {
        AdapterContext {
            index: self.default_index,
            tier: self.tier(self.default_index),
            explicit: false,
        }
    }

    /// Context for a job that may have asked for a specific adapter
    ///
    /// An unknown index falls back to the default adapter.
    pub fn context_for(&self, requested: Option<u32>) -> AdapterContext {
        match requested {
            Some(index) => match self.get(index) {
                Some(adapter) => AdapterContext {
                    index,
                    tier: adapter.tier(),
                    explicit: true,
                },
                None => {
                    warn!(
                        "Adapter {} not found, using default adapter {}",
                        index, self.default_index
                    );
                    self.context()
                }
            },
            None => self.context(),
        }
    }

    /// Preferred profile for `codec` on an adapter
    pub fn encoder_profile(&self, index: u32, codec: Codec) -> Option<&CodecCapabilityProfile> {
        self.get(index)?.preferred_profile(codec)
    }

    pub fn encoder_available(&self, index: u32, encoder: EncoderKind) -> bool {
        let tier = self.tier(index);
        if tier < GenerationTier::G5 {
            return false;
        }
        if encoder == EncoderKind::H265_10bit && tier < GenerationTier::G6 {
            return false;
        }
        self.encoder_profile(index, encoder.codec())
            .is_some_and(CodecCapabilityProfile::is_available)
    }

    /// True if any adapter can run `encoder`
    pub fn any_encoder_available(&self, encoder: EncoderKind) -> bool {
        self.adapters
            .iter()
            .any(|a| self.encoder_available(a.index(), encoder))
    }

    /// Encoders usable on at least one adapter
    pub fn available_encoders(&self) -> Vec<EncoderKind> {
        EncoderKind::ALL
            .into_iter()
            .filter(|e| self.any_encoder_available(*e))
            .collect()
    }

    pub fn hyper_encode_available(&self, index: u32) -> bool {
        self.get(index).is_some_and(|adapter| {
            Codec::ALL.into_iter().any(|codec| {
                adapter
                    .preferred_profile(codec)
                    .is_some_and(|p| p.has(super::CapabilityFlag::HyperEncode))
            })
        })
    }

    pub fn decode_support(&self, index: u32) -> DecodeSupport {
        DecodeSupport::for_tier(self.tier(index))
    }

    /// Whether the adapter can hardware-decode a stream
    ///
    /// `ten_bit` only matters for HEVC; AV1 decode covers both depths.
    pub fn decode_supported(
        &self,
        index: u32,
        codec: Codec,
        ten_bit: bool,
        width: u32,
        height: u32,
    ) -> bool {
        let support = self.decode_support(index);
        match codec {
            Codec::Avc => {
                support.h264
                    && !ten_bit
                    && width <= AVC_DECODE_MAX_DIMENSION
                    && height <= AVC_DECODE_MAX_DIMENSION
            }
            Codec::Hevc if ten_bit => support.hevc_10bit,
            Codec::Hevc => support.hevc,
            Codec::Av1 => support.av1,
        }
    }
}

/// Software then hardware probing pass for one adapter
fn collect_details<R, D>(
    runtime: &mut R,
    displays: &mut D,
    descriptor: AdapterDescriptor,
    preference: ImplementationPreference,
) -> AdapterDetails
where
    R: DeviceRuntime,
    D: DisplayProvider + ?Sized,
{
    let tier = descriptor.tier;
    let mut details = AdapterDetails::new(descriptor);

    // Software fallback
    match runtime.open_session(&SessionTarget::Software {
        version: PROBE_SESSION_VERSION,
    }) {
        Ok(mut session) => {
            match session.query_version() {
                Ok(version) => {
                    details.software_version = Some(version);
                    if version.is_minimum_supported() {
                        for codec in [Codec::Avc, Codec::Hevc] {
                            let target = ProbeTarget {
                                codec,
                                kind: ImplementationKind::Software,
                                version,
                                tier,
                                low_power: false,
                            };
                            details.profiles.push(probe(&mut session, &target));
                        }
                    }
                }
                Err(e) => debug!("Software version query failed: {}", e),
            }
            session.close();
        }
        Err(e) => debug!("No software implementation: {}", e),
    }

    // Hardware
    let render_node = details.descriptor.render_node.unwrap_or(0);
    match runtime.open_session(&SessionTarget::Hardware {
        render_node,
        version: PROBE_SESSION_VERSION,
    }) {
        Ok(mut session) => {
            let display = displays.acquire(render_node);
            if let Some(handle) = &display {
                if let Err(e) = session.set_display_handle(handle) {
                    debug!("Failed to set display handle: {}", e);
                }
            }

            match session.query_version() {
                Ok(version) => {
                    details.hardware_version = Some(version);
                    // G0 (third-party) hardware is unsupported
                    if tier >= GenerationTier::G1 && version.is_minimum_supported() {
                        probe_hardware_codecs(&mut session, &mut details, version);
                    }
                }
                Err(e) => debug!("Hardware version query failed: {}", e),
            }

            session.close();
            if let Some(handle) = display {
                displays.release(handle);
            }
        }
        Err(e) => warn!(
            "Failed to open hardware session on adapter {}: {}",
            details.index(),
            e
        ),
    }

    details.select_preferred(preference);
    details
}

fn probe_hardware_codecs<S: DeviceSession + ?Sized>(
    session: &mut S,
    details: &mut AdapterDetails,
    version: ApiVersion,
) {
    let tier = details.tier();
    let target = |codec, low_power| ProbeTarget {
        codec,
        kind: ImplementationKind::Hardware,
        version,
        tier,
        low_power,
    };

    for codec in [Codec::Avc, Codec::Hevc] {
        // Prefer the fixed-function encoder where it exists
        let mut profile = if tier >= GenerationTier::G7 {
            probe(session, &target(codec, true))
        } else {
            CodecCapabilityProfile::unavailable(codec, ImplementationKind::Hardware, version)
        };
        if !profile.is_available() {
            profile = probe(session, &target(codec, false));
        }
        details.profiles.push(profile);
    }

    if tier > GenerationTier::G8 {
        details.profiles.push(probe(session, &target(Codec::Av1, true)));
    }
}
