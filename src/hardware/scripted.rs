//! Fixture-driven device runtime
//!
//! [`ScriptedRuntime`] implements [`DeviceRuntime`] from a TOML description
//! of the machine: which adapters exist, what generation they are, which
//! codecs initialize in which mode, and which optional features the driver
//! confirms. It lets the CLI and the test suite exercise discovery, probing
//! and resolution on machines without Quick Sync hardware.
//!
//! # Fixture format
//!
//! ```toml
//! [loader]
//! available = true
//!
//! [software]
//! api = "1.35"
//! codecs = ["avc", "hevc"]
//! features = ["coding_option1"]
//!
//! [[adapter]]
//! index = 0
//! platform = "tigerlake"        # or platform_code = 40
//! media_type = "integrated"
//! render_node = 128
//! impl_name = "mfx-gen"
//! api = "2.9"
//! fail = ["query_platform"]     # calls that return an error
//!
//! [[adapter.encoder]]
//! codec = "hevc"
//! low_power = true              # fixed-function encoder initializes
//! standard = true               # regular encoder initializes
//! query_only = false            # query succeeds but init fails
//! features = ["rate_control_la", "hyper_encode"]
//! ```
//!
//! Feature names are [`CapabilityFlag::name`] values. A query for an
//! unlisted feature fails with the vendor "unsupported" status, except for
//! the extension blocks the runtime always echoes (hyper mode, AV1 screen
//! content, coding option 2) where unsupported fields come back zeroed.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use super::capabilities::CapabilityFlag;
use super::error::{ProbeError, ProbeResult};
use super::generation::PlatformCode;
use super::session::{
    CodingOption2, DeviceRuntime, DeviceSession, DisplayHandle, DisplayProvider, ExtensionBuffer,
    HyperMode, ImplementationDescription, ImplementationFilter, MediaAdapterType, PicStruct,
    PlatformInfo, RateControlMethod, SessionTarget, VideoParams,
};
use super::{ApiVersion, Codec, ImplementationKind, INTEL_VENDOR_ID};

/// Vendor status for an unsupported request
pub const STATUS_UNSUPPORTED: i32 = -3;

/// Vendor status for a missing implementation
pub const STATUS_NOT_FOUND: i32 = -9;

// =============================================================================
// Fixture schema
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuntimeFixture {
    #[serde(default)]
    loader: LoaderFixture,
    software: Option<SoftwareFixture>,
    #[serde(default)]
    adapter: Vec<AdapterFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoaderFixture {
    #[serde(default = "default_true")]
    available: bool,
}

impl Default for LoaderFixture {
    fn default() -> Self {
        Self { available: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SoftwareFixture {
    api: ApiVersion,
    #[serde(default)]
    codecs: Vec<Codec>,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdapterFixture {
    index: u32,
    platform: Option<String>,
    platform_code: Option<u16>,
    #[serde(default)]
    media_type: MediaAdapterType,
    render_node: Option<u32>,
    #[serde(default = "default_impl_name")]
    impl_name: String,
    impl_path: Option<PathBuf>,
    #[serde(default = "default_vendor_id")]
    vendor_id: u32,
    api: ApiVersion,
    #[serde(default)]
    fail: Vec<String>,
    #[serde(default)]
    encoder: Vec<EncoderFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EncoderFixture {
    codec: Codec,
    #[serde(default)]
    low_power: bool,
    #[serde(default = "default_true")]
    standard: bool,
    #[serde(default)]
    query_only: bool,
    #[serde(default)]
    features: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_impl_name() -> String {
    "mfx-gen".to_string()
}

fn default_vendor_id() -> u32 {
    INTEL_VENDOR_ID
}

const FAILABLE_CALLS: [&str; 5] = [
    "open_session",
    "open_hardware_session",
    "set_display_handle",
    "query_platform",
    "query_version",
];

// =============================================================================
// Resolved model
// =============================================================================

/// What one codec can do on one implementation
#[derive(Debug, Clone)]
struct EncoderModel {
    codec: Codec,
    low_power: bool,
    standard: bool,
    query_only: bool,
    features: HashSet<CapabilityFlag>,
}

impl EncoderModel {
    fn supports_mode(&self, low_power: bool) -> bool {
        if low_power {
            self.low_power
        } else {
            self.standard
        }
    }

    fn has(&self, flag: CapabilityFlag) -> bool {
        self.features.contains(&flag)
    }
}

#[derive(Debug, Clone)]
struct ImplementationModel {
    api: ApiVersion,
    encoders: Vec<EncoderModel>,
    failing: HashSet<String>,
}

#[derive(Debug, Clone)]
struct AdapterModel {
    index: u32,
    platform: PlatformInfo,
    render_node: Option<u32>,
    impl_name: String,
    impl_path: Option<PathBuf>,
    vendor_id: u32,
    implementation: ImplementationModel,
}

/// Session and display lifecycle event, recorded in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedEvent {
    SessionOpened(SessionTarget),
    SessionClosed(SessionTarget),
    DisplayAcquired(u32),
    DisplayReleased(u32),
}

type EventLog = Rc<RefCell<Vec<ScriptedEvent>>>;

// =============================================================================
// Runtime
// =============================================================================

/// Device runtime driven by a fixture
#[derive(Debug, Clone)]
pub struct ScriptedRuntime {
    loader_available: bool,
    software: Option<ImplementationModel>,
    adapters: Vec<AdapterModel>,
    events: EventLog,
}

impl ScriptedRuntime {
    /// Load a fixture file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runtime fixture: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid runtime fixture: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let fixture: RuntimeFixture =
            toml::from_str(contents).context("Failed to parse runtime fixture")?;

        let software = fixture
            .software
            .map(|sw| {
                let features = parse_features(&sw.features)?;
                Ok::<_, anyhow::Error>(ImplementationModel {
                    api: sw.api,
                    encoders: sw
                        .codecs
                        .into_iter()
                        .map(|codec| EncoderModel {
                            codec,
                            low_power: false,
                            standard: true,
                            query_only: false,
                            features: features.clone(),
                        })
                        .collect(),
                    failing: HashSet::new(),
                })
            })
            .transpose()?;

        let mut adapters = Vec::with_capacity(fixture.adapter.len());
        for adapter in fixture.adapter {
            adapters.push(adapter_model(adapter)?);
        }

        Ok(Self {
            loader_available: fixture.loader.available,
            software,
            adapters,
            events: Rc::new(RefCell::new(Vec::new())),
        })
    }

    /// Display provider sharing this runtime's event log
    pub fn displays(&self) -> ScriptedDisplays {
        ScriptedDisplays {
            events: Rc::clone(&self.events),
        }
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<ScriptedEvent> {
        self.events.borrow().clone()
    }

    /// Sessions opened but not yet closed
    pub fn open_sessions(&self) -> usize {
        let events = self.events.borrow();
        let opened = events
            .iter()
            .filter(|e| matches!(e, ScriptedEvent::SessionOpened(_)))
            .count();
        let closed = events
            .iter()
            .filter(|e| matches!(e, ScriptedEvent::SessionClosed(_)))
            .count();
        opened.saturating_sub(closed)
    }

    fn open(
        &self,
        target: SessionTarget,
        implementation: ImplementationModel,
        platform: PlatformInfo,
    ) -> ScriptedSession {
        self.events
            .borrow_mut()
            .push(ScriptedEvent::SessionOpened(target));
        ScriptedSession {
            target,
            implementation,
            platform,
            encoder_open: false,
            closed: false,
            events: Rc::clone(&self.events),
        }
    }
}

fn adapter_model(adapter: AdapterFixture) -> Result<AdapterModel> {
    let code = match (&adapter.platform, adapter.platform_code) {
        (Some(name), _) => match PlatformCode::from_name(name) {
            Some(code) => code,
            None => bail!("adapter {}: unknown platform '{}'", adapter.index, name),
        },
        (None, Some(code)) => PlatformCode(code),
        (None, None) => PlatformCode::UNKNOWN,
    };

    for call in &adapter.fail {
        if !FAILABLE_CALLS.contains(&call.as_str()) {
            bail!(
                "adapter {}: unknown failing call '{}' (expected one of {:?})",
                adapter.index,
                call,
                FAILABLE_CALLS
            );
        }
    }

    let mut encoders = Vec::with_capacity(adapter.encoder.len());
    for encoder in adapter.encoder {
        encoders.push(EncoderModel {
            codec: encoder.codec,
            low_power: encoder.low_power,
            standard: encoder.standard,
            query_only: encoder.query_only,
            features: parse_features(&encoder.features)
                .with_context(|| format!("adapter {} {} encoder", adapter.index, encoder.codec))?,
        });
    }

    Ok(AdapterModel {
        index: adapter.index,
        platform: PlatformInfo {
            code,
            media_type: adapter.media_type,
        },
        render_node: adapter.render_node,
        impl_name: adapter.impl_name,
        impl_path: adapter.impl_path,
        vendor_id: adapter.vendor_id,
        implementation: ImplementationModel {
            api: adapter.api,
            encoders,
            failing: adapter.fail.into_iter().collect(),
        },
    })
}

fn parse_features(names: &[String]) -> Result<HashSet<CapabilityFlag>> {
    names
        .iter()
        .map(|name| match CapabilityFlag::from_name(name) {
            Some(flag) => Ok(flag),
            None => bail!("unknown feature '{}'", name),
        })
        .collect()
}

impl DeviceRuntime for ScriptedRuntime {
    type Session = ScriptedSession;

    fn enumerate(
        &mut self,
        filter: &ImplementationFilter,
    ) -> ProbeResult<Vec<ImplementationDescription>> {
        if !self.loader_available {
            return Err(ProbeError::SessionUnavailable(
                "runtime loader not found".to_string(),
            ));
        }
        if filter.kind == ImplementationKind::Software {
            return Ok(Vec::new());
        }

        Ok(self
            .adapters
            .iter()
            .enumerate()
            .filter(|(_, a)| a.vendor_id == filter.vendor_id)
            .map(|(ordinal, a)| ImplementationDescription {
                ordinal: ordinal as u32,
                vendor_impl_id: a.index,
                impl_name: a.impl_name.clone(),
                impl_path: a.impl_path.clone(),
                render_node: a.render_node,
            })
            .collect())
    }

    fn open_session(&mut self, target: &SessionTarget) -> ProbeResult<ScriptedSession> {
        match *target {
            SessionTarget::Enumerated { ordinal } => {
                let adapter = self.adapters.get(ordinal as usize).ok_or(ProbeError::CallFailed {
                    call: "open_session",
                    status: STATUS_NOT_FOUND,
                })?;
                if adapter.implementation.failing.contains("open_session") {
                    return Err(ProbeError::CallFailed {
                        call: "open_session",
                        status: STATUS_UNSUPPORTED,
                    });
                }
                let (implementation, platform) =
                    (adapter.implementation.clone(), adapter.platform);
                Ok(self.open(*target, implementation, platform))
            }
            SessionTarget::Software { .. } => {
                let software = self.software.clone().ok_or_else(|| {
                    ProbeError::SessionUnavailable("no software implementation".to_string())
                })?;
                Ok(self.open(*target, software, PlatformInfo::default()))
            }
            SessionTarget::Hardware { render_node, .. } => {
                let adapter = self
                    .adapters
                    .iter()
                    .find(|a| a.render_node.unwrap_or(0) == render_node)
                    .ok_or(ProbeError::CallFailed {
                        call: "open_hardware_session",
                        status: STATUS_NOT_FOUND,
                    })?;
                if adapter.implementation.failing.contains("open_hardware_session") {
                    return Err(ProbeError::CallFailed {
                        call: "open_hardware_session",
                        status: STATUS_UNSUPPORTED,
                    });
                }
                let (implementation, platform) =
                    (adapter.implementation.clone(), adapter.platform);
                Ok(self.open(*target, implementation, platform))
            }
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Session opened by [`ScriptedRuntime`]
#[derive(Debug)]
pub struct ScriptedSession {
    target: SessionTarget,
    implementation: ImplementationModel,
    platform: PlatformInfo,
    encoder_open: bool,
    closed: bool,
    events: EventLog,
}

impl ScriptedSession {
    fn fail_if_scripted(&self, call: &'static str) -> ProbeResult<()> {
        if self.implementation.failing.contains(call) {
            Err(ProbeError::CallFailed {
                call,
                status: STATUS_UNSUPPORTED,
            })
        } else {
            Ok(())
        }
    }

    /// Encoder model for a request, honouring the low-power mode
    fn encoder(&self, params: &VideoParams, call: &'static str) -> ProbeResult<&EncoderModel> {
        let unsupported = ProbeError::CallFailed {
            call,
            status: STATUS_UNSUPPORTED,
        };
        let codec = params.codec.ok_or_else(|| unsupported.clone())?;
        self.implementation
            .encoders
            .iter()
            .find(|e| e.codec == codec && e.supports_mode(params.low_power))
            .ok_or(unsupported)
    }
}

impl DeviceSession for ScriptedSession {
    fn set_display_handle(&mut self, _handle: &DisplayHandle) -> ProbeResult<()> {
        self.fail_if_scripted("set_display_handle")
    }

    fn query_platform(&mut self) -> ProbeResult<PlatformInfo> {
        self.fail_if_scripted("query_platform")?;
        Ok(self.platform)
    }

    fn query_version(&mut self) -> ProbeResult<ApiVersion> {
        self.fail_if_scripted("query_version")?;
        Ok(self.implementation.api)
    }

    fn query_params(&mut self, request: &VideoParams) -> ProbeResult<VideoParams> {
        let encoder = self.encoder(request, "query_params")?;
        let mut response = *request;

        // Unsupported rate control methods are sanitized, not rejected
        let downgrade = match request.rate_control {
            Some(RateControlMethod::La) => !encoder.has(CapabilityFlag::RateControlLa),
            Some(RateControlMethod::Icq) => !encoder.has(CapabilityFlag::RateControlIcq),
            Some(RateControlMethod::LaIcq) => {
                !(encoder.has(CapabilityFlag::RateControlLa)
                    && encoder.has(CapabilityFlag::RateControlIcq))
            }
            _ => false,
        };
        if downgrade {
            response.rate_control = Some(RateControlMethod::Vbr);
        }
        if !request.frame.pic_struct.is_progressive()
            && request.rate_control.is_some_and(|rc| rc.uses_lookahead())
            && !encoder.has(CapabilityFlag::RateControlLaInterlaced)
        {
            response.frame.pic_struct = PicStruct::Progressive;
        }
        Ok(response)
    }

    fn query_features(
        &mut self,
        params: &VideoParams,
        request: &ExtensionBuffer,
    ) -> ProbeResult<ExtensionBuffer> {
        let encoder = self.encoder(params, "query_features")?;
        let unsupported: ProbeResult<ExtensionBuffer> = Err(ProbeError::CallFailed {
            call: "query_features",
            status: STATUS_UNSUPPORTED,
        });
        let require = |flag: CapabilityFlag| {
            if encoder.has(flag) {
                Ok(*request)
            } else {
                unsupported.clone()
            }
        };

        match *request {
            ExtensionBuffer::CodingOption { .. } => require(CapabilityFlag::CodingOption1),
            ExtensionBuffer::VideoSignalInfo { .. } => require(CapabilityFlag::VuiSignalInfo),
            ExtensionBuffer::ChromaLocInfo { .. } => require(CapabilityFlag::VuiChromaLocation),
            ExtensionBuffer::MasteringDisplayColourVolume { .. } => {
                require(CapabilityFlag::VuiMasteringDisplay)
            }
            ExtensionBuffer::ContentLightLevel { .. } => {
                require(CapabilityFlag::VuiContentLightLevel)
            }
            ExtensionBuffer::Av1Bitstream { .. } => require(CapabilityFlag::Av1Bitstream),
            ExtensionBuffer::CodingOption2(fields) => {
                if !encoder.has(CapabilityFlag::CodingOption2) {
                    return unsupported.clone();
                }
                let keep = |flag: CapabilityFlag| encoder.has(flag);
                Ok(ExtensionBuffer::CodingOption2(CodingOption2 {
                    mbbrc: fields.mbbrc && keep(CapabilityFlag::Mbbrc),
                    ext_brc: fields.ext_brc && keep(CapabilityFlag::ExtBrc),
                    trellis: if keep(CapabilityFlag::Trellis) { fields.trellis } else { 0 },
                    repeat_pps: fields.repeat_pps && keep(CapabilityFlag::RepeatPps),
                    b_ref_pyramid: fields.b_ref_pyramid && keep(CapabilityFlag::BRefType),
                    adaptive_i: fields.adaptive_i && keep(CapabilityFlag::AdaptiveIB),
                    adaptive_b: fields.adaptive_b && keep(CapabilityFlag::AdaptiveIB),
                    lookahead_ds: if keep(CapabilityFlag::LookaheadDownsampling) {
                        fields.lookahead_ds
                    } else {
                        0
                    },
                    num_mb_per_slice: if keep(CapabilityFlag::MbPerSlice) {
                        fields.num_mb_per_slice
                    } else {
                        0
                    },
                }))
            }
            ExtensionBuffer::HyperMode(mode) => {
                if encoder.has(CapabilityFlag::HyperEncode) {
                    Ok(ExtensionBuffer::HyperMode(mode))
                } else {
                    Ok(ExtensionBuffer::HyperMode(HyperMode::Off))
                }
            }
            ExtensionBuffer::Av1ScreenContentTools {
                intra_block_copy,
                palette,
            } => {
                let supported = encoder.has(CapabilityFlag::Av1ScreenContent);
                Ok(ExtensionBuffer::Av1ScreenContentTools {
                    intra_block_copy: intra_block_copy && supported,
                    palette: palette && supported,
                })
            }
        }
    }

    fn init_encoder(&mut self, params: &VideoParams) -> ProbeResult<()> {
        let encoder = self.encoder(params, "init_encoder")?;
        if encoder.query_only {
            return Err(ProbeError::CallFailed {
                call: "init_encoder",
                status: STATUS_UNSUPPORTED,
            });
        }
        self.encoder_open = true;
        Ok(())
    }

    fn close_encoder(&mut self) {
        self.encoder_open = false;
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.encoder_open {
            debug!("Closing session with an open encoder");
            self.encoder_open = false;
        }
        self.closed = true;
        self.events
            .borrow_mut()
            .push(ScriptedEvent::SessionClosed(self.target));
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Displays
// =============================================================================

/// Display provider paired with a [`ScriptedRuntime`]
#[derive(Debug, Clone)]
pub struct ScriptedDisplays {
    events: EventLog,
}

impl DisplayProvider for ScriptedDisplays {
    fn acquire(&mut self, render_node: u32) -> Option<DisplayHandle> {
        self.events
            .borrow_mut()
            .push(ScriptedEvent::DisplayAcquired(render_node));
        Some(DisplayHandle {
            render_node,
            raw: u64::from(render_node),
        })
    }

    fn release(&mut self, handle: DisplayHandle) {
        self.events
            .borrow_mut()
            .push(ScriptedEvent::DisplayReleased(handle.render_node));
    }
}
