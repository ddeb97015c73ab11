//! Vendor runtime boundary
//!
//! The registry and the probe never touch the vendor API directly. They go
//! through the [`DeviceRuntime`] / [`DeviceSession`] / [`DisplayProvider`]
//! traits defined here, which wrap every vendor status into a
//! [`ProbeResult`]. Requests and responses are small immutable value
//! objects built fresh for each query, so nothing leaks from one probe into
//! the next.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ProbeResult;
use super::generation::PlatformCode;
use super::{ApiVersion, Codec, ImplementationKind};

// =============================================================================
// Enumeration
// =============================================================================

/// Filter applied when enumerating implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplementationFilter {
    pub kind: ImplementationKind,
    pub vendor_id: u32,
}

/// One implementation reported by the runtime loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementationDescription {
    /// Position in the loader's enumeration
    pub ordinal: u32,
    /// Vendor-assigned adapter number (stable across runs)
    pub vendor_impl_id: u32,
    pub impl_name: String,
    pub impl_path: Option<PathBuf>,
    pub render_node: Option<u32>,
}

/// Which session to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTarget {
    /// Session on an enumerated implementation
    Enumerated { ordinal: u32 },
    /// CPU implementation negotiated at the given version
    Software { version: ApiVersion },
    /// Hardware implementation bound to a render node
    Hardware {
        render_node: u32,
        version: ApiVersion,
    },
}

/// Adapter placement as reported by the platform query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaAdapterType {
    Integrated,
    Discrete,
    #[default]
    Unknown,
}

impl fmt::Display for MediaAdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaAdapterType::Integrated => write!(f, "integrated"),
            MediaAdapterType::Discrete => write!(f, "discrete"),
            MediaAdapterType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a platform query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformInfo {
    pub code: PlatformCode,
    pub media_type: MediaAdapterType,
}

// =============================================================================
// Display handles
// =============================================================================

/// Opaque video-memory display handle bound to a render node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayHandle {
    pub render_node: u32,
    pub raw: u64,
}

/// Source of display handles
///
/// A handle must only be released after every session that used it has
/// been closed.
#[cfg_attr(test, mockall::automock)]
pub trait DisplayProvider {
    /// Open a display for a render node; `None` when the platform needs none
    /// or it could not be opened
    fn acquire(&mut self, render_node: u32) -> Option<DisplayHandle>;

    fn release(&mut self, handle: DisplayHandle);
}

/// Provider for platforms that need no display handle
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplay;

impl DisplayProvider for NoDisplay {
    fn acquire(&mut self, _render_node: u32) -> Option<DisplayHandle> {
        None
    }

    fn release(&mut self, _handle: DisplayHandle) {}
}

// =============================================================================
// Video parameters
// =============================================================================

/// Rate control method as understood by the vendor runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControlMethod {
    Cbr,
    Vbr,
    Cqp,
    La,
    Icq,
    LaIcq,
}

impl RateControlMethod {
    /// Numeric id used in pass-through option strings
    pub fn vendor_id(&self) -> u32 {
        match self {
            RateControlMethod::Cbr => 1,
            RateControlMethod::Vbr => 2,
            RateControlMethod::Cqp => 3,
            RateControlMethod::La => 8,
            RateControlMethod::Icq => 9,
            RateControlMethod::LaIcq => 11,
        }
    }

    pub fn uses_lookahead(&self) -> bool {
        matches!(self, RateControlMethod::La | RateControlMethod::LaIcq)
    }
}

impl fmt::Display for RateControlMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateControlMethod::Cbr => "CBR",
            RateControlMethod::Vbr => "VBR",
            RateControlMethod::Cqp => "CQP",
            RateControlMethod::La => "LA",
            RateControlMethod::Icq => "ICQ",
            RateControlMethod::LaIcq => "LA_ICQ",
        };
        f.write_str(name)
    }
}

/// Frame field order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PicStruct {
    #[default]
    Progressive,
    FieldTff,
    FieldBff,
}

impl PicStruct {
    pub fn is_progressive(&self) -> bool {
        matches!(self, PicStruct::Progressive)
    }
}

/// Where input surfaces live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    #[default]
    System,
    Video,
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MemoryType::System),
            "video" => Ok(MemoryType::Video),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryType::System => write!(f, "system"),
            MemoryType::Video => write!(f, "video"),
        }
    }
}

/// Multi-adapter cooperative encode mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HyperMode {
    #[default]
    Off,
    On,
    Adaptive,
}

impl HyperMode {
    pub fn key(&self) -> &'static str {
        match self {
            HyperMode::Off => "off",
            HyperMode::On => "on",
            HyperMode::Adaptive => "adaptive",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "off" => Some(HyperMode::Off),
            "on" => Some(HyperMode::On),
            "adaptive" => Some(HyperMode::Adaptive),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, HyperMode::Off)
    }
}

/// Frame description carried by every query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u16,
    pub height: u16,
    pub crop_width: u16,
    pub crop_height: u16,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub pic_struct: PicStruct,
}

impl Default for FrameInfo {
    /// NV12 4:2:0 1080p at 25 fps, height aligned to 1088
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1088,
            crop_width: 1920,
            crop_height: 1080,
            frame_rate_num: 25,
            frame_rate_den: 1,
            pic_struct: PicStruct::Progressive,
        }
    }
}

/// Target usage presets
pub const TARGET_USAGE_BEST_QUALITY: u16 = 1;
pub const TARGET_USAGE_BALANCED: u16 = 4;
pub const TARGET_USAGE_BEST_SPEED: u16 = 7;

/// Encoder parameter block sent to or returned by a query
///
/// `codec` is optional because the runtime may answer a query without
/// filling it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoParams {
    pub codec: Option<Codec>,
    pub low_power: bool,
    pub rate_control: Option<RateControlMethod>,
    pub target_usage: u16,
    pub target_kbps: u16,
    pub icq_quality: u16,
    pub gop_closed: bool,
    pub gop_pic_size: u16,
    pub gop_ref_dist: u16,
    pub idr_interval: u16,
    pub frame: FrameInfo,
    pub async_depth: u16,
    pub memory: MemoryType,
}

/// Async depth used for the nominal probing parameters
pub const PROBE_ASYNC_DEPTH: u16 = 4;

impl VideoParams {
    /// Minimal valid parameter set used for availability and rate-control
    /// queries
    pub fn nominal(codec: Codec, low_power: bool) -> Self {
        Self {
            codec: Some(codec),
            low_power,
            rate_control: Some(RateControlMethod::Vbr),
            target_usage: TARGET_USAGE_BALANCED,
            target_kbps: 5000,
            icq_quality: 0,
            gop_closed: true,
            gop_pic_size: 0,
            gop_ref_dist: 0,
            idr_interval: 0,
            frame: FrameInfo::default(),
            async_depth: PROBE_ASYNC_DEPTH,
            memory: MemoryType::System,
        }
    }

    /// Output block for a mode-2 query: only the codec is set
    pub fn codec_only(codec: Codec) -> Self {
        Self {
            codec: Some(codec),
            low_power: false,
            rate_control: None,
            target_usage: 0,
            target_kbps: 0,
            icq_quality: 0,
            gop_closed: false,
            gop_pic_size: 0,
            gop_ref_dist: 0,
            idr_interval: 0,
            frame: FrameInfo {
                width: 0,
                height: 0,
                crop_width: 0,
                crop_height: 0,
                frame_rate_num: 0,
                frame_rate_den: 0,
                pic_struct: PicStruct::Progressive,
            },
            async_depth: 0,
            memory: MemoryType::System,
        }
    }

    /// Structural parameters both adapters of a cooperative pair must share
    pub fn cooperative(codec: Codec, low_power: bool) -> Self {
        let mut params = Self::nominal(codec, low_power);
        match codec {
            Codec::Hevc => params.idr_interval = 1,
            Codec::Avc => {
                params.idr_interval = 0;
                params.gop_ref_dist = 1;
            }
            Codec::Av1 => {}
        }
        params.gop_pic_size = 60;
        params.async_depth = 60;
        params
    }

    pub fn with_rate_control(mut self, method: RateControlMethod) -> Self {
        self.rate_control = Some(method);
        self
    }

    pub fn with_pic_struct(mut self, pic_struct: PicStruct) -> Self {
        self.frame.pic_struct = pic_struct;
        self
    }
}

// =============================================================================
// Extension buffers (mode-1 feature queries)
// =============================================================================

/// Trellis bits
pub const TRELLIS_I: u8 = 0x02;
pub const TRELLIS_P: u8 = 0x04;
pub const TRELLIS_B: u8 = 0x08;

/// Lookahead downsampling factor 4x
pub const LOOKAHEAD_DS_4X: u8 = 3;

/// Fields of the second coding-option block
///
/// In a request, a non-zero field asks whether the feature is supported;
/// the runtime zeroes the fields it does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodingOption2 {
    pub mbbrc: bool,
    pub ext_brc: bool,
    pub trellis: u8,
    pub repeat_pps: bool,
    pub b_ref_pyramid: bool,
    pub adaptive_i: bool,
    pub adaptive_b: bool,
    pub lookahead_ds: u8,
    pub num_mb_per_slice: u16,
}

impl CodingOption2 {
    /// Request asking for every field at once
    pub fn probe_request() -> Self {
        Self {
            mbbrc: true,
            ext_brc: true,
            trellis: TRELLIS_I | TRELLIS_P | TRELLIS_B,
            repeat_pps: true,
            b_ref_pyramid: true,
            adaptive_i: true,
            adaptive_b: true,
            lookahead_ds: LOOKAHEAD_DS_4X,
            // 1920x1088 / 4 macroblocks
            num_mb_per_slice: 2040,
        }
    }
}

/// Exactly one extension structure attached to a mode-1 query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionBuffer {
    CodingOption {
        au_delimiter: bool,
        pic_timing_sei: bool,
        cavlc: bool,
    },
    CodingOption2(CodingOption2),
    VideoSignalInfo {
        colour_description: bool,
    },
    ChromaLocInfo {
        present: bool,
    },
    MasteringDisplayColourVolume {
        insert_payload: bool,
    },
    ContentLightLevel {
        insert_payload: bool,
    },
    HyperMode(HyperMode),
    Av1Bitstream {
        write_ivf_headers: bool,
    },
    Av1ScreenContentTools {
        intra_block_copy: bool,
        palette: bool,
    },
}

impl ExtensionBuffer {
    /// Short name used in log messages
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionBuffer::CodingOption { .. } => "CodingOption",
            ExtensionBuffer::CodingOption2(_) => "CodingOption2",
            ExtensionBuffer::VideoSignalInfo { .. } => "VideoSignalInfo",
            ExtensionBuffer::ChromaLocInfo { .. } => "ChromaLocInfo",
            ExtensionBuffer::MasteringDisplayColourVolume { .. } => "MasteringDisplayColourVolume",
            ExtensionBuffer::ContentLightLevel { .. } => "ContentLightLevelInfo",
            ExtensionBuffer::HyperMode(_) => "HyperModeParam",
            ExtensionBuffer::Av1Bitstream { .. } => "AV1BitstreamParam",
            ExtensionBuffer::Av1ScreenContentTools { .. } => "AV1ScreenContentTools",
        }
    }
}

// =============================================================================
// Runtime traits
// =============================================================================

/// An open vendor session
///
/// Sessions are exclusive and not reentrant: one probe at a time.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceSession {
    fn set_display_handle(&mut self, handle: &DisplayHandle) -> ProbeResult<()>;

    fn query_platform(&mut self) -> ProbeResult<PlatformInfo>;

    fn query_version(&mut self) -> ProbeResult<ApiVersion>;

    /// Mode-2 query: `request` carries the parameters to check, the returned
    /// block is the runtime's sanitized version of them
    fn query_params(&mut self, request: &VideoParams) -> ProbeResult<VideoParams>;

    /// Mode-1 query: a single extension buffer attached to `params`; the
    /// returned buffer has unsupported fields zeroed
    fn query_features(
        &mut self,
        params: &VideoParams,
        request: &ExtensionBuffer,
    ) -> ProbeResult<ExtensionBuffer>;

    fn init_encoder(&mut self, params: &VideoParams) -> ProbeResult<()>;

    fn close_encoder(&mut self);

    /// Close the session; safe to call more than once
    fn close(&mut self);
}

/// Vendor runtime loader
pub trait DeviceRuntime {
    type Session: DeviceSession;

    /// List implementations matching `filter`; an error means the loader
    /// itself is unusable
    fn enumerate(
        &mut self,
        filter: &ImplementationFilter,
    ) -> ProbeResult<Vec<ImplementationDescription>>;

    fn open_session(&mut self, target: &SessionTarget) -> ProbeResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_params() {
        let params = VideoParams::nominal(Codec::Hevc, true);
        assert_eq!(params.codec, Some(Codec::Hevc));
        assert!(params.low_power);
        assert_eq!(params.rate_control, Some(RateControlMethod::Vbr));
        assert_eq!(params.frame.height, 1088);
        assert_eq!(params.frame.crop_height, 1080);
        assert_eq!(params.async_depth, PROBE_ASYNC_DEPTH);
    }

    #[test]
    fn test_cooperative_params() {
        let hevc = VideoParams::cooperative(Codec::Hevc, true);
        assert_eq!(hevc.idr_interval, 1);
        assert_eq!(hevc.gop_pic_size, 60);
        assert_eq!(hevc.async_depth, 60);

        let avc = VideoParams::cooperative(Codec::Avc, true);
        assert_eq!(avc.idr_interval, 0);
        assert_eq!(avc.gop_ref_dist, 1);
    }

    #[test]
    fn test_rate_control_vendor_ids() {
        assert_eq!(RateControlMethod::Cbr.vendor_id(), 1);
        assert_eq!(RateControlMethod::La.vendor_id(), 8);
        assert_eq!(RateControlMethod::LaIcq.vendor_id(), 11);
        assert!(RateControlMethod::LaIcq.uses_lookahead());
        assert!(!RateControlMethod::Icq.uses_lookahead());
    }

    #[test]
    fn test_hyper_mode_keys() {
        assert_eq!(HyperMode::from_key("Adaptive"), Some(HyperMode::Adaptive));
        assert_eq!(HyperMode::from_key("maybe"), None);
        assert!(!HyperMode::Off.is_enabled());
        assert_eq!(HyperMode::On.key(), "on");
    }

    #[test]
    fn test_memory_type_parse() {
        assert_eq!("VIDEO".parse::<MemoryType>().unwrap(), MemoryType::Video);
        assert!("gpu".parse::<MemoryType>().is_err());
    }
}
