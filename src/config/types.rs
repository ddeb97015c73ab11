//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::hardware::session::{MemoryType, PicStruct};
use crate::hardware::{EncoderKind, ImplementationPreference};

/// Adapter discovery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Implementation preferred when a codec has both ("hardware", "software")
    pub preference: ImplementationPreference,

    /// Scripted runtime fixture used instead of the vendor loader
    pub runtime_fixture: Option<PathBuf>,
}

/// Default encode job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Encoder to resolve ("h264", "h265", "h265_10bit", "av1", "av1_10bit")
    pub encoder: EncoderKind,

    /// Target quality (ICQ or QP scale)
    pub quality: Option<f64>,

    /// Target bitrate in kbps, used when no quality is set
    pub bitrate_kbps: Option<u32>,

    /// User-facing preset ("speed", "balanced", "quality")
    pub preset: Option<String>,

    /// Codec profile name ("auto", "main", "main10", ...)
    pub profile: Option<String>,

    /// Frame rate numerator
    pub frame_rate_num: u32,

    /// Frame rate denominator
    pub frame_rate_den: u32,

    /// Field order of the source
    pub pic_struct: PicStruct,

    /// Input surface memory
    pub memory_type: MemoryType,

    /// Encoder options as `key=value:key2=value2`
    pub options: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderKind::H264,
            quality: None,
            bitrate_kbps: None,
            preset: None,
            profile: None,
            frame_rate_num: 30,
            frame_rate_den: 1,
            pic_struct: PicStruct::Progressive,
            memory_type: MemoryType::System,
            options: String::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    pub format: String,

    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}
