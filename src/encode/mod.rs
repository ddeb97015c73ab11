//! Encoder parameter resolution
//!
//! Turns a job description (codec, quality or bitrate, free-form encoder
//! options) into the configuration a Quick Sync encode session should be
//! opened with, using the capability profile discovered for the chosen
//! adapter.
//!
//! # Flow
//!
//! ```text
//! JobParameters ──► setup_job() ──► AdapterContext, async depth, memory type
//!       │
//!       ▼
//! EncodeJob::new(profile, tier)
//!       │ apply_options()   OptionKeyRegistry, one report per option
//!       │ sanitize()        drop ICQ / lookahead the adapter cannot do
//!       │ resolve()         rate control, GOP, memory limits
//!       ▼
//! ResolvedEncode { EncodeConfiguration, SideChannelOptions }
//! ```
//!
//! A bad option never aborts a job; it is logged, reported and skipped.
//! Only an impossible rate control (no quality and no bitrate) fails.

pub mod config;
pub mod error;
pub mod job;
pub mod options;
pub mod resolver;
pub mod side_channel;

pub use config::{
    CodecProfile, EncodeConfiguration, GopSettings, JobParameters, RateControlOutput,
    RateControlSettings, ScalingMode, INVALID_QUALITY,
};
pub use error::{OptionError, ResolveError, ResolveResult};
pub use job::{
    default_async_depth, parse_profile, profile_names, quality_limits, setup_job, JobSetup,
    QualityLimits,
};
pub use options::{OptionBinding, OptionKeyRegistry};
pub use resolver::{
    brc_multiplier, resolve_job, EncodeJob, OptionReport, ResolveState, ResolvedEncode,
    MAX_BITRATE_KBPS,
};
pub use side_channel::{SideChannelOptions, QSV_PARAMS_KEY};
