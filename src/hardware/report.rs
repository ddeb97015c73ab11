//! Adapter reports
//!
//! Human-readable logging of what discovery found, plus a serializable
//! [`RegistryReport`] for machine consumption.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

use super::adapters::{AdapterDetails, AdapterRegistry};
use super::generation::{DecodeSupport, GenerationTier, PlatformCode};
use super::session::MediaAdapterType;
use super::{ApiVersion, Codec, EncoderKind, ImplementationKind, MINIMUM_API_VERSION};

/// Snapshot of the whole registry
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    pub default_adapter: u32,
    pub minimum_api: ApiVersion,
    pub available_encoders: Vec<EncoderKind>,
    pub adapters: Vec<AdapterReport>,
}

/// One adapter in a [`RegistryReport`]
#[derive(Debug, Clone, Serialize)]
pub struct AdapterReport {
    pub index: u32,
    pub platform: String,
    pub platform_code: PlatformCode,
    pub tier: GenerationTier,
    pub media_type: MediaAdapterType,
    pub impl_name: String,
    pub impl_path: Option<PathBuf>,
    pub render_node: Option<u32>,
    pub software_api: Option<ApiVersion>,
    pub hardware_api: Option<ApiVersion>,
    pub decode: DecodeSupport,
    pub hyper_encode: bool,
    pub encoders: Vec<EncoderReport>,
}

/// One codec on one adapter
#[derive(Debug, Clone, Serialize)]
pub struct EncoderReport {
    pub codec: Codec,
    pub available: bool,
    pub preferred: Option<ImplementationKind>,
    pub ten_bit: bool,
    /// Capability summary per probed implementation
    pub hardware: Option<String>,
    pub software: Option<String>,
    pub hardware_flags: Vec<&'static str>,
}

impl RegistryReport {
    pub fn from_registry(registry: &AdapterRegistry) -> Self {
        Self {
            default_adapter: registry.default_index(),
            minimum_api: MINIMUM_API_VERSION,
            available_encoders: registry.available_encoders(),
            adapters: registry
                .adapters()
                .iter()
                .map(|adapter| AdapterReport::new(registry, adapter))
                .collect(),
        }
    }
}

impl AdapterReport {
    fn new(registry: &AdapterRegistry, adapter: &AdapterDetails) -> Self {
        let index = adapter.index();
        let encoders = Codec::ALL
            .into_iter()
            .map(|codec| EncoderReport::new(registry, adapter, codec))
            .collect();

        Self {
            index,
            platform: adapter.descriptor.platform.to_string(),
            platform_code: adapter.descriptor.platform,
            tier: adapter.tier(),
            media_type: adapter.descriptor.media_type,
            impl_name: adapter.descriptor.impl_name.clone(),
            impl_path: adapter.descriptor.impl_path.clone(),
            render_node: adapter.descriptor.render_node,
            software_api: adapter.software_version,
            hardware_api: adapter.hardware_version,
            decode: registry.decode_support(index),
            hyper_encode: registry.hyper_encode_available(index),
            encoders,
        }
    }
}

impl EncoderReport {
    fn new(registry: &AdapterRegistry, adapter: &AdapterDetails, codec: Codec) -> Self {
        let summary = |kind| {
            adapter
                .profile(codec, kind)
                .filter(|p| p.is_available())
                .map(|p| p.capabilities().summary())
        };
        let hardware_flags = adapter
            .profile(codec, ImplementationKind::Hardware)
            .filter(|p| p.is_available())
            .map(|p| p.capabilities().iter().map(|f| f.name()).collect())
            .unwrap_or_default();

        let ten_bit = match codec {
            Codec::Avc => false,
            Codec::Hevc => registry.encoder_available(adapter.index(), EncoderKind::H265_10bit),
            Codec::Av1 => registry.encoder_available(adapter.index(), EncoderKind::Av1_10bit),
        };

        Self {
            codec,
            available: adapter
                .preferred_profile(codec)
                .is_some_and(|p| p.is_available()),
            preferred: adapter.preferred_kind(codec),
            ten_bit,
            hardware: summary(ImplementationKind::Hardware),
            software: summary(ImplementationKind::Software),
            hardware_flags,
        }
    }
}

/// Decode capability line, e.g. `h264 hevc (8bit: yes, 10bit: no)`
pub fn decode_summary(support: &DecodeSupport) -> String {
    let mut parts = Vec::new();
    if support.h264 {
        parts.push("h264".to_string());
    }
    if support.hevc {
        let ten = if support.hevc_10bit { "yes" } else { "no" };
        parts.push(format!("hevc (8bit: yes, 10bit: {ten})"));
    }
    if support.av1 {
        parts.push("av1 (8bit: yes, 10bit: yes)".to_string());
    }
    if support.vvc {
        parts.push("vvc (8bit: yes, 10bit: yes)".to_string());
    }
    if parts.is_empty() {
        "no decode support".to_string()
    } else {
        parts.join(" ")
    }
}

impl AdapterRegistry {
    /// Log what discovery found
    pub fn log_summary(&self) {
        let report = RegistryReport::from_registry(self);

        info!("╔════════════════════════════════════════════════════════════╗");
        info!("║                 Quick Sync Adapter Report                  ║");
        info!("╚════════════════════════════════════════════════════════════╝");
        info!(
            "  Adapters: {}, default: {}",
            report.adapters.len(),
            report.default_adapter
        );

        for adapter in &report.adapters {
            info!("  ─────────────────────────────────────────────────────────");
            let marker = if adapter.index == report.default_adapter {
                " (default)"
            } else {
                ""
            };
            info!(
                "  Adapter {}{}: {} [{}], {}",
                adapter.index, marker, adapter.platform, adapter.tier, adapter.media_type
            );
            if let Some(path) = &adapter.impl_path {
                debug!("      ↳ {} ({})", adapter.impl_name, path.display());
            }
            if let Some(api) = adapter.hardware_api {
                info!("  - hardware API {} (minimum: {})", api, report.minimum_api);
            }
            if let Some(api) = adapter.software_api {
                debug!("  - software API {} (minimum: {})", api, report.minimum_api);
            }
            info!("  - decode support: {}", decode_summary(&adapter.decode));

            for encoder in &adapter.encoders {
                log_encoder(encoder);
            }
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

fn log_encoder(encoder: &EncoderReport) {
    if !encoder.available {
        info!("  - {} encoder: no", encoder.codec);
        return;
    }

    match encoder.codec {
        Codec::Avc => info!("  - {} encoder: yes", encoder.codec),
        _ => info!(
            "  - {} encoder: yes (8bit: yes, 10bit: {})",
            encoder.codec,
            if encoder.ten_bit { "yes" } else { "no" }
        ),
    }
    if let Some(kind) = encoder.preferred {
        info!("      ↳ preferred implementation: {}", kind);
    }
    if let Some(caps) = &encoder.hardware {
        info!("      ↳ capabilities (hardware): {}", caps);
    }
    if let Some(caps) = &encoder.software {
        debug!("      ↳ capabilities (software): {}", caps);
    }
}
