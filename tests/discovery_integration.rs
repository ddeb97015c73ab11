//! Adapter discovery against scripted runtimes

use std::path::PathBuf;

use lamco_qsv::hardware::report::RegistryReport;
use lamco_qsv::hardware::scripted::{ScriptedEvent, ScriptedRuntime};
use lamco_qsv::hardware::session::{NoDisplay, SessionTarget};
use lamco_qsv::hardware::{
    AdapterRegistry, CapabilityFlag, Codec, DiscoveryError, EncoderKind, GenerationTier,
    ImplementationKind, ImplementationPreference,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn discover(
    name: &str,
    preference: ImplementationPreference,
) -> (AdapterRegistry, ScriptedRuntime) {
    let mut runtime = ScriptedRuntime::load(&fixture(name)).unwrap();
    let mut displays = runtime.displays();
    let mut registry = AdapterRegistry::with_preference(preference);
    registry.discover(&mut runtime, &mut displays).unwrap();
    (registry, runtime)
}

#[test]
fn test_dual_adapter_default_is_newest() {
    let (registry, _) = discover("dual-adapter.toml", ImplementationPreference::Hardware);

    assert_eq!(registry.adapters().len(), 2);
    assert_eq!(registry.tier(0), GenerationTier::G8);
    assert_eq!(registry.tier(1), GenerationTier::G9);
    assert_eq!(registry.default_index(), 1);

    let context = registry.context();
    assert_eq!(context.index, 1);
    assert!(!context.explicit);
}

#[test]
fn test_dual_adapter_encoders() {
    let (registry, _) = discover("dual-adapter.toml", ImplementationPreference::Hardware);

    assert!(registry.encoder_available(1, EncoderKind::Av1));
    assert!(!registry.encoder_available(0, EncoderKind::Av1));
    assert!(registry.encoder_available(0, EncoderKind::H265_10bit));

    let encoders = registry.available_encoders();
    assert!(encoders.contains(&EncoderKind::H264));
    assert!(encoders.contains(&EncoderKind::Av1));

    let avc = registry.encoder_profile(0, Codec::Avc).unwrap();
    assert_eq!(avc.kind(), ImplementationKind::Hardware);
    assert!(avc.low_power());
    assert!(avc.has(CapabilityFlag::RateControlLa));
    assert!(avc.has(CapabilityFlag::LookaheadDownsampling));
    assert!(avc.has(CapabilityFlag::LowPower));

    let av1 = registry.encoder_profile(1, Codec::Av1).unwrap();
    assert!(av1.has(CapabilityFlag::Av1ScreenContent));
    assert!(av1.has(CapabilityFlag::HyperEncode));
    assert!(registry.hyper_encode_available(0));
}

#[test]
fn test_software_preference_falls_back_per_codec() {
    let (registry, _) = discover("dual-adapter.toml", ImplementationPreference::Software);

    let adapter = registry.select(1).unwrap();
    assert_eq!(adapter.preferred_kind(Codec::Avc), Some(ImplementationKind::Software));
    // No software AV1, so hardware wins
    assert_eq!(adapter.preferred_kind(Codec::Av1), Some(ImplementationKind::Hardware));
}

#[test]
fn test_sessions_and_displays_released() {
    let (_, runtime) = discover("dual-adapter.toml", ImplementationPreference::Hardware);
    assert_eq!(runtime.open_sessions(), 0);

    let events = runtime.events();
    let acquired = events
        .iter()
        .filter(|e| matches!(e, ScriptedEvent::DisplayAcquired(_)))
        .count();
    let released = events
        .iter()
        .filter(|e| matches!(e, ScriptedEvent::DisplayReleased(_)))
        .count();
    assert!(acquired > 0);
    assert_eq!(acquired, released);
}

/// Session that was open when the display at `acquired_at` was acquired
fn session_holding_display(events: &[ScriptedEvent], acquired_at: usize) -> SessionTarget {
    let mut open = Vec::new();
    for event in &events[..acquired_at] {
        match event {
            ScriptedEvent::SessionOpened(target) => open.push(*target),
            ScriptedEvent::SessionClosed(target) => open.retain(|t| t != target),
            _ => {}
        }
    }
    assert_eq!(open.len(), 1, "exactly one session open at acquire");
    open[0]
}

#[test]
fn test_display_released_after_session_closed() {
    let (_, runtime) = discover("dual-adapter.toml", ImplementationPreference::Hardware);
    let events = runtime.events();

    let mut enumerated = 0;
    let mut hardware = 0;
    for (released_at, event) in events.iter().enumerate() {
        let ScriptedEvent::DisplayReleased(node) = event else {
            continue;
        };
        let acquired_at = events[..released_at]
            .iter()
            .rposition(|e| *e == ScriptedEvent::DisplayAcquired(*node))
            .expect("release without acquire");

        let target = session_holding_display(&events, acquired_at);
        let closed_at = events[acquired_at..released_at]
            .iter()
            .position(|e| *e == ScriptedEvent::SessionClosed(target))
            .map(|offset| acquired_at + offset);
        assert!(
            closed_at.is_some(),
            "display {} released before {:?} was closed",
            node,
            target
        );

        match target {
            SessionTarget::Enumerated { .. } => enumerated += 1,
            SessionTarget::Hardware { render_node, .. } => {
                assert_eq!(render_node, *node);
                hardware += 1;
            }
            SessionTarget::Software { .. } => panic!("software session holds a display"),
        }
    }

    // Enumeration pass and hardware pass, once per adapter
    assert_eq!(enumerated, 2);
    assert_eq!(hardware, 2);
}

#[test]
fn test_no_matching_vendor_is_no_adapters() {
    let fixture = r#"
        [[adapter]]
        index = 0
        platform = "tigerlake"
        render_node = 128
        vendor_id = 0x1002
        api = "2.9"
    "#;
    let mut runtime = ScriptedRuntime::from_toml_str(fixture).unwrap();
    let mut registry = AdapterRegistry::new();
    let err = registry.discover(&mut runtime, &mut NoDisplay).unwrap_err();
    assert!(matches!(err, DiscoveryError::NoAdapters { .. }));
    assert!(err.is_fatal());
    assert!(registry.is_empty());

    let mut empty = ScriptedRuntime::from_toml_str("[loader]\navailable = true\n").unwrap();
    let err = registry.discover(&mut empty, &mut NoDisplay).unwrap_err();
    assert!(matches!(err, DiscoveryError::NoAdapters { .. }));
}

#[test]
fn test_unopenable_adapters_is_no_adapters() {
    let fixture = r#"
        [[adapter]]
        index = 0
        platform = "tigerlake"
        render_node = 128
        api = "2.9"
        fail = ["open_session"]

        [[adapter]]
        index = 1
        platform = "dg2"
        render_node = 129
        api = "2.9"
        fail = ["open_session"]
    "#;
    let mut runtime = ScriptedRuntime::from_toml_str(fixture).unwrap();
    let mut displays = runtime.displays();
    let mut registry = AdapterRegistry::new();
    let err = registry.discover(&mut runtime, &mut displays).unwrap_err();
    assert!(matches!(err, DiscoveryError::NoAdapters { .. }));
    assert!(registry.is_empty());
    assert_eq!(runtime.open_sessions(), 0);
}

#[test]
fn test_query_only_encoder_is_unavailable() {
    let (registry, _) = discover("skylake.toml", ImplementationPreference::Hardware);

    assert_eq!(registry.tier(0), GenerationTier::G5);
    assert!(registry.encoder_available(0, EncoderKind::H264));
    assert!(!registry.encoder_available(0, EncoderKind::H265));
    assert!(registry.encoder_profile(0, Codec::Hevc).is_none());

    let hevc = registry
        .select(0)
        .unwrap()
        .profile(Codec::Hevc, ImplementationKind::Hardware)
        .unwrap();
    assert!(!hevc.is_available());
    assert!(hevc.capabilities().is_empty());

    let avc = registry.encoder_profile(0, Codec::Avc).unwrap();
    assert!(!avc.low_power());
    assert!(avc.has(CapabilityFlag::RateControlLaInterlaced));
}

#[test]
fn test_report_serializes() {
    let (registry, _) = discover("dual-adapter.toml", ImplementationPreference::Hardware);
    let report = RegistryReport::from_registry(&registry);
    assert_eq!(report.adapters.len(), 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["default_adapter"], 1);
    assert_eq!(json["adapters"].as_array().unwrap().len(), 2);
}

#[test]
fn test_explicit_adapter_context() {
    let (registry, _) = discover("dual-adapter.toml", ImplementationPreference::Hardware);

    let context = registry.context_for(Some(0));
    assert_eq!(context.index, 0);
    assert_eq!(context.tier, GenerationTier::G8);
    assert!(context.explicit);

    let fallback = registry.context_for(Some(9));
    assert_eq!(fallback.index, 1);
    assert!(!fallback.explicit);
}

#[test]
fn test_missing_loader_is_fatal() {
    let mut runtime = ScriptedRuntime::from_toml_str("[loader]\navailable = false\n").unwrap();
    let mut registry = AdapterRegistry::new();
    let err = registry.discover(&mut runtime, &mut NoDisplay).unwrap_err();
    assert!(matches!(err, DiscoveryError::LoaderUnavailable { .. }));
    assert!(err.is_fatal());
    assert!(registry.is_empty());
}

#[test]
fn test_discover_twice_rejected() {
    let mut runtime = ScriptedRuntime::load(&fixture("skylake.toml")).unwrap();
    let mut registry = AdapterRegistry::new();
    registry.discover(&mut runtime, &mut NoDisplay).unwrap();
    assert_eq!(
        registry.discover(&mut runtime, &mut NoDisplay).unwrap_err(),
        DiscoveryError::AlreadyInitialized
    );
}
