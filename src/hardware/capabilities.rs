//! Capability flag set
//!
//! A [`CapabilitySet`] records the features confirmed for one
//! codec/implementation pair. Some flags are only meaningful when another
//! flag is already present (direct B-ref control needs B-pyramid, lookahead
//! downsampling needs lookahead, ...); [`CapabilitySet::insert`] refuses a
//! flag whose prerequisite is missing, so the implication holds for every
//! set the crate ever builds.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;

/// A single confirmed encoder feature
///
/// Declaration order puts every prerequisite before its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CapabilityFlag {
    BRefPyramid,
    LowPower,
    MsdkApi1_6,
    RateControlLa,
    RateControlLaInterlaced,
    RateControlIcq,
    VuiSignalInfo,
    VuiChromaLocation,
    VuiMasteringDisplay,
    VuiContentLightLevel,
    CodingOption1,
    CodingOption2,
    Mbbrc,
    ExtBrc,
    Trellis,
    RepeatPps,
    BRefType,
    LookaheadDownsampling,
    AdaptiveIB,
    MbPerSlice,
    VppScaling,
    VppInterpolation,
    HyperEncode,
    Av1Bitstream,
    Av1ScreenContent,
}

impl CapabilityFlag {
    pub const ALL: [CapabilityFlag; 25] = [
        CapabilityFlag::BRefPyramid,
        CapabilityFlag::LowPower,
        CapabilityFlag::MsdkApi1_6,
        CapabilityFlag::RateControlLa,
        CapabilityFlag::RateControlLaInterlaced,
        CapabilityFlag::RateControlIcq,
        CapabilityFlag::VuiSignalInfo,
        CapabilityFlag::VuiChromaLocation,
        CapabilityFlag::VuiMasteringDisplay,
        CapabilityFlag::VuiContentLightLevel,
        CapabilityFlag::CodingOption1,
        CapabilityFlag::CodingOption2,
        CapabilityFlag::Mbbrc,
        CapabilityFlag::ExtBrc,
        CapabilityFlag::Trellis,
        CapabilityFlag::RepeatPps,
        CapabilityFlag::BRefType,
        CapabilityFlag::LookaheadDownsampling,
        CapabilityFlag::AdaptiveIB,
        CapabilityFlag::MbPerSlice,
        CapabilityFlag::VppScaling,
        CapabilityFlag::VppInterpolation,
        CapabilityFlag::HyperEncode,
        CapabilityFlag::Av1Bitstream,
        CapabilityFlag::Av1ScreenContent,
    ];

    /// Flag that must already be present before this one can be set
    pub fn prerequisite(&self) -> Option<CapabilityFlag> {
        match self {
            CapabilityFlag::BRefType => Some(CapabilityFlag::BRefPyramid),
            CapabilityFlag::LookaheadDownsampling | CapabilityFlag::RateControlLaInterlaced => {
                Some(CapabilityFlag::RateControlLa)
            }
            CapabilityFlag::Mbbrc
            | CapabilityFlag::ExtBrc
            | CapabilityFlag::Trellis
            | CapabilityFlag::RepeatPps
            | CapabilityFlag::AdaptiveIB
            | CapabilityFlag::MbPerSlice => Some(CapabilityFlag::CodingOption2),
            _ => None,
        }
    }

    /// Stable snake_case name, used in reports and fixtures
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityFlag::BRefPyramid => "b_ref_pyramid",
            CapabilityFlag::LowPower => "low_power",
            CapabilityFlag::MsdkApi1_6 => "msdk_api_1_6",
            CapabilityFlag::RateControlLa => "rate_control_la",
            CapabilityFlag::RateControlLaInterlaced => "rate_control_la_interlaced",
            CapabilityFlag::RateControlIcq => "rate_control_icq",
            CapabilityFlag::VuiSignalInfo => "vui_signal_info",
            CapabilityFlag::VuiChromaLocation => "vui_chroma_location",
            CapabilityFlag::VuiMasteringDisplay => "vui_mastering_display",
            CapabilityFlag::VuiContentLightLevel => "vui_content_light_level",
            CapabilityFlag::CodingOption1 => "coding_option1",
            CapabilityFlag::CodingOption2 => "coding_option2",
            CapabilityFlag::Mbbrc => "mbbrc",
            CapabilityFlag::ExtBrc => "extbrc",
            CapabilityFlag::Trellis => "trellis",
            CapabilityFlag::RepeatPps => "repeat_pps",
            CapabilityFlag::BRefType => "b_ref_type",
            CapabilityFlag::LookaheadDownsampling => "lookahead_downsampling",
            CapabilityFlag::AdaptiveIB => "adaptive_ib",
            CapabilityFlag::MbPerSlice => "mb_per_slice",
            CapabilityFlag::VppScaling => "vpp_scaling",
            CapabilityFlag::VppInterpolation => "vpp_interpolation",
            CapabilityFlag::HyperEncode => "hyper_encode",
            CapabilityFlag::Av1Bitstream => "av1_bitstream",
            CapabilityFlag::Av1ScreenContent => "av1_screen_content",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

impl fmt::Display for CapabilityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size set of confirmed capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet {
    bits: u32,
}

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Build a set from a list of flags
    ///
    /// Flags are inserted in declaration order, so listing a flag together
    /// with its prerequisite works regardless of slice order. Flags whose
    /// prerequisite is absent are dropped.
    pub fn from_flags(flags: &[CapabilityFlag]) -> Self {
        let mut sorted = flags.to_vec();
        sorted.sort();
        let mut set = Self::empty();
        for flag in sorted {
            set.insert(flag);
        }
        set
    }

    pub fn contains(&self, flag: CapabilityFlag) -> bool {
        self.bits & flag.bit() != 0
    }

    /// Add a flag; returns `false` (and leaves the set untouched) when the
    /// flag's prerequisite has not been confirmed yet
    pub fn insert(&mut self, flag: CapabilityFlag) -> bool {
        if let Some(required) = flag.prerequisite() {
            if !self.contains(required) {
                return false;
            }
        }
        self.bits |= flag.bit();
        true
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = CapabilityFlag> + '_ {
        CapabilityFlag::ALL
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }

    /// True if every flag's prerequisite is also present
    pub fn prerequisites_hold(&self) -> bool {
        self.iter()
            .all(|flag| flag.prerequisite().map_or(true, |p| self.contains(p)))
    }

    /// Compact one-line summary for adapter logging
    ///
    /// Kept short since it is logged at info level for every hardware
    /// profile.
    pub fn summary(&self) -> String {
        use CapabilityFlag as F;

        let mut out = String::new();
        if self.contains(F::LowPower) {
            out.push_str(" lowpower");
        }
        if self.contains(F::BRefPyramid) {
            if self.contains(F::BRefType) {
                out.push_str(" breftype");
            } else {
                out.push_str(" bpyramid");
            }
        }
        if self.contains(F::RateControlLa) {
            if self.contains(F::RateControlIcq) {
                out.push_str(" icq+la");
            } else {
                out.push_str(" la");
            }
            if self.contains(F::RateControlLaInterlaced) {
                out.push_str("+i");
            }
            if self.contains(F::LookaheadDownsampling) {
                out.push_str("+downs");
            }
        } else if self.contains(F::RateControlIcq) {
            out.push_str(" icq");
        }

        for (flag, label) in [
            (F::VuiSignalInfo, " vsinfo"),
            (F::VuiChromaLocation, " chromalocinfo"),
            (F::VuiMasteringDisplay, " masteringinfo"),
            (F::VuiContentLightLevel, " cllinfo"),
            (F::CodingOption1, " opt1"),
        ] {
            if self.contains(flag) {
                out.push_str(label);
            }
        }

        if self.contains(F::CodingOption2) {
            out.push_str(" opt2");
            for (flag, label) in [
                (F::Mbbrc, "+mbbrc"),
                (F::ExtBrc, "+extbrc"),
                (F::Trellis, "+trellis"),
                (F::RepeatPps, "+repeatpps"),
                (F::AdaptiveIB, "+ib_adapt"),
                (F::MbPerSlice, "+nmpslice"),
            ] {
                if self.contains(flag) {
                    out.push_str(label);
                }
            }
        }

        for (flag, label) in [
            (F::Av1ScreenContent, " av1screencontent"),
            (F::HyperEncode, " hyperencode"),
            (F::Av1Bitstream, " av1bitstream"),
        ] {
            if self.contains(flag) {
                out.push_str(label);
            }
        }

        if out.is_empty() {
            "standard feature set".to_string()
        } else {
            out.trim_start().to_string()
        }
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for flag in self.iter() {
            seq.serialize_element(flag.name())?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_refuses_missing_prerequisite() {
        let mut set = CapabilitySet::empty();
        assert!(!set.insert(CapabilityFlag::BRefType));
        assert!(set.is_empty());

        assert!(set.insert(CapabilityFlag::BRefPyramid));
        assert!(set.insert(CapabilityFlag::BRefType));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_flags_ignores_order() {
        let set = CapabilitySet::from_flags(&[
            CapabilityFlag::LookaheadDownsampling,
            CapabilityFlag::RateControlLa,
            CapabilityFlag::Mbbrc,
        ]);
        assert!(set.contains(CapabilityFlag::LookaheadDownsampling));
        // Mbbrc without CodingOption2 is dropped
        assert!(!set.contains(CapabilityFlag::Mbbrc));
    }

    #[test]
    fn test_summary() {
        assert_eq!(CapabilitySet::empty().summary(), "standard feature set");

        let set = CapabilitySet::from_flags(&[
            CapabilityFlag::LowPower,
            CapabilityFlag::BRefPyramid,
            CapabilityFlag::RateControlLa,
            CapabilityFlag::RateControlIcq,
            CapabilityFlag::LookaheadDownsampling,
            CapabilityFlag::VuiSignalInfo,
            CapabilityFlag::CodingOption2,
            CapabilityFlag::Mbbrc,
            CapabilityFlag::HyperEncode,
        ]);
        assert_eq!(
            set.summary(),
            "lowpower bpyramid icq+la+downs vsinfo opt2+mbbrc hyperencode"
        );
    }

    #[test]
    fn test_flag_names_round_trip() {
        for flag in CapabilityFlag::ALL {
            assert_eq!(CapabilityFlag::from_name(flag.name()), Some(flag));
        }
        assert_eq!(CapabilityFlag::from_name("warp_drive"), None);
    }

    #[test]
    fn test_serialize_as_names() {
        let set =
            CapabilitySet::from_flags(&[CapabilityFlag::LowPower, CapabilityFlag::RateControlIcq]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["low_power","rate_control_icq"]"#);
    }

    proptest! {
        #[test]
        fn test_prerequisites_always_hold(mask in any::<u32>()) {
            let mut set = CapabilitySet::empty();
            for flag in CapabilityFlag::ALL {
                if mask & (1 << (flag as u8)) != 0 {
                    set.insert(flag);
                }
            }
            prop_assert!(set.prerequisites_hold());
        }
    }
}
