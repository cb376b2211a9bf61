//! Material Key
//!
//! [`MaterialKey`] is the compact bitset that records which shading properties
//! of a [`Material`](crate::Material) have been explicitly set, plus a couple of
//! small derived classification fields:
//!
//! - the opacity map mode (OPAQUE / MASK / BLEND), derived from the
//!   opacity-mask and translucent-map bits
//! - the cull face mode (NONE / FRONT / BACK), stored as a 2-bit field
//!
//! The key is maintained by the material setters and is never edited by
//! render-time consumers. Both enum fields round-trip through canonical names
//! for use in asset files.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::MaterialError;

// ============================================================================
// Key Bits
// ============================================================================

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MaterialKey: u32 {
        const EMISSIVE_VAL            = 1 << 0;
        const UNLIT_VAL               = 1 << 1;
        const ALBEDO_VAL              = 1 << 2;
        const METALLIC_VAL            = 1 << 3;
        const GLOSSY_VAL              = 1 << 4;
        const OPACITY_VAL             = 1 << 5;
        const OPACITY_MASK_MAP        = 1 << 6;
        const OPACITY_TRANSLUCENT_MAP = 1 << 7;
        const OPACITY_MAP_MODE        = 1 << 8;
        const OPACITY_CUTOFF_VAL      = 1 << 9;
        const SCATTERING_VAL          = 1 << 10;

        const EMISSIVE_MAP            = 1 << 11;
        const ALBEDO_MAP              = 1 << 12;
        const METALLIC_MAP            = 1 << 13;
        const ROUGHNESS_MAP           = 1 << 14;
        const NORMAL_MAP              = 1 << 15;
        const OCCLUSION_MAP           = 1 << 16;
        const LIGHT_MAP               = 1 << 17;
        const SCATTERING_MAP          = 1 << 18;

        const SHADE_MAP               = 1 << 19;
        const SHADING_SHIFT_MAP       = 1 << 20;
        const MATCAP_MAP              = 1 << 21;
        const RIM_MAP                 = 1 << 22;
        const UV_ANIMATION_MASK_MAP   = 1 << 23;
        const OUTLINE_WIDTH_MAP       = 1 << 24;

        /// 2-bit [`CullFaceMode`] field.
        const CULL_FACE_MODE          = 0b11 << CULL_FACE_SHIFT;
    }
}

const CULL_FACE_SHIFT: u32 = 25;

/// Number of single-bit flags in the key (everything below the cull face field).
pub const KEY_FLAG_COUNT: usize = CULL_FACE_SHIFT as usize;

impl MaterialKey {
    #[inline]
    #[must_use]
    pub fn is_emissive(&self) -> bool {
        self.contains(Self::EMISSIVE_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_unlit(&self) -> bool {
        self.contains(Self::UNLIT_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_albedo(&self) -> bool {
        self.contains(Self::ALBEDO_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_metallic(&self) -> bool {
        self.contains(Self::METALLIC_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_glossy(&self) -> bool {
        self.contains(Self::GLOSSY_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_scattering(&self) -> bool {
        self.contains(Self::SCATTERING_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_translucent_factor(&self) -> bool {
        self.contains(Self::OPACITY_VAL)
    }

    #[inline]
    #[must_use]
    pub fn is_translucent_map(&self) -> bool {
        self.contains(Self::OPACITY_TRANSLUCENT_MAP)
    }

    #[inline]
    #[must_use]
    pub fn is_opacity_mask_map(&self) -> bool {
        self.contains(Self::OPACITY_MASK_MAP)
    }

    /// `true` once an opacity map mode has been chosen explicitly, which
    /// disables classification from the albedo texture.
    #[inline]
    #[must_use]
    pub fn is_opacity_map_mode(&self) -> bool {
        self.contains(Self::OPACITY_MAP_MODE)
    }

    #[inline]
    #[must_use]
    pub fn is_opacity_cutoff(&self) -> bool {
        self.contains(Self::OPACITY_CUTOFF_VAL)
    }

    /// Translucent through either the opacity factor or the albedo alpha.
    #[inline]
    #[must_use]
    pub fn is_translucent(&self) -> bool {
        self.intersects(Self::OPACITY_VAL | Self::OPACITY_TRANSLUCENT_MAP)
    }

    #[inline]
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        !self.is_translucent()
    }

    #[inline]
    #[must_use]
    pub fn is_map_channel(&self, channel: MapChannel) -> bool {
        self.contains(channel.key_flag())
    }

    pub fn set_map_channel(&mut self, channel: MapChannel, value: bool) {
        self.set(channel.key_flag(), value);
    }

    /// Opacity mode derived from the mask and translucent-map bits.
    #[must_use]
    pub fn opacity_map_mode(&self) -> OpacityMapMode {
        if self.is_opacity_mask_map() {
            OpacityMapMode::Mask
        } else if self.is_translucent_map() {
            OpacityMapMode::Blend
        } else {
            OpacityMapMode::Opaque
        }
    }

    /// Marks the mode as explicit and rewrites the mask/translucent-map bits
    /// so that [`opacity_map_mode`](Self::opacity_map_mode) reports `mode`.
    pub fn set_opacity_map_mode(&mut self, mode: OpacityMapMode) {
        self.insert(Self::OPACITY_MAP_MODE);
        self.set(Self::OPACITY_MASK_MAP, mode == OpacityMapMode::Mask);
        self.set(Self::OPACITY_TRANSLUCENT_MAP, mode == OpacityMapMode::Blend);
    }

    #[must_use]
    pub fn cull_face_mode(&self) -> CullFaceMode {
        let raw = (self.bits() & Self::CULL_FACE_MODE.bits()) >> CULL_FACE_SHIFT;
        CullFaceMode::from_bits(raw)
    }

    pub fn set_cull_face_mode(&mut self, mode: CullFaceMode) {
        self.remove(Self::CULL_FACE_MODE);
        *self |= Self::from_bits_retain((mode as u32) << CULL_FACE_SHIFT);
    }
}

// ============================================================================
// Map Channels
// ============================================================================

/// A named texture slot on a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MapChannel {
    Emissive = 0,
    Albedo,
    Metallic,
    Roughness,
    Normal,
    Occlusion,
    Light,
    Scattering,

    // Toon channels
    Shade,
    ShadingShift,
    Matcap,
    Rim,
    UvAnimationMask,
    OutlineWidth,
}

impl MapChannel {
    pub const COUNT: usize = 14;

    pub const ALL: [MapChannel; Self::COUNT] = [
        Self::Emissive,
        Self::Albedo,
        Self::Metallic,
        Self::Roughness,
        Self::Normal,
        Self::Occlusion,
        Self::Light,
        Self::Scattering,
        Self::Shade,
        Self::ShadingShift,
        Self::Matcap,
        Self::Rim,
        Self::UvAnimationMask,
        Self::OutlineWidth,
    ];

    /// Slot index inside a [`TextureTable`](crate::TextureTable).
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Presence bit of this channel in the [`MaterialKey`].
    #[must_use]
    pub fn key_flag(self) -> MaterialKey {
        match self {
            Self::Emissive => MaterialKey::EMISSIVE_MAP,
            Self::Albedo => MaterialKey::ALBEDO_MAP,
            Self::Metallic => MaterialKey::METALLIC_MAP,
            Self::Roughness => MaterialKey::ROUGHNESS_MAP,
            Self::Normal => MaterialKey::NORMAL_MAP,
            Self::Occlusion => MaterialKey::OCCLUSION_MAP,
            Self::Light => MaterialKey::LIGHT_MAP,
            Self::Scattering => MaterialKey::SCATTERING_MAP,
            Self::Shade => MaterialKey::SHADE_MAP,
            Self::ShadingShift => MaterialKey::SHADING_SHIFT_MAP,
            Self::Matcap => MaterialKey::MATCAP_MAP,
            Self::Rim => MaterialKey::RIM_MAP,
            Self::UvAnimationMask => MaterialKey::UV_ANIMATION_MASK_MAP,
            Self::OutlineWidth => MaterialKey::OUTLINE_WIDTH_MAP,
        }
    }
}

// ============================================================================
// Opacity Map Mode
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OpacityMapMode {
    #[default]
    #[serde(rename = "OPACITY_MAP_OPAQUE")]
    Opaque = 0,
    #[serde(rename = "OPACITY_MAP_MASK")]
    Mask = 1,
    #[serde(rename = "OPACITY_MAP_BLEND")]
    Blend = 2,
}

impl OpacityMapMode {
    pub const ALL: [OpacityMapMode; 3] = [Self::Opaque, Self::Mask, Self::Blend];

    /// Canonical asset-file name of the mode.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Opaque => "OPACITY_MAP_OPAQUE",
            Self::Mask => "OPACITY_MAP_MASK",
            Self::Blend => "OPACITY_MAP_BLEND",
        }
    }

    /// Case-sensitive reverse lookup of [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.name() == name)
    }
}

impl fmt::Display for OpacityMapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpacityMapMode {
    type Err = MaterialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| MaterialError::UnknownOpacityMapMode(s.to_string()))
    }
}

// ============================================================================
// Cull Face Mode
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullFaceMode {
    #[serde(rename = "CULL_NONE")]
    None = 0,
    #[serde(rename = "CULL_FRONT")]
    Front = 1,
    #[default]
    #[serde(rename = "CULL_BACK")]
    Back = 2,
}

impl CullFaceMode {
    pub const ALL: [CullFaceMode; 3] = [Self::None, Self::Front, Self::Back];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "CULL_NONE",
            Self::Front => "CULL_FRONT",
            Self::Back => "CULL_BACK",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.name() == name)
    }

    // The unused fourth encoding decodes as NONE.
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Front,
            2 => Self::Back,
            _ => Self::None,
        }
    }
}

impl fmt::Display for CullFaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CullFaceMode {
    type Err = MaterialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| MaterialError::UnknownCullFaceMode(s.to_string()))
    }
}
