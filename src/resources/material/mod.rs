//! Material
//!
//! A [`Material`] is the property bag of a single surface: scalar and vector
//! shading parameters, the [`MaterialKey`] describing which of them are set,
//! and the texture [`ChannelTable`].
//!
//! # Threading
//!
//! Every mutator takes `&self`, so a material can be shared as
//! [`MaterialRef`] between an update thread and render threads:
//!
//! - scalar state (including the key) sits behind a `RwLock`
//! - the channel table sits behind a reentrant lock; a texture update holds
//!   it for the whole operation, including the opacity reclassification that
//!   re-reads the albedo map
//!
//! Lock order is always channel table, then scalar state.
//!
//! # Key maintenance
//!
//! Each setter recomputes only the key bits it owns:
//!
//! ```rust,ignore
//! let material = Material::new("floor");
//! material.set_roughness(0.4);
//! assert!(material.key().is_glossy());
//! ```

mod channels;

pub use channels::{ChannelGuard, ChannelMaps, ChannelTable};

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::color::srgb_to_linear_vec3;
use crate::resources::key::{
    CullFaceMode, KEY_FLAG_COUNT, MapChannel, MaterialKey, OpacityMapMode,
};
use crate::resources::texture::{
    MaterialMappingMode, TextureMapRef, TextureSampler, TextureTransform, TextureUsage,
};

pub type MaterialRef = Arc<Material>;

/// UV transform slots: 0 = albedo, 1 = occlusion / lightmap, 2..3 spare.
pub const NUM_TEXCOORD_TRANSFORMS: usize = 4;

// ============================================================================
// Toon Parameters
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutlineWidthMode {
    #[default]
    None = 0,
    WorldCoordinates = 1,
    ScreenCoordinates = 2,
}

/// Parameters only read by the toon shading model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToonParams {
    pub shade: Vec3,
    pub shading_shift: f32,
    pub shading_toony: f32,
    pub matcap: Vec3,
    pub parametric_rim: Vec3,
    pub parametric_rim_fresnel_power: f32,
    pub parametric_rim_lift: f32,
    pub rim_lighting_mix: f32,
    /// `(x speed, y speed, rotation speed)`
    pub uv_animation_scroll_speed: Vec3,
    pub outline_width_mode: OutlineWidthMode,
    pub outline_width: f32,
    pub outline: Vec3,
}

impl Default for ToonParams {
    fn default() -> Self {
        Self {
            shade: Vec3::ZERO,
            shading_shift: 0.0,
            shading_toony: 0.9,
            matcap: Vec3::ONE,
            parametric_rim: Vec3::ZERO,
            parametric_rim_fresnel_power: 5.0,
            parametric_rim_lift: 0.0,
            rim_lighting_mix: 1.0,
            uv_animation_scroll_speed: Vec3::ZERO,
            outline_width_mode: OutlineWidthMode::None,
            outline_width: 0.0,
            outline: Vec3::ZERO,
        }
    }
}

// ============================================================================
// Fallthrough Index Space
// ============================================================================

/// Fallthrough slots for properties that have no single bit in the key.
///
/// Their indices follow the key bits, see [`ExtraFallthrough::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtraFallthrough {
    CullFaceMode = 0,
    TexcoordTransform0,
    TexcoordTransform1,
    TexcoordTransform2,
    TexcoordTransform3,
    LightmapParams,
    MaterialParams,
    Shade,
    ShadingShift,
    ShadingToony,
    Matcap,
    ParametricRim,
    ParametricRimFresnelPower,
    ParametricRimLift,
    RimLightingMix,
    UvAnimationScrollSpeed,
    OutlineWidthMode,
    OutlineWidth,
    Outline,
}

impl ExtraFallthrough {
    pub const COUNT: usize = 19;

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        KEY_FLAG_COUNT + self as usize
    }
}

/// Size of the per-material fallthrough array.
pub const NUM_TOTAL_FLAGS: usize = KEY_FLAG_COUNT + ExtraFallthrough::COUNT;

/// Fallthrough index of a single key bit, `None` for multi-bit or field values.
#[must_use]
pub fn key_flag_fallthrough_index(flag: MaterialKey) -> Option<usize> {
    let bits = flag.bits();
    let position = bits.trailing_zeros() as usize;
    (bits.count_ones() == 1 && position < KEY_FLAG_COUNT).then_some(position)
}

// ============================================================================
// Material Properties
// ============================================================================

/// Scalar state of a material. Colors are stored in linear space.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialProperties {
    pub name: String,
    pub model: String,
    pub key: MaterialKey,
    pub layers: u8,

    pub emissive: Vec3,
    pub opacity: f32,
    pub albedo: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    pub scattering: f32,
    pub opacity_cutoff: f32,

    pub texcoord_transforms: [Mat4; NUM_TEXCOORD_TRANSFORMS],
    /// `(offset, scale)` of the lightmap.
    pub lightmap_params: Vec2,
    /// `(mapping mode, repeat)` for non-PBR consumers.
    pub material_params: Vec2,
    pub cull_face_mode: CullFaceMode,

    pub toon: ToonParams,

    pub default_fallthrough: bool,
    pub property_fallthroughs: [bool; NUM_TOTAL_FLAGS],
}

impl Default for MaterialProperties {
    fn default() -> Self {
        let mut key = MaterialKey::empty();
        key.set_cull_face_mode(Material::DEFAULT_CULL_FACE_MODE);

        Self {
            name: String::new(),
            model: Material::STANDARD_PBR.to_string(),
            key,
            layers: 1,
            emissive: Vec3::splat(Material::DEFAULT_EMISSIVE),
            opacity: Material::DEFAULT_OPACITY,
            albedo: Vec3::splat(Material::DEFAULT_ALBEDO),
            roughness: Material::DEFAULT_ROUGHNESS,
            metallic: Material::DEFAULT_METALLIC,
            scattering: Material::DEFAULT_SCATTERING,
            opacity_cutoff: Material::DEFAULT_OPACITY_CUTOFF,
            texcoord_transforms: [Mat4::IDENTITY; NUM_TEXCOORD_TRANSFORMS],
            lightmap_params: DEFAULT_LIGHTMAP_PARAMS,
            material_params: DEFAULT_MATERIAL_PARAMS,
            cull_face_mode: Material::DEFAULT_CULL_FACE_MODE,
            toon: ToonParams::default(),
            default_fallthrough: false,
            property_fallthroughs: [false; NUM_TOTAL_FLAGS],
        }
    }
}

const DEFAULT_LIGHTMAP_PARAMS: Vec2 = Vec2::new(0.0, 1.0);
const DEFAULT_MATERIAL_PARAMS: Vec2 = Vec2::new(0.0, 1.0);

// NaN saturates to 0.
#[inline]
fn saturate(value: f32) -> f32 {
    value.max(0.0).min(1.0)
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug)]
pub struct Material {
    uuid: Uuid,
    props: RwLock<MaterialProperties>,
    channels: ChannelTable,
}

impl Material {
    pub const DEFAULT_EMISSIVE: f32 = 0.0;
    pub const DEFAULT_OPACITY: f32 = 1.0;
    pub const DEFAULT_ALBEDO: f32 = 0.5;
    pub const DEFAULT_METALLIC: f32 = 0.0;
    pub const DEFAULT_ROUGHNESS: f32 = 1.0;
    pub const DEFAULT_SCATTERING: f32 = 0.0;
    pub const DEFAULT_OPACITY_MAP_MODE: OpacityMapMode = OpacityMapMode::Opaque;
    pub const DEFAULT_OPACITY_CUTOFF: f32 = 0.5;
    pub const DEFAULT_CULL_FACE_MODE: CullFaceMode = CullFaceMode::Back;

    pub const STANDARD_PBR: &'static str = "standard-pbr";
    pub const SIMPLE_SHADER: &'static str = "simple-shader";
    pub const TOON: &'static str = "toon";

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::from_properties(MaterialProperties {
            name: name.to_string(),
            ..Default::default()
        })
    }

    fn from_properties(props: MaterialProperties) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            props: RwLock::new(props),
            channels: ChannelTable::default(),
        }
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Consistent copy of the scalar state.
    #[must_use]
    pub fn properties(&self) -> MaterialProperties {
        self.props.read().clone()
    }

    #[must_use]
    pub fn key(&self) -> MaterialKey {
        self.props.read().key
    }

    /// Copies `other` into `self`, keeping `self`'s identity.
    ///
    /// The source is snapshotted under its own channel lock first, then the
    /// destination is written under its lock; the two locks are never held
    /// together. Mutating `other` concurrently is the caller's problem.
    pub fn assign_from(&self, other: &Material) {
        if std::ptr::eq(self, other) {
            return;
        }

        let (props, maps) = {
            let _source = other.channels.lock();
            (other.props.read().clone(), other.channels.snapshot())
        };

        let _guard = self.channels.lock();
        self.channels.replace(maps);
        *self.props.write() = props;
    }

    // ========================================================================
    // Identity
    // ========================================================================

    #[must_use]
    pub fn name(&self) -> String {
        self.props.read().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.props.write().name = name.to_string();
    }

    /// Shading model tag, e.g. [`Material::STANDARD_PBR`].
    #[must_use]
    pub fn model(&self) -> String {
        self.props.read().model.clone()
    }

    pub fn set_model(&self, model: &str) {
        self.props.write().model = model.to_string();
    }

    #[must_use]
    pub fn is_toon(&self) -> bool {
        self.props.read().model == Self::TOON
    }

    #[must_use]
    pub fn layers(&self) -> u8 {
        self.props.read().layers
    }

    pub fn set_layers(&self, layers: u8) {
        self.props.write().layers = layers;
    }

    // ========================================================================
    // Scalar Properties
    // ========================================================================

    /// Sets the emissive color; the emissive bit is set iff a linear channel is positive.
    pub fn set_emissive(&self, emissive: Vec3, is_srgb: bool) {
        let linear = if is_srgb {
            srgb_to_linear_vec3(emissive)
        } else {
            emissive
        };
        let mut props = self.props.write();
        props
            .key
            .set(MaterialKey::EMISSIVE_VAL, linear.cmpgt(Vec3::ZERO).any());
        props.emissive = linear;
    }

    #[must_use]
    pub fn emissive(&self) -> Vec3 {
        self.props.read().emissive
    }

    /// Stores the opacity unclamped; below 1.0 marks the material translucent.
    pub fn set_opacity(&self, opacity: f32) {
        let mut props = self.props.write();
        props.key.set(MaterialKey::OPACITY_VAL, opacity < 1.0);
        props.opacity = opacity;
    }

    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.props.read().opacity
    }

    pub fn set_unlit(&self, unlit: bool) {
        self.props.write().key.set(MaterialKey::UNLIT_VAL, unlit);
    }

    #[must_use]
    pub fn is_unlit(&self) -> bool {
        self.key().is_unlit()
    }

    /// Sets the albedo color; the albedo bit is always set.
    pub fn set_albedo(&self, albedo: Vec3, is_srgb: bool) {
        let linear = if is_srgb {
            srgb_to_linear_vec3(albedo)
        } else {
            albedo
        };
        let mut props = self.props.write();
        props.key.insert(MaterialKey::ALBEDO_VAL);
        props.albedo = linear;
    }

    #[must_use]
    pub fn albedo(&self) -> Vec3 {
        self.props.read().albedo
    }

    pub fn set_roughness(&self, roughness: f32) {
        let roughness = saturate(roughness);
        let mut props = self.props.write();
        props.key.set(MaterialKey::GLOSSY_VAL, roughness < 1.0);
        props.roughness = roughness;
    }

    #[must_use]
    pub fn roughness(&self) -> f32 {
        self.props.read().roughness
    }

    pub fn set_metallic(&self, metallic: f32) {
        let metallic = saturate(metallic);
        let mut props = self.props.write();
        props.key.set(MaterialKey::METALLIC_VAL, metallic > 0.0);
        props.metallic = metallic;
    }

    #[must_use]
    pub fn metallic(&self) -> f32 {
        self.props.read().metallic
    }

    pub fn set_scattering(&self, scattering: f32) {
        let scattering = saturate(scattering);
        let mut props = self.props.write();
        props.key.set(MaterialKey::SCATTERING_VAL, scattering > 0.0);
        props.scattering = scattering;
    }

    #[must_use]
    pub fn scattering(&self) -> f32 {
        self.props.read().scattering
    }

    #[allow(clippy::float_cmp)]
    pub fn set_opacity_cutoff(&self, opacity_cutoff: f32) {
        let opacity_cutoff = saturate(opacity_cutoff);
        let mut props = self.props.write();
        props.key.set(
            MaterialKey::OPACITY_CUTOFF_VAL,
            opacity_cutoff != Self::DEFAULT_OPACITY_CUTOFF,
        );
        props.opacity_cutoff = opacity_cutoff;
    }

    #[must_use]
    pub fn opacity_cutoff(&self) -> f32 {
        self.props.read().opacity_cutoff
    }

    /// Forces the opacity map mode.
    ///
    /// From then on [`reset_opacity_map`](Self::reset_opacity_map) no longer
    /// classifies the albedo texture for this material.
    pub fn set_opacity_map_mode(&self, mode: OpacityMapMode) {
        self.props.write().key.set_opacity_map_mode(mode);
    }

    #[must_use]
    pub fn opacity_map_mode(&self) -> OpacityMapMode {
        self.key().opacity_map_mode()
    }

    pub fn set_cull_face_mode(&self, mode: CullFaceMode) {
        let mut props = self.props.write();
        props.key.set_cull_face_mode(mode);
        props.cull_face_mode = mode;
    }

    #[must_use]
    pub fn cull_face_mode(&self) -> CullFaceMode {
        self.props.read().cull_face_mode
    }

    #[must_use]
    pub fn texcoord_transforms(&self) -> [Mat4; NUM_TEXCOORD_TRANSFORMS] {
        self.props.read().texcoord_transforms
    }

    #[must_use]
    pub fn lightmap_params(&self) -> Vec2 {
        self.props.read().lightmap_params
    }

    #[must_use]
    pub fn material_params(&self) -> Vec2 {
        self.props.read().material_params
    }

    #[must_use]
    pub fn toon_params(&self) -> ToonParams {
        self.props.read().toon
    }

    pub fn set_toon_params(&self, params: ToonParams) {
        self.props.write().toon = params;
    }

    // ========================================================================
    // Fallthrough Flags
    // ========================================================================

    #[must_use]
    pub fn default_fallthrough(&self) -> bool {
        self.props.read().default_fallthrough
    }

    pub fn set_default_fallthrough(&self, value: bool) {
        self.props.write().default_fallthrough = value;
    }

    /// Out-of-range indices read as `false`.
    #[must_use]
    pub fn property_does_fallthrough(&self, index: usize) -> bool {
        self.props
            .read()
            .property_fallthroughs
            .get(index)
            .copied()
            .unwrap_or(false)
    }

    /// Out-of-range indices are ignored.
    pub fn set_property_does_fallthrough(&self, index: usize, value: bool) {
        if let Some(flag) = self.props.write().property_fallthroughs.get_mut(index) {
            *flag = value;
        }
    }

    // ========================================================================
    // Texture Channels
    // ========================================================================

    /// Stores (`Some`) or clears (`None`) the map of `channel`.
    ///
    /// Besides the channel's key bit this refreshes the derived state:
    /// - ALBEDO: opacity classification and UV transform slot 0
    /// - OCCLUSION: UV transform slot 1
    /// - LIGHT: UV transform slot 1 and the lightmap params
    /// - every channel: the generic material params
    ///
    /// OCCLUSION and LIGHT share slot 1; the last one set wins.
    ///
    /// Returns `true` when the opacity map mode changed, so cached pipeline
    /// selection must be refreshed.
    pub fn set_texture_map(&self, channel: MapChannel, map: Option<TextureMapRef>) -> bool {
        let _guard = self.channels.lock();

        self.channels.set_texture_map(channel, map.clone());

        {
            let mut props = self.props.write();
            props.key.set_map_channel(channel, map.is_some());

            let matrix = map
                .as_ref()
                .map_or(Mat4::IDENTITY, |map| map.texture_transform().matrix());
            match channel {
                MapChannel::Albedo => props.texcoord_transforms[0] = matrix,
                MapChannel::Occlusion => props.texcoord_transforms[1] = matrix,
                MapChannel::Light => {
                    props.texcoord_transforms[1] = matrix;
                    props.lightmap_params = map
                        .as_ref()
                        .map_or(DEFAULT_LIGHTMAP_PARAMS, |map| map.lightmap_offset_scale());
                }
                _ => {}
            }

            props.material_params = map.as_ref().map_or(DEFAULT_MATERIAL_PARAMS, |map| {
                Vec2::new(map.mapping_mode().as_f32(), f32::from(u8::from(map.repeat())))
            });
        }

        if channel == MapChannel::Albedo {
            self.reset_opacity_map()
        } else {
            false
        }
    }

    #[must_use]
    pub fn texture_map(&self, channel: MapChannel) -> Option<TextureMapRef> {
        self.channels.texture_map(channel)
    }

    /// Present maps sorted by channel.
    #[must_use]
    pub fn texture_maps(&self) -> Vec<(MapChannel, TextureMapRef)> {
        self.channels.texture_maps()
    }

    pub fn set_sampler(&self, channel: MapChannel, sampler: TextureSampler) {
        self.channels.set_sampler(channel, sampler);
    }

    #[must_use]
    pub fn sampler(&self, channel: MapChannel) -> Option<TextureSampler> {
        self.channels.sampler(channel)
    }

    /// Channels with a sampler, sorted.
    #[must_use]
    pub fn sampler_channels(&self) -> Vec<MapChannel> {
        self.channels.sampler_channels()
    }

    /// Pushes the channel's sampler onto the map's texture source.
    ///
    /// Does nothing unless the channel has both a sampler and a map with a source.
    pub fn apply_sampler(&self, channel: MapChannel) {
        let _guard = self.channels.lock();

        let Some(sampler) = self.channels.sampler(channel) else {
            return;
        };
        let source = self
            .channels
            .texture_map(channel)
            .and_then(|map| map.texture_source().cloned());
        if let Some(source) = source {
            source.set_sampler(sampler);
        }
    }

    pub fn set_texcoord_set(&self, channel: MapChannel, set: u32) {
        self.channels.set_texcoord_set(channel, set);
    }

    #[must_use]
    pub fn texcoord_set(&self, channel: MapChannel) -> u32 {
        self.channels.texcoord_set(channel)
    }

    /// Re-derives the opacity map mode from the albedo texture's alpha usage.
    ///
    /// No-op returning `false` once an explicit mode was set. Otherwise the
    /// mask/translucent-map bits are cleared and set again from the albedo
    /// map, provided it uses its alpha channel and has resolved content.
    /// Returns whether the derived mode changed.
    pub fn reset_opacity_map(&self) -> bool {
        let _guard = self.channels.lock();

        if self.props.read().key.is_opacity_map_mode() {
            return false;
        }

        let usage = self
            .channels
            .texture_map(MapChannel::Albedo)
            .filter(|map| {
                map.use_alpha_channel() && map.is_defined() && map.texture_view().is_valid()
            })
            .and_then(|map| map.texture_view().texture)
            .map(|texture| texture.usage());

        let mut props = self.props.write();
        if props.key.is_opacity_map_mode() {
            return false;
        }

        let previous = props.key.opacity_map_mode();
        props
            .key
            .remove(MaterialKey::OPACITY_MASK_MAP | MaterialKey::OPACITY_TRANSLUCENT_MAP);

        if let Some(usage) = usage.filter(TextureUsage::is_alpha) {
            if usage.is_alpha_mask() {
                props.key.insert(MaterialKey::OPACITY_MASK_MAP);
            } else {
                props.key.insert(MaterialKey::OPACITY_TRANSLUCENT_MAP);
            }
        }

        let current = props.key.opacity_map_mode();
        if previous != current {
            log::trace!(
                "Material '{}': opacity map mode {previous} -> {current}",
                props.name
            );
        }
        previous != current
    }

    /// Applies one UV transform, mapping mode and repeat flag to every
    /// present map and to all UV transform slots.
    pub fn set_texture_transforms(
        &self,
        transform: TextureTransform,
        mode: MaterialMappingMode,
        repeat: bool,
    ) {
        let _guard = self.channels.lock();

        for (_, map) in self.channels.texture_maps() {
            map.set_texture_transform(transform);
            map.set_mapping_mode(mode);
            map.set_repeat(repeat);
        }

        let mut props = self.props.write();
        props.texcoord_transforms = [transform.matrix(); NUM_TEXCOORD_TRANSFORMS];
        props.material_params = Vec2::new(mode.as_f32(), f32::from(u8::from(repeat)));
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("")
    }
}

/// Independent copy with a fresh identity; texture maps and samplers are
/// shared, not duplicated.
impl Clone for Material {
    fn clone(&self) -> Self {
        let _guard = self.channels.lock();
        Self {
            uuid: Uuid::new_v4(),
            props: RwLock::new(self.props.read().clone()),
            channels: ChannelTable::new(self.channels.snapshot()),
        }
    }
}
