//! Material Schema
//!
//! GPU-side record layouts for one material layer. A multi-material buffer
//! holds `layer_count` consecutive records of exactly one variant:
//!
//! - [`StandardSchema`]: PBR parameters (320 bytes)
//! - [`ToonSchema`]: toon parameters plus the shared animation time (400 bytes)
//!
//! Both structs are declared through `define_uniform_struct!`, which derives
//! the Rust layout, the defaults and the matching WGSL struct definition from
//! a single field list.

use std::borrow::Cow;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::resources::key::MaterialKey;
use crate::resources::material::{Material, MaterialProperties, NUM_TEXCOORD_TRANSFORMS};

// ============================================================================
// 1. Rust Type -> WGSL Type
// ============================================================================

pub trait WgslType {
    fn wgsl_type_name() -> Cow<'static, str>;

    fn collect_wgsl_defs(_defs: &mut Vec<String>, _inserted: &mut HashSet<String>) {}
}

impl WgslType for f32 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "f32".into()
    }
}
impl WgslType for u32 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "u32".into()
    }
}
impl WgslType for Vec2 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "vec2<f32>".into()
    }
}
impl WgslType for Vec3 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "vec3<f32>".into()
    }
}
impl WgslType for Vec4 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "vec4<f32>".into()
    }
}
impl WgslType for Mat4 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "mat4x4<f32>".into()
    }
}

/// Fixed-size array usable as a uniform field.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformArray<T: Pod, const N: usize>(pub [T; N]);

unsafe impl<T: Pod, const N: usize> Zeroable for UniformArray<T, N> {}
unsafe impl<T: Pod, const N: usize> Pod for UniformArray<T, N> {}

impl<T: WgslType + Pod, const N: usize> WgslType for UniformArray<T, N> {
    fn wgsl_type_name() -> Cow<'static, str> {
        format!("array<{}, {}>", T::wgsl_type_name(), N).into()
    }

    fn collect_wgsl_defs(defs: &mut Vec<String>, inserted: &mut HashSet<String>) {
        T::collect_wgsl_defs(defs, inserted);
    }
}

impl<T: Default + Pod, const N: usize> Default for UniformArray<T, N> {
    fn default() -> Self {
        Self([T::default(); N])
    }
}

impl<T: Pod, const N: usize> Deref for UniformArray<T, N> {
    type Target = [T; N];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Pod, const N: usize> DerefMut for UniformArray<T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Pod, const N: usize> From<[T; N]> for UniformArray<T, N> {
    fn from(arr: [T; N]) -> Self {
        Self(arr)
    }
}

pub trait WgslStruct: Pod + Zeroable {
    fn wgsl_struct_def(struct_name: &str) -> String;
}

// ============================================================================
// 2. Struct Definition Macro
// ============================================================================

macro_rules! define_uniform_struct {
    (
        $(#[$meta:meta])* struct $name:ident {
            $(
                $vis:vis $field_name:ident : $field_type:ty $(= $default_val:expr)?
            ),* $(,)?
        }
    ) => {
        define_uniform_struct!(@def_struct
            $(#[$meta])* struct $name {
                $( $vis $field_name : $field_type ),* }
        );

        define_uniform_struct!(@impl_default
            $name {
                $( $field_name : $field_type $(= $default_val)? ),* }
        );

        define_uniform_struct!(@impl_wgsl_struct
            $name {
                $( $field_name : $field_type ),* }
        );
    };

    (@def_struct $(#[$meta:meta])* struct $name:ident { $( $vis:vis $field_name:ident : $field_type:ty ),* }) => {
        #[repr(C)]
        #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        $(#[$meta])*
        pub struct $name {
            $( $vis $field_name : $field_type, )*
        }
    };

    (@impl_default $name:ident { $( $field_name:ident : $field_type:ty $(= $default_val:expr)? ),* }) => {
        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field_name: define_uniform_struct!(@val_or_default $field_type $(, $default_val)?), )*
                }
            }
        }
    };
    (@val_or_default $type:ty, $val:expr) => { $val };
    (@val_or_default $type:ty) => { <$type as Default>::default() };

    // Fields starting with `__` are padding and are left out of the WGSL body.
    (@gen_body $name_str:expr, { $( $field_name:ident : $field_type:ty ),* }) => {{
        let mut code = format!("struct {} {{\n", $name_str);
        $(
            if !stringify!($field_name).starts_with("__") {
                code.push_str(&format!(
                    "    {}: {},\n",
                    stringify!($field_name),
                    <$field_type as WgslType>::wgsl_type_name()
                ));
            }
        )*
        code.push_str("};\n");
        code
    }};

    (@impl_wgsl_struct $name:ident { $( $field_name:ident : $field_type:ty ),* }) => {
        impl WgslStruct for $name {
            fn wgsl_struct_def(struct_name: &str) -> String {
                let mut defs = Vec::new();
                let mut inserted = HashSet::new();

                $(
                    <$field_type as WgslType>::collect_wgsl_defs(&mut defs, &mut inserted);
                )*

                defs.push(define_uniform_struct!(@gen_body struct_name, { $( $field_name : $field_type ),* }));
                defs.join("\n")
            }
        }
    };
}

fn default_key_bits() -> u32 {
    let mut key = MaterialKey::empty();
    key.set_cull_face_mode(Material::DEFAULT_CULL_FACE_MODE);
    key.bits()
}

// ============================================================================
// 3. Layouts
// ============================================================================

define_uniform_struct!(
    /// Per-layer record for the standard PBR model.
    struct StandardSchema {
        pub emissive: Vec3 = Vec3::splat(Material::DEFAULT_EMISSIVE),
        pub opacity: f32 = Material::DEFAULT_OPACITY,

        pub albedo: Vec3 = Vec3::splat(Material::DEFAULT_ALBEDO),
        pub roughness: f32 = Material::DEFAULT_ROUGHNESS,

        pub metallic: f32 = Material::DEFAULT_METALLIC,
        pub scattering: f32 = Material::DEFAULT_SCATTERING,
        pub opacity_cutoff: f32 = Material::DEFAULT_OPACITY_CUTOFF,
        pub key: u32 = default_key_bits(),

        pub lightmap_params: Vec2 = Vec2::new(0.0, 1.0),
        pub material_params: Vec2 = Vec2::new(0.0, 1.0),

        pub texcoord_transforms: UniformArray<Mat4, NUM_TEXCOORD_TRANSFORMS> =
            UniformArray([Mat4::IDENTITY; NUM_TEXCOORD_TRANSFORMS]),
    }
);

define_uniform_struct!(
    /// Per-layer record for the toon model. `time` is only meaningful in layer 0.
    struct ToonSchema {
        pub emissive: Vec3 = Vec3::splat(Material::DEFAULT_EMISSIVE),
        pub opacity: f32 = Material::DEFAULT_OPACITY,

        pub albedo: Vec3 = Vec3::splat(Material::DEFAULT_ALBEDO),
        pub opacity_cutoff: f32 = Material::DEFAULT_OPACITY_CUTOFF,

        pub shade: Vec3 = Vec3::ZERO,
        pub shading_shift: f32 = 0.0,

        pub matcap: Vec3 = Vec3::ONE,
        pub shading_toony: f32 = 0.9,

        pub parametric_rim: Vec3 = Vec3::ZERO,
        pub parametric_rim_fresnel_power: f32 = 5.0,

        pub outline: Vec3 = Vec3::ZERO,
        pub outline_width: f32 = 0.0,

        pub uv_animation_scroll_speed: Vec3 = Vec3::ZERO,
        pub parametric_rim_lift: f32 = 0.0,

        pub rim_lighting_mix: f32 = 1.0,
        pub outline_width_mode: u32 = 0,
        pub key: u32 = default_key_bits(),
        pub time: f32 = 0.0,

        pub lightmap_params: Vec2 = Vec2::new(0.0, 1.0),
        pub material_params: Vec2 = Vec2::new(0.0, 1.0),

        pub texcoord_transforms: UniformArray<Mat4, NUM_TEXCOORD_TRANSFORMS> =
            UniformArray([Mat4::IDENTITY; NUM_TEXCOORD_TRANSFORMS]),
    }
);

impl From<&MaterialProperties> for StandardSchema {
    fn from(props: &MaterialProperties) -> Self {
        Self {
            emissive: props.emissive,
            opacity: props.opacity,
            albedo: props.albedo,
            roughness: props.roughness,
            metallic: props.metallic,
            scattering: props.scattering,
            opacity_cutoff: props.opacity_cutoff,
            key: props.key.bits(),
            lightmap_params: props.lightmap_params,
            material_params: props.material_params,
            texcoord_transforms: UniformArray(props.texcoord_transforms),
        }
    }
}

impl From<&MaterialProperties> for ToonSchema {
    fn from(props: &MaterialProperties) -> Self {
        let toon = &props.toon;
        Self {
            emissive: props.emissive,
            opacity: props.opacity,
            albedo: props.albedo,
            opacity_cutoff: props.opacity_cutoff,
            shade: toon.shade,
            shading_shift: toon.shading_shift,
            matcap: toon.matcap,
            shading_toony: toon.shading_toony,
            parametric_rim: toon.parametric_rim,
            parametric_rim_fresnel_power: toon.parametric_rim_fresnel_power,
            outline: toon.outline,
            outline_width: toon.outline_width,
            uv_animation_scroll_speed: toon.uv_animation_scroll_speed,
            parametric_rim_lift: toon.parametric_rim_lift,
            rim_lighting_mix: toon.rim_lighting_mix,
            outline_width_mode: toon.outline_width_mode as u32,
            key: props.key.bits(),
            time: 0.0,
            lightmap_params: props.lightmap_params,
            material_params: props.material_params,
            texcoord_transforms: UniformArray(props.texcoord_transforms),
        }
    }
}

// ============================================================================
// 4. Layout Selection
// ============================================================================

/// Which record layout a schema buffer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchemaLayout {
    #[default]
    Standard,
    Toon,
}

impl SchemaLayout {
    #[inline]
    #[must_use]
    pub fn for_toon(is_toon: bool) -> Self {
        if is_toon { Self::Toon } else { Self::Standard }
    }

    /// Bytes per layer record.
    #[inline]
    #[must_use]
    pub fn stride(self) -> usize {
        match self {
            Self::Standard => std::mem::size_of::<StandardSchema>(),
            Self::Toon => std::mem::size_of::<ToonSchema>(),
        }
    }

    /// `layers` default records, ready to upload.
    #[must_use]
    pub fn default_records(self, layers: usize) -> Vec<u8> {
        match self {
            Self::Standard => {
                bytemuck::cast_slice(&vec![StandardSchema::default(); layers]).to_vec()
            }
            Self::Toon => bytemuck::cast_slice(&vec![ToonSchema::default(); layers]).to_vec(),
        }
    }

    #[must_use]
    pub fn wgsl_struct_def(self, struct_name: &str) -> String {
        match self {
            Self::Standard => StandardSchema::wgsl_struct_def(struct_name),
            Self::Toon => ToonSchema::wgsl_struct_def(struct_name),
        }
    }
}

/// One packed layer record of either layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerSchema {
    Standard(StandardSchema),
    Toon(ToonSchema),
}

impl LayerSchema {
    /// Default-valued record of `layout`.
    #[must_use]
    pub fn default_for(layout: SchemaLayout) -> Self {
        match layout {
            SchemaLayout::Standard => Self::Standard(StandardSchema::default()),
            SchemaLayout::Toon => Self::Toon(ToonSchema::default()),
        }
    }

    #[must_use]
    pub fn from_properties(layout: SchemaLayout, props: &MaterialProperties) -> Self {
        match layout {
            SchemaLayout::Standard => Self::Standard(props.into()),
            SchemaLayout::Toon => Self::Toon(props.into()),
        }
    }

    #[must_use]
    pub fn from_material(layout: SchemaLayout, material: &Material) -> Self {
        Self::from_properties(layout, &material.properties())
    }

    #[must_use]
    pub fn layout(&self) -> SchemaLayout {
        match self {
            Self::Standard(_) => SchemaLayout::Standard,
            Self::Toon(_) => SchemaLayout::Toon,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Standard(schema) => bytemuck::bytes_of(schema),
            Self::Toon(schema) => bytemuck::bytes_of(schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    // WGSL uniform rules: vec3 is 16-aligned, mat4 is 16-aligned, struct size is a multiple of 16.
    #[test]
    fn standard_layout_is_wgsl_compatible() {
        assert_eq!(std::mem::size_of::<StandardSchema>(), 320);
        assert_eq!(offset_of!(StandardSchema, albedo) % 16, 0);
        assert_eq!(offset_of!(StandardSchema, metallic) % 16, 0);
        assert_eq!(offset_of!(StandardSchema, lightmap_params) % 8, 0);
        assert_eq!(offset_of!(StandardSchema, texcoord_transforms) % 16, 0);
    }

    #[test]
    fn toon_layout_is_wgsl_compatible() {
        assert_eq!(std::mem::size_of::<ToonSchema>(), 400);
        for offset in [
            offset_of!(ToonSchema, shade),
            offset_of!(ToonSchema, matcap),
            offset_of!(ToonSchema, parametric_rim),
            offset_of!(ToonSchema, outline),
            offset_of!(ToonSchema, uv_animation_scroll_speed),
            offset_of!(ToonSchema, rim_lighting_mix),
            offset_of!(ToonSchema, texcoord_transforms),
        ] {
            assert_eq!(offset % 16, 0);
        }
    }

    #[test]
    fn defaults_match_material_defaults() {
        let material = Material::default();
        let packed = LayerSchema::from_material(SchemaLayout::Standard, &material);
        assert_eq!(packed, LayerSchema::Standard(StandardSchema::default()));

        let packed = LayerSchema::from_material(SchemaLayout::Toon, &material);
        assert_eq!(packed, LayerSchema::Toon(ToonSchema::default()));
    }

    #[test]
    fn default_records_fill_every_layer() {
        let bytes = SchemaLayout::Toon.default_records(3);
        assert_eq!(bytes.len(), 3 * SchemaLayout::Toon.stride());

        let records: Vec<ToonSchema> = bytemuck::pod_collect_to_vec(&bytes);
        assert!(records.iter().all(|r| *r == ToonSchema::default()));
    }

    #[test]
    fn wgsl_def_lists_fields_in_order() {
        let def = SchemaLayout::Standard.wgsl_struct_def("MaterialSchema");
        assert!(def.starts_with("struct MaterialSchema {\n    emissive: vec3<f32>,\n"));
        assert!(def.contains("    key: u32,\n"));
        assert!(def.contains("    texcoord_transforms: array<mat4x4<f32>, 4>,\n"));

        let toon = SchemaLayout::Toon.wgsl_struct_def("ToonSchema");
        assert!(toon.contains("    time: f32,\n"));
    }
}
