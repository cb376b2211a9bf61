//! Texture handles consumed by materials.
//!
//! Texture loading and residency live outside this crate. Materials only see
//! the thin handle layer defined here:
//!
//! - [`Texture`]: a GPU texture with a byte size, an alpha usage classification
//!   and a "defined" flag that flips once its content has been uploaded
//! - [`TextureSource`]: the loader-owned slot that eventually resolves to a
//!   [`Texture`] and receives the sampler chosen by the material
//! - [`TextureMap`]: a material's view of a source plus its UV transform,
//!   mapping mode and lightmap parameters
//!
//! All handles are reference counted and internally synchronised, so a
//! render thread can keep using a map it obtained from a material while the
//! material is re-pointed to another map.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec2, Vec3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub type TextureRef = Arc<Texture>;
pub type TextureSourceRef = Arc<TextureSource>;
pub type TextureMapRef = Arc<TextureMap>;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// 1. Sampler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSampler {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::MipmapFilterMode,

    /// Comparison function for depth textures
    pub compare: Option<wgpu::CompareFunction>,
    /// Anisotropic filtering level (1 = off)
    pub anisotropy_clamp: u16,
}

impl Default for TextureSampler {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

impl TextureSampler {
    /// Clamp-to-edge sampler, used for non-repeating maps.
    #[must_use]
    pub fn clamped() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        }
    }
}

// ============================================================================
// 2. UV Transform & Mapping Mode
// ============================================================================

/// How texture coordinates are generated for a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialMappingMode {
    #[default]
    Uv = 0,
    Projected = 1,
}

impl MaterialMappingMode {
    /// Value written into the generic material params vector.
    #[inline]
    #[must_use]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub offset: Vec2,
    pub scale: Vec2,
    /// Rotation in radians around `center`
    pub rotation: f32,
    pub center: Vec2,
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            center: Vec2::ZERO,
        }
    }
}

impl TextureTransform {
    /// UV transform as a 4x4 matrix (acting on `(u, v, 0, 1)`).
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        let pivot = self.center.extend(0.0);
        Mat4::from_translation(self.offset.extend(0.0) + pivot)
            * Mat4::from_scale_rotation_translation(
                Vec3::new(self.scale.x, self.scale.y, 1.0),
                Quat::from_rotation_z(self.rotation),
                Vec3::ZERO,
            )
            * Mat4::from_translation(-pivot)
    }
}

// ============================================================================
// 3. GPU Texture
// ============================================================================

bitflags! {
    /// Content classification computed by the texture loader.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u8 {
        const COLOR      = 1 << 0;
        const NORMAL     = 1 << 1;
        /// The texture carries a meaningful alpha channel.
        const ALPHA      = 1 << 2;
        /// The alpha channel only holds 0/1 coverage.
        const ALPHA_MASK = 1 << 3;
    }
}

impl TextureUsage {
    #[inline]
    #[must_use]
    pub fn is_alpha(&self) -> bool {
        self.contains(Self::ALPHA)
    }

    #[inline]
    #[must_use]
    pub fn is_alpha_mask(&self) -> bool {
        self.contains(Self::ALPHA_MASK)
    }
}

#[derive(Debug)]
pub struct Texture {
    id: u64,
    pub label: String,
    size: usize,
    usage: TextureUsage,
    defined: AtomicBool,
}

impl Texture {
    /// A texture whose content is already resident.
    #[must_use]
    pub fn new(label: &str, size: usize, usage: TextureUsage) -> TextureRef {
        Self::create(label, size, usage, true)
    }

    /// A texture still waiting for its content; see [`mark_defined`](Self::mark_defined).
    #[must_use]
    pub fn pending(label: &str, size: usize, usage: TextureUsage) -> TextureRef {
        Self::create(label, size, usage, false)
    }

    fn create(label: &str, size: usize, usage: TextureUsage, defined: bool) -> TextureRef {
        Arc::new(Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            label: label.to_string(),
            size,
            usage,
            defined: AtomicBool::new(defined),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// GPU memory footprint in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn usage(&self) -> TextureUsage {
        self.usage
    }

    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.defined.load(Ordering::Acquire)
    }

    pub fn mark_defined(&self) {
        self.defined.store(true, Ordering::Release);
    }
}

/// Resolved view onto a source's texture.
#[derive(Debug, Clone, Default)]
pub struct TextureView {
    pub texture: Option<TextureRef>,
}

impl TextureView {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.texture.is_some()
    }
}

// ============================================================================
// 4. Texture Source
// ============================================================================

/// Loader-owned slot that resolves to a GPU texture once loading finishes.
#[derive(Debug, Default)]
pub struct TextureSource {
    texture: RwLock<Option<TextureRef>>,
    sampler: RwLock<Option<TextureSampler>>,
}

impl TextureSource {
    #[must_use]
    pub fn new() -> TextureSourceRef {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn with_texture(texture: TextureRef) -> TextureSourceRef {
        Arc::new(Self {
            texture: RwLock::new(Some(texture)),
            sampler: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn gpu_texture(&self) -> Option<TextureRef> {
        self.texture.read().clone()
    }

    pub fn set_gpu_texture(&self, texture: Option<TextureRef>) {
        *self.texture.write() = texture;
    }

    #[must_use]
    pub fn sampler(&self) -> Option<TextureSampler> {
        *self.sampler.read()
    }

    pub fn set_sampler(&self, sampler: TextureSampler) {
        *self.sampler.write() = Some(sampler);
    }
}

// ============================================================================
// 5. Texture Map
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct TextureMapState {
    transform: TextureTransform,
    mapping_mode: MaterialMappingMode,
    repeat: bool,
    use_alpha_channel: bool,
    lightmap_offset_scale: Vec2,
}

impl Default for TextureMapState {
    fn default() -> Self {
        Self {
            transform: TextureTransform::default(),
            mapping_mode: MaterialMappingMode::Uv,
            repeat: true,
            use_alpha_channel: false,
            lightmap_offset_scale: Vec2::new(0.0, 1.0),
        }
    }
}

/// A material's reference to a texture source plus per-map UV state.
#[derive(Debug, Default)]
pub struct TextureMap {
    source: Option<TextureSourceRef>,
    state: RwLock<TextureMapState>,
}

impl TextureMap {
    #[must_use]
    pub fn new(source: Option<TextureSourceRef>) -> Self {
        Self {
            source,
            state: RwLock::new(TextureMapState::default()),
        }
    }

    /// Map over an already-resident texture.
    #[must_use]
    pub fn from_texture(texture: TextureRef) -> Self {
        Self::new(Some(TextureSource::with_texture(texture)))
    }

    // -- Builder pattern (chainable at construction time) --

    #[must_use]
    pub fn with_transform(self, transform: TextureTransform) -> Self {
        self.state.write().transform = transform;
        self
    }

    #[must_use]
    pub fn with_use_alpha_channel(self, use_alpha: bool) -> Self {
        self.state.write().use_alpha_channel = use_alpha;
        self
    }

    #[must_use]
    pub fn with_lightmap_offset_scale(self, offset: f32, scale: f32) -> Self {
        self.state.write().lightmap_offset_scale = Vec2::new(offset, scale);
        self
    }

    #[must_use]
    pub fn with_mapping_mode(self, mode: MaterialMappingMode) -> Self {
        self.state.write().mapping_mode = mode;
        self
    }

    #[must_use]
    pub fn with_repeat(self, repeat: bool) -> Self {
        self.state.write().repeat = repeat;
        self
    }

    #[must_use]
    pub fn into_ref(self) -> TextureMapRef {
        Arc::new(self)
    }

    // -- Accessors --

    #[must_use]
    pub fn texture_transform(&self) -> TextureTransform {
        self.state.read().transform
    }

    pub fn set_texture_transform(&self, transform: TextureTransform) {
        self.state.write().transform = transform;
    }

    #[must_use]
    pub fn mapping_mode(&self) -> MaterialMappingMode {
        self.state.read().mapping_mode
    }

    pub fn set_mapping_mode(&self, mode: MaterialMappingMode) {
        self.state.write().mapping_mode = mode;
    }

    #[must_use]
    pub fn repeat(&self) -> bool {
        self.state.read().repeat
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.state.write().repeat = repeat;
    }

    #[must_use]
    pub fn use_alpha_channel(&self) -> bool {
        self.state.read().use_alpha_channel
    }

    pub fn set_use_alpha_channel(&self, use_alpha: bool) {
        self.state.write().use_alpha_channel = use_alpha;
    }

    /// `(offset, scale)` applied to lightmap samples.
    #[must_use]
    pub fn lightmap_offset_scale(&self) -> Vec2 {
        self.state.read().lightmap_offset_scale
    }

    pub fn set_lightmap_offset_scale(&self, offset: f32, scale: f32) {
        self.state.write().lightmap_offset_scale = Vec2::new(offset, scale);
    }

    #[must_use]
    pub fn texture_source(&self) -> Option<&TextureSourceRef> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn texture_view(&self) -> TextureView {
        TextureView {
            texture: self.source.as_ref().and_then(|source| source.gpu_texture()),
        }
    }

    /// `true` once the source has resolved to a texture with uploaded content.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.texture_view()
            .texture
            .is_some_and(|texture| texture.is_defined())
    }

    /// Byte size of the resolved texture, `0` while unresolved.
    #[must_use]
    pub fn size(&self) -> usize {
        self.texture_view().texture.map_or(0, |texture| texture.size())
    }
}
