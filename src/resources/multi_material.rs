//! Multi-Material
//!
//! A [`MultiMaterial`] composes up to [`MAX_LAYERS`] materials into what one
//! draw call consumes:
//!
//! - one [`TextureTable`] per layer, always allocated
//! - one schema buffer holding `layer_count` records of a single
//!   [`SchemaLayout`], standard or toon
//! - cached texture statistics over the active layers
//! - identity snapshots of procedurally produced textures and materials, used
//!   to detect when the producer starts returning something else
//!
//! # Layer stack
//!
//! Materials are pushed with a priority. The highest-priority material is the
//! top of the stack and decides, on [`rebuild`](MultiMaterial::rebuild), the
//! shading model and the number of layers. Layer 0 is the top material, layer
//! 1 the next one down, and so on.
//!
//! ```rust,ignore
//! let mut multi = MultiMaterial::new();
//! multi.push(base, 0);
//! multi.push(overlay, 10);
//! multi.rebuild()?;
//! multi.apply_samplers();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::errors::{MaterialError, Result};
use crate::resources::buffer::BufferRef;
use crate::resources::material::{Material, MaterialRef};
use crate::resources::schema::{LayerSchema, SchemaLayout, ToonSchema};
use crate::resources::texture::{Texture, TextureRef};
use crate::resources::texture_table::{TextureTable, TextureTableRef};
use crate::settings::MultiMaterialSettings;
use crate::utils::time::{self, Instant};

/// Fixed layer capacity of a multi-material.
pub const MAX_LAYERS: usize = 3;

pub type SamplerFunc = Box<dyn Fn() + Send + Sync>;

// ============================================================================
// Reference Tracking
// ============================================================================

/// Producer plus the identity it returned when registered.
///
/// The snapshot is a `Weak`, so the tracked resource is not kept alive, while
/// its allocation (and therefore its address) cannot be reused.
type Producer<T> = Box<dyn Fn() -> Option<Arc<T>> + Send + Sync>;

struct Reference<T> {
    producer: Producer<T>,
    snapshot: Option<Weak<T>>,
}

impl<T> Reference<T> {
    fn new(producer: Producer<T>) -> Self {
        let snapshot = producer().as_ref().map(Arc::downgrade);
        Self { producer, snapshot }
    }

    fn changed(&self) -> bool {
        match ((self.producer)(), &self.snapshot) {
            (None, None) => false,
            (Some(current), Some(snapshot)) => !std::ptr::eq(Arc::as_ptr(&current), snapshot.as_ptr()),
            _ => true,
        }
    }
}

// ============================================================================
// Layers & Texture Info
// ============================================================================

#[derive(Debug, Clone)]
pub struct MaterialLayer {
    pub material: MaterialRef,
    pub priority: i32,
}

/// Aggregate over the textures bound in the active layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureInfo {
    /// Bytes used by defined textures.
    pub size: usize,
    /// Number of defined textures.
    pub count: usize,
    /// Every bound slot has resolved to a defined texture.
    pub all_defined: bool,
}

// ============================================================================
// MultiMaterial
// ============================================================================

pub struct MultiMaterial {
    settings: MultiMaterialSettings,

    layers: SmallVec<[MaterialLayer; MAX_LAYERS]>,
    texture_tables: [TextureTableRef; MAX_LAYERS],
    layer_count: usize,
    is_toon: bool,
    schema_buffer: BufferRef,

    texture_info: Mutex<Option<TextureInfo>>,

    reference_textures: Vec<Reference<Texture>>,
    reference_materials: Vec<Reference<Material>>,
    sampler_funcs: Vec<SamplerFunc>,

    needs_update: AtomicBool,
    textures_loading: AtomicBool,
}

impl Default for MultiMaterial {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiMaterial {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(MultiMaterialSettings::default())
    }

    /// Starts as one standard layer with a default-valued schema record.
    #[must_use]
    pub fn with_settings(settings: MultiMaterialSettings) -> Self {
        let schema_buffer = Self::allocate_schema(&settings, SchemaLayout::Standard, 1);
        Self {
            settings,
            layers: SmallVec::new(),
            texture_tables: std::array::from_fn(|_| TextureTable::new()),
            layer_count: 1,
            is_toon: false,
            schema_buffer,
            texture_info: Mutex::new(None),
            reference_textures: Vec::new(),
            reference_materials: Vec::new(),
            sampler_funcs: Vec::new(),
            needs_update: AtomicBool::new(false),
            textures_loading: AtomicBool::new(false),
        }
    }

    fn allocate_schema(
        settings: &MultiMaterialSettings,
        layout: SchemaLayout,
        layers: usize,
    ) -> BufferRef {
        BufferRef::from_bytes(
            &layout.default_records(layers),
            settings.schema_usage,
            Some(settings.schema_label.as_str()),
        )
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn settings(&self) -> &MultiMaterialSettings {
        &self.settings
    }

    #[must_use]
    pub fn is_toon(&self) -> bool {
        self.is_toon
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    #[must_use]
    pub fn schema_layout(&self) -> SchemaLayout {
        SchemaLayout::for_toon(self.is_toon)
    }

    /// The current schema buffer. Replaced (new id) whenever the layout or
    /// layer count changes.
    #[must_use]
    pub fn schema_buffer(&self) -> &BufferRef {
        &self.schema_buffer
    }

    #[must_use]
    pub fn texture_tables(&self) -> &[TextureTableRef; MAX_LAYERS] {
        &self.texture_tables
    }

    #[must_use]
    pub fn texture_table(&self, index: usize) -> Option<&TextureTableRef> {
        self.texture_tables.get(index)
    }

    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update.load(Ordering::Acquire)
    }

    pub fn set_needs_update(&self, value: bool) {
        self.needs_update.store(value, Ordering::Release);
    }

    #[must_use]
    pub fn are_textures_loading(&self) -> bool {
        self.textures_loading.load(Ordering::Acquire)
    }

    pub fn set_textures_loading(&self, value: bool) {
        self.textures_loading.store(value, Ordering::Release);
    }

    // ========================================================================
    // Layer Stack
    // ========================================================================

    /// Inserts `material` by priority; among equal priorities the newest is on top.
    pub fn push(&mut self, material: MaterialRef, priority: i32) {
        let position = self
            .layers
            .iter()
            .position(|layer| layer.priority > priority)
            .unwrap_or(self.layers.len());
        self.layers.insert(position, MaterialLayer { material, priority });
    }

    pub fn pop(&mut self) -> Option<MaterialLayer> {
        self.layers.pop()
    }

    /// Removes every layer holding `material`. Returns whether any was removed.
    pub fn remove(&mut self, material: &MaterialRef) -> bool {
        let before = self.layers.len();
        self.layers
            .retain(|layer| !Arc::ptr_eq(&layer.material, material));
        self.layers.len() != before
    }

    #[must_use]
    pub fn top(&self) -> Option<&MaterialLayer> {
        self.layers.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers from the top of the stack down.
    pub fn iter(&self) -> impl Iterator<Item = &MaterialLayer> {
        self.layers.iter().rev()
    }

    // ========================================================================
    // Texture Info
    // ========================================================================

    /// Aggregates defined textures over the active layers' tables.
    ///
    /// The result is cached only once every bound slot is defined; while any
    /// texture is still loading each call recomputes.
    pub fn calculate_material_info(&self) -> TextureInfo {
        let mut cache = self.texture_info.lock();
        if let Some(info) = *cache {
            return info;
        }

        let mut info = TextureInfo {
            all_defined: true,
            ..Default::default()
        };
        for table in &self.texture_tables[..self.layer_count] {
            for texture in table.textures() {
                match texture {
                    Some(texture) if texture.is_defined() => {
                        info.size += texture.size();
                        info.count += 1;
                    }
                    _ => info.all_defined = false,
                }
            }
        }

        if info.all_defined {
            *cache = Some(info);
        }
        info
    }

    #[must_use]
    pub fn has_texture_info(&self) -> bool {
        self.texture_info.lock().is_some()
    }

    pub fn reset_texture_info(&self) {
        *self.texture_info.lock() = None;
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.calculate_material_info().count
    }

    #[must_use]
    pub fn texture_size(&self) -> usize {
        self.calculate_material_info().size
    }

    // ========================================================================
    // Reference Tracking
    // ========================================================================

    pub fn reset_reference_textures_and_materials(&mut self) {
        self.reference_textures.clear();
        self.reference_materials.clear();
    }

    /// Calls `producer` once and remembers the identity it returned.
    pub fn add_reference_texture(
        &mut self,
        producer: impl Fn() -> Option<TextureRef> + Send + Sync + 'static,
    ) {
        self.reference_textures.push(Reference::new(Box::new(producer)));
    }

    /// Calls `producer` once and remembers the identity it returned.
    pub fn add_reference_material(
        &mut self,
        producer: impl Fn() -> Option<MaterialRef> + Send + Sync + 'static,
    ) {
        self.reference_materials.push(Reference::new(Box::new(producer)));
    }

    /// Re-runs every producer and reports the first identity mismatch.
    ///
    /// Textures are checked before materials. Snapshots are not refreshed.
    #[must_use]
    pub fn any_reference_materials_or_textures_changed(&self) -> bool {
        self.reference_textures.iter().any(Reference::changed)
            || self.reference_materials.iter().any(Reference::changed)
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Switches layout and/or layer count.
    ///
    /// No-op returning `Ok(false)` when both already match. Otherwise the
    /// schema buffer is replaced by `layers` default records of the chosen
    /// layout and `Ok(true)` is returned.
    pub fn set_is_toon_and_layers(&mut self, is_toon: bool, layers: usize) -> Result<bool> {
        if !(1..=MAX_LAYERS).contains(&layers) {
            return Err(MaterialError::InvalidLayerCount {
                requested: layers,
                max: MAX_LAYERS,
            });
        }
        if is_toon == self.is_toon && layers == self.layer_count {
            return Ok(false);
        }

        self.is_toon = is_toon;
        self.layer_count = layers;

        let layout = self.schema_layout();
        self.schema_buffer = Self::allocate_schema(&self.settings, layout, layers);
        self.reset_texture_info();

        log::debug!(
            "Reallocated material schema: {layout:?} x {layers} ({} bytes)",
            self.schema_buffer.size()
        );
        Ok(true)
    }

    /// Re-packs layer `index` from `material`.
    ///
    /// In the toon layout the animation time of layer 0 is preserved.
    pub fn write_layer_schema(&self, index: usize, material: &Material) -> Result<()> {
        self.check_layer(index)?;

        let layout = self.schema_layout();
        let mut record = LayerSchema::from_material(layout, material);
        if let LayerSchema::Toon(schema) = &mut record
            && index == 0
        {
            schema.time = self.toon_time();
        }
        self.write_record(index, &record);
        Ok(())
    }

    fn write_record(&self, index: usize, record: &LayerSchema) {
        debug_assert_eq!(record.layout(), self.schema_layout());
        let offset = index * self.schema_layout().stride();
        let written = self.schema_buffer.write_bytes_at(offset, record.as_bytes());
        debug_assert!(written, "schema record {index} outside the schema buffer");
    }

    fn toon_time(&self) -> f32 {
        self.schema_buffer
            .read_at(std::mem::offset_of!(ToonSchema, time))
            .unwrap_or(0.0)
    }

    /// Writes the seconds elapsed since the toon epoch into layer 0 and
    /// returns them. Only valid for toon multi-materials.
    pub fn set_toon_time(&self) -> f32 {
        assert!(self.is_toon, "set_toon_time called on a non-toon multi-material");

        let time = time::elapsed_millis_as_seconds(self.settings.toon_clock.epoch(), Instant::now());
        self.schema_buffer.edit(|first: &mut ToonSchema| first.time = time);
        time
    }

    fn check_layer(&self, index: usize) -> Result<()> {
        if index < self.layer_count {
            Ok(())
        } else {
            Err(MaterialError::LayerIndexOutOfRange {
                index,
                layers: self.layer_count,
            })
        }
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Points layer `index` at `material`: fills its texture table from the
    /// material's channels and packs its schema record.
    pub fn bind_layer(&self, index: usize, material: &MaterialRef) -> Result<()> {
        self.check_layer(index)?;

        let table = &self.texture_tables[index];
        table.clear();
        for (channel, map) in material.texture_maps() {
            table.set_source(channel, map.texture_source().cloned());
        }

        self.write_layer_schema(index, material)?;
        self.reset_texture_info();
        Ok(())
    }

    /// Registers a closure run by [`apply_samplers`](Self::apply_samplers).
    pub fn add_sampler_func(&mut self, func: impl Fn() + Send + Sync + 'static) {
        self.sampler_funcs.push(Box::new(func));
    }

    pub fn apply_samplers(&self) {
        for func in &self.sampler_funcs {
            func();
        }
    }

    /// Re-derives everything from the layer stack.
    ///
    /// The top material selects layout and layer count; the topmost
    /// `layer_count` materials are bound to layers `0..`, layers without a
    /// material are reset to defaults. Sampler closures are re-registered
    /// for every bound channel that has a sampler.
    pub fn rebuild(&mut self) -> Result<()> {
        self.sampler_funcs.clear();

        let (is_toon, layers) = match self.top() {
            Some(top) => {
                let requested = usize::from(top.material.layers());
                let layers = requested.clamp(1, MAX_LAYERS);
                if layers != requested {
                    log::warn!(
                        "Material '{}' requests {requested} layers, using {layers}",
                        top.material.name()
                    );
                }
                (top.material.is_toon(), layers)
            }
            None => (false, 1),
        };
        self.set_is_toon_and_layers(is_toon, layers)?;

        let bound: Vec<MaterialRef> = self
            .iter()
            .take(self.layer_count)
            .map(|layer| layer.material.clone())
            .collect();

        let layout = self.schema_layout();
        for index in 0..self.layer_count {
            match bound.get(index) {
                Some(material) => self.bind_layer(index, material)?,
                None => {
                    self.texture_tables[index].clear();
                    self.write_record(index, &LayerSchema::default_for(layout));
                }
            }
        }
        for table in &self.texture_tables[self.layer_count..] {
            table.clear();
        }

        for material in bound {
            for channel in material.sampler_channels() {
                let material = material.clone();
                self.add_sampler_func(move || material.apply_sampler(channel));
            }
        }

        self.reset_texture_info();
        Ok(())
    }
}

impl std::fmt::Debug for MultiMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiMaterial")
            .field("layers", &self.layers.len())
            .field("layer_count", &self.layer_count)
            .field("is_toon", &self.is_toon)
            .field("schema_buffer", &self.schema_buffer.id())
            .field("reference_textures", &self.reference_textures.len())
            .field("reference_materials", &self.reference_materials.len())
            .field("sampler_funcs", &self.sampler_funcs.len())
            .finish_non_exhaustive()
    }
}
