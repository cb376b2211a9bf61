//! Material resources
//!
//! CPU-side data consumed by the renderer; nothing here talks to a GPU device:
//! - [`MaterialKey`]: bitfield of set properties and derived classifications
//! - [`Material`]: a single surface's properties and texture channels
//! - [`MultiMaterial`]: layered composition sharing one schema buffer
//! - [`schema`]: per-layer GPU record layouts
//! - [`TextureMap`] / [`TextureSource`] / [`Texture`]: texture handles
//! - [`BufferRef`]: CPU copy of a GPU buffer

pub mod buffer;
pub mod color;
pub mod key;
pub mod material;
pub mod multi_material;
pub mod schema;
pub mod texture;
pub mod texture_table;

pub use buffer::BufferRef;
pub use color::{srgb_to_linear, srgb_to_linear_vec3};
pub use key::{CullFaceMode, KEY_FLAG_COUNT, MapChannel, MaterialKey, OpacityMapMode};
pub use material::{
    ChannelTable, ExtraFallthrough, Material, MaterialProperties, MaterialRef, NUM_TOTAL_FLAGS,
    OutlineWidthMode, ToonParams, key_flag_fallthrough_index,
};
pub use multi_material::{MAX_LAYERS, MaterialLayer, MultiMaterial, TextureInfo};
pub use schema::{LayerSchema, SchemaLayout, StandardSchema, ToonSchema, WgslStruct};
pub use texture::{
    MaterialMappingMode, Texture, TextureMap, TextureMapRef, TextureRef, TextureSampler,
    TextureSource, TextureSourceRef, TextureTransform, TextureUsage,
};
pub use texture_table::{TextureTable, TextureTableRef};
