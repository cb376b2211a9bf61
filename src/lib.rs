//! # Myth Materials
//!
//! Material property system of the Myth engine.
//!
//! A [`Material`] tracks which shading properties are set through a compact
//! [`MaterialKey`], keeps its texture maps in a lock-protected channel table,
//! and is packed together with up to two more materials into one GPU schema
//! buffer by a [`MultiMaterial`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use glam::Vec3;
//! use myth_materials::{Material, MultiMaterial};
//!
//! let material = Arc::new(Material::new("metal"));
//! material.set_albedo(Vec3::new(0.9, 0.9, 0.9), true);
//! material.set_metallic(1.0);
//!
//! let mut multi = MultiMaterial::new();
//! multi.push(material, 0);
//! multi.rebuild()?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod errors;
pub mod resources;
pub mod settings;
pub mod utils;

pub use errors::{MaterialError, Result};
pub use resources::{
    BufferRef, CullFaceMode, MapChannel, Material, MaterialKey, MaterialRef, MultiMaterial,
    OpacityMapMode, TextureMap, TextureTable,
};
pub use settings::{MultiMaterialSettings, ToonClock};
