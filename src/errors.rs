//! Error Types
//!
//! This module defines the error types used throughout the material system.
//!
//! # Overview
//!
//! Most material operations cannot fail: absent channel entries resolve to
//! defaults and out-of-range scalars are clamped. The main error type
//! [`MaterialError`] therefore only covers:
//! - Decoding of serialized enum names (opacity map mode, cull face mode)
//! - Layer configuration of a [`MultiMaterial`](crate::MultiMaterial)
//!
//! # Usage
//!
//! Fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, MaterialError>`.
//!
//! ```rust,ignore
//! use myth_materials::errors::Result;
//! use myth_materials::OpacityMapMode;
//!
//! fn parse_mode(name: &str) -> Result<OpacityMapMode> {
//!     name.parse()
//! }
//! ```

use thiserror::Error;

/// The main error type for the material system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterialError {
    // ========================================================================
    // Name Decoding Errors
    // ========================================================================
    /// The name does not match any `OPACITY_MAP_*` mode.
    #[error("Unknown opacity map mode: {0}")]
    UnknownOpacityMapMode(String),

    /// The name does not match any `CULL_*` mode.
    #[error("Unknown cull face mode: {0}")]
    UnknownCullFaceMode(String),

    // ========================================================================
    // Layer Errors
    // ========================================================================
    /// Requested layer count is zero or exceeds the fixed capacity.
    #[error("Invalid layer count: {requested} (supported: 1..={max})")]
    InvalidLayerCount {
        /// The rejected layer count
        requested: usize,
        /// Maximum number of layers
        max: usize,
    },

    /// A layer index beyond the active layer count.
    #[error("Layer index out of range: {index} (active layers: {layers})")]
    LayerIndexOutOfRange {
        /// The invalid index
        index: usize,
        /// Active layer count
        layers: usize,
    },
}

/// Alias for `Result<T, MaterialError>`.
pub type Result<T> = std::result::Result<T, MaterialError>;
