//! Multi-Material Configuration
//!
//! [`MultiMaterialSettings`] is handed to
//! [`MultiMaterial::with_settings`](crate::MultiMaterial::with_settings) and
//! fixes how an instance allocates its schema buffer and which clock drives
//! toon animation. It is plain data; construct it with struct update syntax:
//!
//! ```rust,ignore
//! use myth_materials::{MultiMaterialSettings, ToonClock};
//! use myth_materials::utils::time::Instant;
//!
//! let settings = MultiMaterialSettings {
//!     toon_clock: ToonClock::Epoch(Instant::now()),
//!     ..Default::default()
//! };
//! ```

use crate::utils::time::{self, Instant};

/// Source of the toon animation epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToonClock {
    /// The process-wide epoch shared by every multi-material.
    #[default]
    Global,
    /// A caller-supplied epoch, e.g. for deterministic playback.
    Epoch(Instant),
}

impl ToonClock {
    #[must_use]
    pub fn epoch(&self) -> Instant {
        match self {
            Self::Global => time::toon_epoch(),
            Self::Epoch(epoch) => *epoch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiMaterialSettings {
    /// Clock used by `set_toon_time`.
    pub toon_clock: ToonClock,

    /// Usage flags of the schema buffer.
    ///
    /// Defaults to `UNIFORM | COPY_DST`. Hosts binding the schema as a
    /// storage buffer switch this to `STORAGE | COPY_DST`.
    pub schema_usage: wgpu::BufferUsages,

    /// Debug label of the schema buffer.
    pub schema_label: String,
}

impl Default for MultiMaterialSettings {
    fn default() -> Self {
        Self {
            toon_clock: ToonClock::Global,
            schema_usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            schema_label: "MaterialSchema".to_string(),
        }
    }
}
