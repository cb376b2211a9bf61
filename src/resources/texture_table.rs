//! Per-layer texture table.
//!
//! A [`TextureTable`] is the GPU-side indirection object a shader indexes by
//! [`MapChannel`]. It binds texture *sources* rather than textures so that a
//! slot bound before loading finishes picks up the texture on its own.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::resources::key::MapChannel;
use crate::resources::texture::{TextureRef, TextureSourceRef};

pub type TextureTableRef = Arc<TextureTable>;

#[derive(Debug, Default)]
pub struct TextureTable {
    slots: RwLock<[Option<TextureSourceRef>; MapChannel::COUNT]>,
}

impl TextureTable {
    #[must_use]
    pub fn new() -> TextureTableRef {
        Arc::new(Self::default())
    }

    pub fn set_source(&self, channel: MapChannel, source: Option<TextureSourceRef>) {
        self.slots.write()[channel.index()] = source;
    }

    pub fn clear(&self) {
        *self.slots.write() = Default::default();
    }

    /// Number of bound slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Textures of all bound slots, in channel order.
    ///
    /// A bound slot whose source has not resolved yet yields `None`.
    #[must_use]
    pub fn textures(&self) -> Vec<Option<TextureRef>> {
        self.slots
            .read()
            .iter()
            .flatten()
            .map(|source| source.gpu_texture())
            .collect()
    }
}
