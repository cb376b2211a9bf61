//! Texture channel table.
//!
//! Holds a material's per-channel texture maps, samplers and UV-set indices
//! behind one reentrant lock. A writer may keep the lock across a compound
//! update (e.g. store a map, then re-read the albedo map for opacity
//! classification) while every accessor locks again on its own.
//!
//! Readers receive cloned `Arc` handles, which stay usable after the lock is
//! released even if the table is re-pointed afterwards.
//!
//! Mutation is crate-private: outside code changes channels through
//! [`Material`](super::Material), which keeps the key in sync.

use std::cell::RefCell;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxHashMap;

use crate::resources::key::MapChannel;
use crate::resources::texture::{TextureMapRef, TextureSampler};

/// Plain contents of a [`ChannelTable`].
#[derive(Debug, Clone, Default)]
pub struct ChannelMaps {
    pub texture_maps: FxHashMap<MapChannel, TextureMapRef>,
    pub samplers: FxHashMap<MapChannel, TextureSampler>,
    pub texcoord_sets: FxHashMap<MapChannel, u32>,
}

pub type ChannelGuard<'a> = ReentrantMutexGuard<'a, RefCell<ChannelMaps>>;

#[derive(Debug, Default)]
pub struct ChannelTable {
    inner: ReentrantMutex<RefCell<ChannelMaps>>,
}

impl ChannelTable {
    #[must_use]
    pub fn new(maps: ChannelMaps) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(maps)),
        }
    }

    /// Holds the table lock for the lifetime of the guard.
    ///
    /// The same thread may keep calling any accessor while holding it.
    pub(crate) fn lock(&self) -> ChannelGuard<'_> {
        self.inner.lock()
    }

    /// Runs `f` with shared access to the maps.
    ///
    /// `f` must not call back into this table's mutating accessors.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&ChannelMaps) -> R) -> R {
        let guard = self.inner.lock();
        let maps = guard.borrow();
        f(&maps)
    }

    /// Runs `f` with exclusive access to the maps.
    ///
    /// `f` must not call back into any accessor of this table.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut ChannelMaps) -> R) -> R {
        let guard = self.inner.lock();
        let mut maps = guard.borrow_mut();
        f(&mut maps)
    }

    #[must_use]
    pub fn snapshot(&self) -> ChannelMaps {
        self.read(Clone::clone)
    }

    pub(crate) fn replace(&self, maps: ChannelMaps) {
        self.write(|current| *current = maps);
    }

    // -- Texture maps --

    #[must_use]
    pub fn texture_map(&self, channel: MapChannel) -> Option<TextureMapRef> {
        self.read(|maps| maps.texture_maps.get(&channel).cloned())
    }

    /// Stores or removes the map for `channel`, returning the previous one.
    pub(crate) fn set_texture_map(
        &self,
        channel: MapChannel,
        map: Option<TextureMapRef>,
    ) -> Option<TextureMapRef> {
        self.write(|maps| match map {
            Some(map) => maps.texture_maps.insert(channel, map),
            None => maps.texture_maps.remove(&channel),
        })
    }

    /// All present maps, sorted by channel.
    #[must_use]
    pub fn texture_maps(&self) -> Vec<(MapChannel, TextureMapRef)> {
        let mut entries: Vec<_> = self.read(|maps| {
            maps.texture_maps
                .iter()
                .map(|(channel, map)| (*channel, map.clone()))
                .collect()
        });
        entries.sort_by_key(|(channel, _)| *channel);
        entries
    }

    // -- Samplers --

    #[must_use]
    pub fn sampler(&self, channel: MapChannel) -> Option<TextureSampler> {
        self.read(|maps| maps.samplers.get(&channel).copied())
    }

    pub(crate) fn set_sampler(&self, channel: MapChannel, sampler: TextureSampler) {
        self.write(|maps| {
            maps.samplers.insert(channel, sampler);
        });
    }

    /// Channels with a sampler, sorted.
    #[must_use]
    pub fn sampler_channels(&self) -> Vec<MapChannel> {
        let mut channels: Vec<_> = self.read(|maps| maps.samplers.keys().copied().collect());
        channels.sort();
        channels
    }

    // -- UV sets --

    /// UV set used by `channel`; unset channels use set 0.
    #[must_use]
    pub fn texcoord_set(&self, channel: MapChannel) -> u32 {
        self.read(|maps| maps.texcoord_sets.get(&channel).copied().unwrap_or(0))
    }

    pub(crate) fn set_texcoord_set(&self, channel: MapChannel, set: u32) {
        self.write(|maps| {
            maps.texcoord_sets.insert(channel, set);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::texture::TextureMap;

    #[test]
    fn accessors_reenter_while_locked() {
        let table = ChannelTable::default();
        let _guard = table.lock();

        table.set_texture_map(MapChannel::Albedo, Some(TextureMap::default().into_ref()));
        table.set_texcoord_set(MapChannel::Albedo, 1);

        assert!(table.texture_map(MapChannel::Albedo).is_some());
        assert_eq!(table.texcoord_set(MapChannel::Albedo), 1);
        assert_eq!(table.texcoord_set(MapChannel::Normal), 0);
    }

    #[test]
    fn snapshot_handle_outlives_replacement() {
        let table = ChannelTable::default();
        let first = TextureMap::default().into_ref();
        table.set_texture_map(MapChannel::Normal, Some(first.clone()));

        let held = table.texture_map(MapChannel::Normal).expect("normal map");
        let previous = table.set_texture_map(MapChannel::Normal, Some(TextureMap::default().into_ref()));

        assert!(previous.is_some_and(|p| std::sync::Arc::ptr_eq(&p, &first)));
        assert!(std::sync::Arc::ptr_eq(&held, &first));
    }
}
