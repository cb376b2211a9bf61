use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;
use parking_lot::{RwLock, RwLockReadGuard};

// Global buffer id generator
static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// CPU-side copy of a GPU buffer.
///
/// The renderer uploads `data` whenever `version` moves past the last
/// uploaded version.
#[derive(Debug)]
pub struct DataBuffer {
    pub id: u64,
    pub label: String,
    version: AtomicU64,
    data: RwLock<Vec<u8>>,
    pub usage: wgpu::BufferUsages,
}

/// Shared handle to a [`DataBuffer`]. Equality is identity.
#[derive(Debug, Clone)]
pub struct BufferRef(Arc<DataBuffer>);

impl PartialEq for BufferRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for BufferRef {}

impl std::hash::Hash for BufferRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl BufferRef {
    #[must_use]
    pub fn from_bytes(data: &[u8], usage: wgpu::BufferUsages, label: Option<&str>) -> Self {
        Self(Arc::new(DataBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            label: label.unwrap_or("Buffer").to_string(),
            version: AtomicU64::new(0),
            data: RwLock::new(data.to_vec()),
            usage,
        }))
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.0.version.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[must_use]
    pub fn usage(&self) -> wgpu::BufferUsages {
        self.0.usage
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Size of the buffer in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.data.read().len()
    }

    pub fn read_data(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.0.data.read()
    }

    /// Overwrites `bytes.len()` bytes starting at `offset`.
    ///
    /// Returns `false` (and writes nothing) when the bytes do not fit.
    pub fn write_bytes_at(&self, offset: usize, bytes: &[u8]) -> bool {
        let Some(end) = offset.checked_add(bytes.len()) else {
            return false;
        };
        let mut data = self.0.data.write();
        let Some(target) = data.get_mut(offset..end) else {
            return false;
        };
        target.copy_from_slice(bytes);
        drop(data);

        self.0.version.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Reads a `T` starting at `offset`, `None` when out of bounds.
    #[must_use]
    pub fn read_at<T: Pod>(&self, offset: usize) -> Option<T> {
        let end = offset.checked_add(std::mem::size_of::<T>())?;
        let data = self.0.data.read();
        data.get(offset..end).map(bytemuck::pod_read_unaligned)
    }

    /// Typed in-place edit of the first `T` stored in the buffer.
    ///
    /// The storage is a byte vector without alignment guarantees, so the value
    /// is read out, edited and written back. Returns `None` when the buffer is
    /// smaller than `T`.
    pub fn edit<T: Pod, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let size = std::mem::size_of::<T>();
        let mut data = self.0.data.write();
        let bytes = data.get_mut(..size)?;

        let mut value: T = bytemuck::pod_read_unaligned(bytes);
        let result = f(&mut value);
        bytes.copy_from_slice(bytemuck::bytes_of(&value));
        drop(data);

        self.0.version.fetch_add(1, Ordering::Relaxed);
        Some(result)
    }
}

impl std::ops::Deref for BufferRef {
    type Target = DataBuffer;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
