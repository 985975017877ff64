//! The shared memory pool: one contiguous buffer with bounds-checked
//! offset access.
//!
//! Addresses never leave this type as bare integers; everything goes
//! through `(pool, byte_offset)` accessors that assert against the pool
//! length. Cloning a `SharedPool` clones a handle to the same buffer.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ShmError;

struct PoolInner {
    name: String,
    page_size: usize,
    buf: RwLock<Vec<u8>>,
}

/// Handle to the shared pool buffer.
#[derive(Clone)]
pub struct SharedPool {
    inner: Arc<PoolInner>,
}

impl SharedPool {
    /// Create a pool of `pool_size_bytes` divided into fixed page slots.
    pub fn new(
        name: impl Into<String>,
        pool_size_bytes: usize,
        page_size_bytes: usize,
    ) -> Result<Self, ShmError> {
        if page_size_bytes == 0 {
            return Err(ShmError::InvalidGeometry(
                "page size must be non-zero".to_string(),
            ));
        }
        if pool_size_bytes < page_size_bytes {
            return Err(ShmError::InvalidGeometry(format!(
                "pool size {pool_size_bytes} smaller than page size {page_size_bytes}"
            )));
        }

        let name = name.into();
        tracing::info!(
            pool = %name,
            pool_size_bytes,
            page_size_bytes,
            max_pages = pool_size_bytes / page_size_bytes,
            "created shared pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                name,
                page_size: page_size_bytes,
                buf: RwLock::new(vec![0u8; pool_size_bytes]),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Total pool size in bytes.
    pub fn len(&self) -> usize {
        self.inner.buf.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Number of fixed page slots in the pool.
    pub fn max_pages(&self) -> usize {
        self.len() / self.inner.page_size
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), ShmError> {
        let pool_len = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= pool_len => Ok(()),
            _ => Err(ShmError::OutOfBounds {
                offset,
                len,
                pool_len,
            }),
        }
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    pub fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<(), ShmError> {
        self.check_range(offset, out.len())?;
        let buf = self.inner.buf.read();
        out.copy_from_slice(&buf[offset..offset + out.len()]);
        Ok(())
    }

    /// Write `data` starting at `offset`.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<(), ShmError> {
        self.check_range(offset, data.len())?;
        let mut buf = self.inner.buf.write();
        buf[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Read a little-endian f64 at `offset`.
    pub fn read_f64_at(&self, offset: usize) -> Result<f64, ShmError> {
        let mut bytes = [0u8; 8];
        self.read_at(offset, &mut bytes)?;
        Ok(f64::from_le_bytes(bytes))
    }

    /// Write a little-endian f64 at `offset`.
    pub fn write_f64_at(&self, offset: usize, value: f64) -> Result<(), ShmError> {
        self.write_at(offset, &value.to_le_bytes())
    }
}

impl std::fmt::Debug for SharedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPool")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("page_size", &self.inner.page_size)
            .finish()
    }
}
