//! Producer-side handle to one metric value.
//!
//! Registration hands the producer a value byte offset; the handle wraps it
//! together with the pool so updates stay bounds-checked and never touch
//! the rest of the record.

use crate::error::ShmError;
use crate::pool::SharedPool;

/// Updates a single metric value in place.
#[derive(Debug, Clone)]
pub struct MetricHandle {
    pool: SharedPool,
    value_byte_offset: usize,
}

impl MetricHandle {
    pub fn new(pool: SharedPool, value_byte_offset: usize) -> Self {
        Self {
            pool,
            value_byte_offset,
        }
    }

    pub fn value_byte_offset(&self) -> usize {
        self.value_byte_offset
    }

    /// Overwrite the value field.
    pub fn set(&self, value: f64) -> Result<(), ShmError> {
        self.pool.write_f64_at(self.value_byte_offset, value)
    }

    /// Read the current value field.
    pub fn get(&self) -> Result<f64, ShmError> {
        self.pool.read_f64_at(self.value_byte_offset)
    }

    /// Add `delta` to the value field. Counters only move forward; the
    /// caller enforces that.
    pub fn add(&self, delta: f64) -> Result<(), ShmError> {
        let current = self.get()?;
        self.set(current + delta)
    }
}
