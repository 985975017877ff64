//! Transport seam between the RDMA layer and the wire.
//!
//! The trait covers exactly what the rest of the crate needs: create queue
//! pairs, drive a handshake against a peer descriptor, register pool
//! ranges for remote read, post one-sided reads, and poll completions.
//!
//! [`LoopbackTransport`] is the in-process implementation: registered
//! regions map back to a [`SharedPool`] and reads complete by copying from
//! it, with completions delivered out of posting order the way a real
//! completion queue may. [`VerbsTransport`] is the hardware path; without
//! the `verbs` feature it only reports that RDMA is unavailable.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use mview_proto::{QueuePairDescriptor, RegionDescriptor};
use mview_shm::SharedPool;
use mview_types::{QpNum, Rkey};

use crate::config::RdmaConfig;
use crate::error::RdmaError;

/// One completion queue entry for a posted read.
#[derive(Debug)]
pub struct Completion {
    /// Work request id supplied at post time.
    pub wr_id: u64,
    /// Read bytes on success, completion status message on failure.
    pub result: Result<Bytes, String>,
}

/// Low-level RDMA operations used by the queue-pair pool, the region
/// registry, and the one-sided reader.
pub trait Transport: Send + Sync {
    /// Local address identity handed to peers in descriptors.
    fn local_gid(&self) -> String;

    /// Create one queue pair in its initial state.
    fn create_queue_pair(&self) -> Result<QpNum, RdmaError>;

    /// Drive the queue pair to ready-to-send against the remote identity.
    fn handshake(&self, local: QpNum, remote: &QueuePairDescriptor) -> Result<(), RdmaError>;

    /// Register a pool range for remote read and return its descriptor.
    fn register_region(
        &self,
        pool: &SharedPool,
        byte_offset: usize,
        length: usize,
        name: &str,
    ) -> Result<RegionDescriptor, RdmaError>;

    /// Reverse a registration.
    fn unregister_region(&self, descriptor: &RegionDescriptor) -> Result<(), RdmaError>;

    /// Post one one-sided read of `target` on the given queue pair.
    fn post_read(&self, qp: QpNum, target: &RegionDescriptor, wr_id: u64) -> Result<(), RdmaError>;

    /// Drain available completions for the given queue pair. Non-blocking;
    /// an empty vec means nothing has completed yet.
    fn poll_completions(&self, qp: QpNum) -> Vec<Completion>;
}

struct RegisteredRegion {
    pool: SharedPool,
    byte_offset: usize,
    length: usize,
    rkey: Rkey,
}

struct PendingRead {
    qp: QpNum,
    wr_id: u64,
    result: Result<Bytes, String>,
}

/// In-process transport: both ends of the fabric live in one process and
/// reads complete from the registered pool ranges.
pub struct LoopbackTransport {
    gid: String,
    next_qp: AtomicU32,
    next_addr: AtomicU64,
    next_rkey: AtomicU32,
    qps: DashMap<u32, ()>,
    regions: DashMap<u64, RegisteredRegion>,
    pending: Mutex<Vec<PendingRead>>,
    fail_next_read: AtomicBool,
    hold_completions: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            gid: "fe80::1".to_string(),
            next_qp: AtomicU32::new(100),
            next_addr: AtomicU64::new(0x1000_0000),
            next_rkey: AtomicU32::new(1),
            qps: DashMap::new(),
            regions: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            fail_next_read: AtomicBool::new(false),
            hold_completions: AtomicBool::new(false),
        }
    }

    /// Fault injection: the next posted read completes with an error
    /// status.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Fault injection: completions stop being delivered until released.
    pub fn hold_completions(&self, hold: bool) {
        self.hold_completions.store(hold, Ordering::SeqCst);
    }

    fn read_region(&self, target: &RegionDescriptor) -> Result<Bytes, String> {
        let length = target.length as usize;
        for entry in self.regions.iter() {
            let region = entry.value();
            let base = *entry.key();
            let end = base + region.length as u64;
            if target.addr >= base && target.addr + target.length <= end {
                if target.rkey != region.rkey {
                    return Err(format!(
                        "remote access error: rkey {} does not match region key",
                        target.rkey
                    ));
                }
                let offset = region.byte_offset + (target.addr - base) as usize;
                let mut buf = vec![0u8; length];
                region
                    .pool
                    .read_at(offset, &mut buf)
                    .map_err(|e| format!("local protection error: {e}"))?;
                return Ok(Bytes::from(buf));
            }
        }
        Err(format!(
            "remote access error: no registered region covers addr {:#x} len {}",
            target.addr, target.length
        ))
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn local_gid(&self) -> String {
        self.gid.clone()
    }

    fn create_queue_pair(&self) -> Result<QpNum, RdmaError> {
        let qp_num = self.next_qp.fetch_add(1, Ordering::SeqCst);
        self.qps.insert(qp_num, ());
        Ok(QpNum(qp_num))
    }

    fn handshake(&self, local: QpNum, remote: &QueuePairDescriptor) -> Result<(), RdmaError> {
        if !self.qps.contains_key(&local.0) {
            return Err(RdmaError::HandshakeFailed(format!(
                "unknown local queue pair {local}"
            )));
        }
        if remote.gid != self.gid {
            return Err(RdmaError::HandshakeFailed(format!(
                "peer gid {} is unreachable",
                remote.gid
            )));
        }
        if !self.qps.contains_key(&remote.qp_num.0) {
            return Err(RdmaError::HandshakeFailed(format!(
                "peer queue pair {} does not exist",
                remote.qp_num
            )));
        }
        Ok(())
    }

    fn register_region(
        &self,
        pool: &SharedPool,
        byte_offset: usize,
        length: usize,
        name: &str,
    ) -> Result<RegionDescriptor, RdmaError> {
        if byte_offset + length > pool.len() {
            return Err(RdmaError::RegionMismatch(format!(
                "range {byte_offset}+{length} exceeds pool size {}",
                pool.len()
            )));
        }

        let addr = self.next_addr.fetch_add(length as u64, Ordering::SeqCst);
        let rkey = Rkey(self.next_rkey.fetch_add(1, Ordering::SeqCst));
        self.regions.insert(
            addr,
            RegisteredRegion {
                pool: pool.clone(),
                byte_offset,
                length,
                rkey,
            },
        );

        tracing::debug!(name, addr = format_args!("{addr:#x}"), %rkey, length, "registered region");
        Ok(RegionDescriptor {
            name: name.to_string(),
            addr,
            rkey,
            length: length as u64,
        })
    }

    fn unregister_region(&self, descriptor: &RegionDescriptor) -> Result<(), RdmaError> {
        self.regions
            .remove(&descriptor.addr)
            .map(|_| ())
            .ok_or_else(|| {
                RdmaError::RegionMismatch(format!(
                    "no registration at addr {:#x}",
                    descriptor.addr
                ))
            })
    }

    fn post_read(&self, qp: QpNum, target: &RegionDescriptor, wr_id: u64) -> Result<(), RdmaError> {
        if !self.qps.contains_key(&qp.0) {
            return Err(RdmaError::NotConnected(qp.0));
        }

        let result = if self.fail_next_read.swap(false, Ordering::SeqCst) {
            Err("work request flushed with error status".to_string())
        } else {
            self.read_region(target)
        };

        self.pending.lock().push(PendingRead { qp, wr_id, result });
        Ok(())
    }

    fn poll_completions(&self, qp: QpNum) -> Vec<Completion> {
        if self.hold_completions.load(Ordering::SeqCst) {
            return Vec::new();
        }

        let mut pending = self.pending.lock();
        let mut ours = Vec::new();
        let mut rest = Vec::new();
        for p in pending.drain(..) {
            if p.qp == qp {
                ours.push(Completion {
                    wr_id: p.wr_id,
                    result: p.result,
                });
            } else {
                rest.push(p);
            }
        }
        *pending = rest;

        // Completion order is not posting order on real hardware; deliver
        // newest-first so callers cannot get away with relying on it.
        ours.reverse();
        ours
    }
}

/// Hardware transport backed by libibverbs.
///
/// Without the `verbs` feature this only reports that RDMA is
/// unavailable, which keeps the rest of the workspace building and
/// testable on machines without an HCA.
#[derive(Debug)]
pub struct VerbsTransport {
    _config: RdmaConfig,
}

impl VerbsTransport {
    pub fn open(config: &RdmaConfig) -> Result<Self, RdmaError> {
        #[cfg(feature = "verbs")]
        {
            Err(RdmaError::Transport(format!(
                "verbs backend for device {} is not wired up in this build",
                config.device
            )))
        }
        #[cfg(not(feature = "verbs"))]
        {
            Err(RdmaError::Transport(format!(
                "rdma device {} unavailable: verbs feature not enabled",
                config.device
            )))
        }
    }
}
