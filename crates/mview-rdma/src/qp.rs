//! Queue-pair pool and connection state machine.
//!
//! Queue pairs are created up front as a pool; creation is all-or-nothing.
//! Connecting a pair walks it through init, ready-to-receive and
//! ready-to-send. A handshake failure parks the pair in the failed state,
//! which is terminal.

use std::sync::Arc;

use parking_lot::Mutex;

use mview_proto::QueuePairDescriptor;
use mview_types::QpNum;

use crate::config::RdmaConfig;
use crate::error::RdmaError;
use crate::transport::Transport;

/// Connection state of one queue pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpState {
    Init,
    ReadyToReceive,
    ReadyToSend,
    Failed,
}

impl std::fmt::Display for QpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QpState::Init => "init",
            QpState::ReadyToReceive => "ready_to_receive",
            QpState::ReadyToSend => "ready_to_send",
            QpState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One queue pair in the pool.
#[derive(Debug)]
pub struct QueuePair {
    qp_num: QpNum,
    state: QpState,
    remote: Option<QueuePairDescriptor>,
}

/// Introspection snapshot of one pool slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePairStatus {
    pub index: usize,
    pub qp_num: QpNum,
    pub state: QpState,
    pub remote: Option<QueuePairDescriptor>,
}

/// Fixed-size pool of queue pairs sharing one transport.
pub struct QueuePairPool {
    transport: Arc<dyn Transport>,
    pairs: Mutex<Vec<QueuePair>>,
}

impl QueuePairPool {
    /// Create `config.qp_pool_size` queue pairs. If any creation fails the
    /// pool is not built at all.
    pub fn new(transport: Arc<dyn Transport>, config: &RdmaConfig) -> Result<Self, RdmaError> {
        let mut pairs = Vec::with_capacity(config.qp_pool_size);
        for i in 0..config.qp_pool_size {
            let qp_num = transport.create_queue_pair().map_err(|e| {
                tracing::error!(index = i, error = %e, "queue pair creation failed, aborting pool");
                e
            })?;
            pairs.push(QueuePair {
                qp_num,
                state: QpState::Init,
                remote: None,
            });
        }

        tracing::info!(pool_size = pairs.len(), "queue pair pool ready");
        Ok(Self {
            transport,
            pairs: Mutex::new(pairs),
        })
    }

    pub fn size(&self) -> usize {
        self.pairs.lock().len()
    }

    /// Descriptors for every local queue pair, in pool order, for
    /// out-of-band exchange with the peer.
    pub fn local_descriptors(&self) -> Vec<QueuePairDescriptor> {
        let gid = self.transport.local_gid();
        self.pairs
            .lock()
            .iter()
            .map(|p| QueuePairDescriptor {
                qp_num: p.qp_num,
                gid: gid.clone(),
            })
            .collect()
    }

    /// Connect the queue pair at `index` to the remote peer.
    ///
    /// Returns `Ok(true)` when the pair reached ready-to-send and
    /// `Ok(false)` when the handshake failed (the pair is then parked in
    /// the failed state) or the pair is not in a connectable state.
    /// Reconnecting an already connected pair is rejected.
    pub fn connect(&self, index: usize, remote: &QueuePairDescriptor) -> Result<bool, RdmaError> {
        let mut pairs = self.pairs.lock();
        let size = pairs.len();
        let pair = pairs
            .get_mut(index)
            .ok_or(RdmaError::QpIndexOutOfRange { index, size })?;

        match pair.state {
            QpState::Init => {}
            QpState::ReadyToSend => {
                tracing::warn!(index, qp_num = %pair.qp_num, "queue pair already connected");
                return Ok(false);
            }
            QpState::Failed => {
                tracing::warn!(index, qp_num = %pair.qp_num, "queue pair is failed, cannot connect");
                return Ok(false);
            }
            QpState::ReadyToReceive => {
                tracing::warn!(index, qp_num = %pair.qp_num, "queue pair mid-handshake");
                return Ok(false);
            }
        }

        pair.state = QpState::ReadyToReceive;
        match self.transport.handshake(pair.qp_num, remote) {
            Ok(()) => {
                pair.state = QpState::ReadyToSend;
                pair.remote = Some(remote.clone());
                tracing::info!(
                    index,
                    qp_num = %pair.qp_num,
                    remote_qp = %remote.qp_num,
                    remote_gid = %remote.gid,
                    "queue pair connected"
                );
                Ok(true)
            }
            Err(e) => {
                pair.state = QpState::Failed;
                tracing::error!(index, qp_num = %pair.qp_num, error = %e, "handshake failed");
                Ok(false)
            }
        }
    }

    /// Connect every pool slot against the peer's descriptor list. Returns
    /// `true` only when all pairs connect.
    pub fn connect_all(&self, remotes: &[QueuePairDescriptor]) -> Result<bool, RdmaError> {
        let size = self.size();
        if remotes.len() != size {
            return Err(RdmaError::HandshakeFailed(format!(
                "peer sent {} descriptors for a pool of {size}",
                remotes.len()
            )));
        }
        let mut all = true;
        for (i, remote) in remotes.iter().enumerate() {
            all &= self.connect(i, remote)?;
        }
        Ok(all)
    }

    /// The queue pair at `index`, only if it is ready to post reads.
    pub fn connected(&self, index: usize) -> Result<QpNum, RdmaError> {
        let pairs = self.pairs.lock();
        let size = pairs.len();
        let pair = pairs
            .get(index)
            .ok_or(RdmaError::QpIndexOutOfRange { index, size })?;
        if pair.state != QpState::ReadyToSend {
            return Err(RdmaError::NotConnected(pair.qp_num.0));
        }
        Ok(pair.qp_num)
    }

    /// Snapshot of every pool slot, in pool order.
    pub fn list(&self) -> Vec<QueuePairStatus> {
        self.pairs
            .lock()
            .iter()
            .enumerate()
            .map(|(index, p)| QueuePairStatus {
                index,
                qp_num: p.qp_num,
                state: p.state,
                remote: p.remote.clone(),
            })
            .collect()
    }
}
