//! RDMA configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the RDMA side: device selection, queue-pair pool
/// sizing, region geometry, and read polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdmaConfig {
    /// RDMA device name (e.g. "mlx5_1"). Only used by the verbs backend.
    #[serde(default = "default_device")]
    pub device: String,

    /// GID table index for RoCEv2.
    #[serde(default = "default_gid_index")]
    pub gid_index: u8,

    /// Physical port number on the device.
    #[serde(default = "default_ib_port")]
    pub ib_port: u8,

    /// Number of queue pairs to pre-allocate.
    #[serde(default = "default_qp_pool_size")]
    pub qp_pool_size: usize,

    /// Completion queue depth shared by the pool.
    #[serde(default = "default_cq_size")]
    pub cq_size: u32,

    /// Maximum send/receive work requests per queue pair.
    #[serde(default = "default_max_wr")]
    pub max_send_wr: u32,
    #[serde(default = "default_max_wr")]
    pub max_recv_wr: u32,

    /// Size of each registered memory region, a multiple of the page size.
    #[serde(default = "default_mr_size_bytes")]
    pub mr_size_bytes: usize,

    /// Sleep between completion polls while a read is outstanding.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for all posted reads of one execute call to complete.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_device() -> String {
    "mlx5_1".to_string()
}
fn default_gid_index() -> u8 {
    3
}
fn default_ib_port() -> u8 {
    1
}
fn default_qp_pool_size() -> usize {
    1
}
fn default_cq_size() -> u32 {
    100
}
fn default_max_wr() -> u32 {
    10
}
fn default_mr_size_bytes() -> usize {
    4096
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_read_timeout_ms() -> u64 {
    1000
}

impl Default for RdmaConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            gid_index: default_gid_index(),
            ib_port: default_ib_port(),
            qp_pool_size: default_qp_pool_size(),
            cq_size: default_cq_size(),
            max_send_wr: default_max_wr(),
            max_recv_wr: default_max_wr(),
            mr_size_bytes: default_mr_size_bytes(),
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl RdmaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
