//! Batched one-sided reads over a connected queue pair.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use mview_proto::RegionDescriptor;
use mview_types::QpNum;

use crate::config::RdmaConfig;
use crate::error::RdmaError;
use crate::transport::Transport;

/// Posts a batch of one-sided reads and waits for all of them to complete.
///
/// Results come back in the order the targets were given, regardless of
/// the order completions arrive in. A batch is all-or-nothing: one failed
/// work request fails the whole call.
pub struct OneSidedReader {
    transport: Arc<dyn Transport>,
    config: RdmaConfig,
}

impl OneSidedReader {
    pub fn new(transport: Arc<dyn Transport>, config: RdmaConfig) -> Self {
        Self { transport, config }
    }

    /// Read every target on `qp`. Returns one buffer per target, in target
    /// order.
    pub async fn execute(
        &self,
        qp: QpNum,
        targets: &[RegionDescriptor],
    ) -> Result<Vec<Bytes>, RdmaError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        // Completions left over from an earlier failed batch must not be
        // mistaken for this batch's.
        let stale = self.transport.poll_completions(qp).len();
        if stale > 0 {
            tracing::warn!(qp = %qp, stale, "discarded stale completions");
        }

        for (i, target) in targets.iter().enumerate() {
            self.transport.post_read(qp, target, i as u64)?;
        }

        let started = Instant::now();
        let mut slots: Vec<Option<Bytes>> = vec![None; targets.len()];
        let mut remaining = targets.len();
        loop {
            for completion in self.transport.poll_completions(qp) {
                let index = completion.wr_id as usize;
                let Some(slot) = slots.get_mut(index) else {
                    tracing::warn!(qp = %qp, wr_id = completion.wr_id, "completion for unknown work request");
                    continue;
                };
                match completion.result {
                    Ok(data) => {
                        if slot.replace(data).is_none() {
                            remaining -= 1;
                        }
                    }
                    Err(status) => {
                        tracing::error!(qp = %qp, wr_id = completion.wr_id, status, "read failed");
                        return Err(RdmaError::Transport(status));
                    }
                }
            }

            if remaining == 0 {
                break;
            }
            let waited = started.elapsed();
            if waited >= self.config.read_timeout() {
                return Err(RdmaError::ReadTimeout { waited });
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        Ok(slots.into_iter().map(|s| s.unwrap_or_default()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use mview_shm::SharedPool;

    fn setup() -> (Arc<LoopbackTransport>, QpNum, Vec<RegionDescriptor>, OneSidedReader) {
        let transport = Arc::new(LoopbackTransport::new());
        let pool = SharedPool::new("rd", 3 * 4096, 4096).unwrap();
        pool.write_at(0, b"alpha").unwrap();
        pool.write_at(4096, b"bravo").unwrap();
        pool.write_at(8192, b"charlie").unwrap();

        let qp = transport.create_queue_pair().unwrap();
        let targets = (0..3)
            .map(|i| {
                transport
                    .register_region(&pool, i * 4096, 4096, &format!("mr-{i}"))
                    .unwrap()
            })
            .collect();

        let config = RdmaConfig {
            poll_interval_ms: 1,
            read_timeout_ms: 50,
            ..RdmaConfig::default()
        };
        let reader = OneSidedReader::new(transport.clone(), config);
        (transport, qp, targets, reader)
    }

    #[tokio::test]
    async fn test_results_in_target_order() {
        let (_, qp, targets, reader) = setup();
        // Loopback delivers completions newest-first; output order must
        // still match target order.
        let results = reader.execute(qp, &targets).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(&results[0][..5], b"alpha");
        assert_eq!(&results[1][..5], b"bravo");
        assert_eq!(&results[2][..7], b"charlie");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (_, qp, _, reader) = setup();
        assert!(reader.execute(qp, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_read_fails_batch() {
        let (transport, qp, targets, reader) = setup();
        transport.fail_next_read();
        let err = reader.execute(qp, &targets).await.unwrap_err();
        assert!(matches!(err, RdmaError::Transport(_)));
    }

    #[tokio::test]
    async fn test_timeout_when_completions_never_arrive() {
        let (transport, qp, targets, reader) = setup();
        transport.hold_completions(true);
        let err = reader.execute(qp, &targets).await.unwrap_err();
        assert!(matches!(err, RdmaError::ReadTimeout { .. }));
    }

    #[tokio::test]
    async fn test_stale_completions_discarded() {
        let (transport, qp, targets, reader) = setup();

        // Leave completions from an abandoned batch in the queue.
        transport.post_read(qp, &targets[2], 99).unwrap();

        let results = reader.execute(qp, &targets).await.unwrap();
        assert_eq!(&results[0][..5], b"alpha");
        assert_eq!(&results[2][..7], b"charlie");
    }

    #[tokio::test]
    async fn test_read_on_unknown_qp() {
        let (_, _, targets, reader) = setup();
        let err = reader.execute(QpNum(1), &targets).await.unwrap_err();
        assert!(matches!(err, RdmaError::NotConnected(1)));
    }
}
