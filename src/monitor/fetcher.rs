use crate::detection::normalize::normalize_transaction;
use crate::detection::types::ObservedTransaction;
use crate::monitor::dedup::{DedupCache, DedupStats};
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::{MonitorConfig, Priority};
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_client::client_error::ClientErrorKind;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Resolves a signature into a full transaction at a consistency level
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// `Ok(None)` when the transaction is not (yet) visible at `commitment`
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: CommitmentConfig,
    ) -> MonitorResult<Option<EncodedConfirmedTransactionWithStatusMeta>>;
}

#[async_trait]
impl TransactionSource for RpcClient {
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: CommitmentConfig,
    ) -> MonitorResult<Option<EncodedConfirmedTransactionWithStatusMeta>> {
        let signature = Signature::from_str(signature)
            .map_err(|e| MonitorError::ParseError(format!("Invalid signature: {}", e)))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(commitment),
            max_supported_transaction_version: Some(0),
        };

        match self.get_transaction_with_config(&signature, config).await {
            Ok(transaction) => Ok(Some(transaction)),
            // A `null` result surfaces as a deserialization error
            Err(e) if matches!(e.kind(), ClientErrorKind::SerdeJson(_)) => Ok(None),
            Err(e) => Err(MonitorError::RpcError(e)),
        }
    }
}

/// Fetches full transaction data for notified signatures, deduplicating them
pub struct TransactionFetcher {
    source: Arc<dyn TransactionSource>,
    dedup: Mutex<DedupCache>,
    fast: CommitmentConfig,
    strong: CommitmentConfig,
    attempt_timeout: Duration,
}

impl TransactionFetcher {
    pub fn new(source: Arc<dyn TransactionSource>, config: &MonitorConfig) -> Self {
        Self {
            source,
            dedup: Mutex::new(DedupCache::new(config.dedup_capacity)),
            fast: CommitmentConfig {
                commitment: config.fast_commitment,
            },
            strong: CommitmentConfig {
                commitment: config.strong_commitment,
            },
            attempt_timeout: Duration::from_millis(config.fetch_timeout_ms.max(1)),
        }
    }

    /// Eagerly marks the signature in-flight; false if it is a duplicate
    pub fn should_process(&self, signature: &str) -> bool {
        self.dedup.lock().should_process(signature)
    }

    /// Resolve a signature previously accepted by [`Self::should_process`].
    ///
    /// Tries the fast level, escalates once to the strong level, and gives up
    /// silently if the transaction is still not visible.
    pub async fn fetch(&self, signature: &str, priority: Priority) -> Option<ObservedTransaction> {
        debug!("Fetching transaction {} ({} priority)", signature, priority);

        let encoded = match self.attempt(signature, self.fast).await {
            Some(tx) => Some(tx),
            None => self.attempt(signature, self.strong).await,
        };

        self.dedup.lock().complete(signature, encoded.is_some());

        let Some(encoded) = encoded else {
            debug!("Transaction {} not visible, dropping", signature);
            return None;
        };

        let observed = normalize_transaction(&encoded);
        if observed.is_some() {
            info!("Fetched transaction {} (slot {})", signature, encoded.slot);
        }
        observed
    }

    async fn attempt(
        &self,
        signature: &str,
        commitment: CommitmentConfig,
    ) -> Option<EncodedConfirmedTransactionWithStatusMeta> {
        let call = self.source.get_transaction(signature, commitment);

        match timeout(self.attempt_timeout, call).await {
            Ok(Ok(Some(transaction))) => Some(transaction),
            Ok(Ok(None)) => {
                debug!("{} not found at {:?}", signature, commitment.commitment);
                None
            }
            Ok(Err(e)) => {
                debug!("Fetch of {} at {:?} failed: {}", signature, commitment.commitment, e);
                None
            }
            Err(_) => {
                debug!("Fetch of {} at {:?} timed out", signature, commitment.commitment);
                None
            }
        }
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.dedup.lock().stats()
    }

    pub fn is_seen(&self, signature: &str) -> bool {
        self.dedup.lock().contains(signature)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::fixtures::{SOL, TxFixture, key};
    use solana_sdk::commitment_config::CommitmentLevel;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source: each signature is visible from some set of levels
    #[derive(Default)]
    pub(crate) struct MockSource {
        pub transactions: Mutex<HashMap<String, (Vec<CommitmentLevel>, TxFixture)>>,
        pub calls: AtomicUsize,
        pub delay_ms: u64,
    }

    impl MockSource {
        pub fn insert(&self, fixture: &TxFixture, levels: Vec<CommitmentLevel>) {
            self.transactions
                .lock()
                .insert(fixture.signature.clone(), (levels, fixture.clone()));
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransactionSource for MockSource {
        async fn get_transaction(
            &self,
            signature: &str,
            commitment: CommitmentConfig,
        ) -> MonitorResult<Option<EncodedConfirmedTransactionWithStatusMeta>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            let transactions = self.transactions.lock();
            Ok(transactions.get(signature).and_then(|(levels, fixture)| {
                levels
                    .contains(&commitment.commitment)
                    .then(|| fixture.encoded())
            }))
        }
    }

    fn fetcher(source: Arc<MockSource>) -> TransactionFetcher {
        TransactionFetcher::new(source, &MonitorConfig::default())
    }

    fn fixture() -> TxFixture {
        TxFixture::new().account(&key(), true, 2 * SOL, SOL)
    }

    #[tokio::test]
    async fn test_fast_level_hit() {
        let source = Arc::new(MockSource::default());
        let fx = fixture();
        source.insert(&fx, vec![CommitmentLevel::Confirmed, CommitmentLevel::Finalized]);

        let fetcher = fetcher(source.clone());
        assert!(fetcher.should_process(&fx.signature));
        let tx = fetcher.fetch(&fx.signature, Priority::High).await.unwrap();
        assert_eq!(tx.signature, fx.signature);
        assert_eq!(source.calls(), 1);
        assert!(fetcher.is_seen(&fx.signature));
    }

    #[tokio::test]
    async fn test_escalates_once_to_strong_level() {
        let source = Arc::new(MockSource::default());
        let fx = fixture();
        source.insert(&fx, vec![CommitmentLevel::Finalized]);

        let fetcher = fetcher(source.clone());
        assert!(fetcher.should_process(&fx.signature));
        assert!(fetcher.fetch(&fx.signature, Priority::Normal).await.is_some());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invisible_signature_dropped_and_retryable() {
        let source = Arc::new(MockSource::default());
        let fetcher = fetcher(source.clone());

        assert!(fetcher.should_process("missing"));
        assert!(fetcher.fetch("missing", Priority::Normal).await.is_none());
        assert_eq!(source.calls(), 2);

        assert!(!fetcher.is_seen("missing"));
        assert!(fetcher.should_process("missing"));
    }

    #[tokio::test]
    async fn test_slow_source_times_out_at_both_levels() {
        let source = Arc::new(MockSource {
            delay_ms: 50,
            ..Default::default()
        });
        let fx = fixture();
        source.insert(&fx, vec![CommitmentLevel::Confirmed, CommitmentLevel::Finalized]);
        let config = MonitorConfig {
            fetch_timeout_ms: 10,
            ..Default::default()
        };
        let fetcher = TransactionFetcher::new(source.clone(), &config);

        assert!(fetcher.should_process(&fx.signature));
        assert!(fetcher.fetch(&fx.signature, Priority::High).await.is_none());
        assert_eq!(source.calls(), 2);
        assert!(!fetcher.is_seen(&fx.signature));
        assert!(fetcher.should_process(&fx.signature));
    }

    #[tokio::test]
    async fn test_failed_transaction_discarded_but_remembered() {
        let source = Arc::new(MockSource::default());
        let fx = fixture().failed();
        source.insert(&fx, vec![CommitmentLevel::Confirmed]);

        let fetcher = fetcher(source);
        assert!(fetcher.should_process(&fx.signature));
        assert!(fetcher.fetch(&fx.signature, Priority::Normal).await.is_none());
        assert!(!fetcher.should_process(&fx.signature));
    }

    #[tokio::test]
    async fn test_duplicate_while_in_flight_is_skipped() {
        let source = Arc::new(MockSource {
            delay_ms: 20,
            ..Default::default()
        });
        let fx = fixture();
        source.insert(&fx, vec![CommitmentLevel::Confirmed]);
        let fetcher = Arc::new(fetcher(source.clone()));

        assert!(fetcher.should_process(&fx.signature));
        let pending = {
            let fetcher = Arc::clone(&fetcher);
            let sig = fx.signature.clone();
            tokio::spawn(async move { fetcher.fetch(&sig, Priority::Normal).await })
        };
        assert!(!fetcher.should_process(&fx.signature));

        assert!(pending.await.unwrap().is_some());
        assert_eq!(source.calls(), 1);
        assert_eq!(fetcher.dedup_stats().skipped, 1);
    }
}
