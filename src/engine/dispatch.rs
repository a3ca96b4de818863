//! Push dispatch with multicast chunking.
//!
//! Sends one rendered message to a set of addresses, splitting the set
//! into chunks the gateway's multicast ceiling allows. Per-address
//! failures are collected, never raised: one dead token must not block
//! the rest of a dinner party. Only a gateway-level failure surfaces
//! as an error, which callers treat as "retry the event next tick".

use std::sync::Arc;

use crate::error::{DispatchError, Result};
use crate::push::{PushAddress, PushGateway, PushMessage, SendOutcome};

/// Per-address results of dispatching one message.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Addresses the gateway accepted.
    pub delivered: Vec<PushAddress>,
    /// Addresses that failed for any reason, stale tokens included.
    pub failed: Vec<PushAddress>,
    /// Subset of `failed`: tokens the gateway reported as no longer
    /// registered. These should be cleared from their user records.
    pub stale: Vec<PushAddress>,
}

/// Dispatches rendered messages through the push gateway.
pub struct Dispatcher {
    gateway: Arc<dyn PushGateway>,
    multicast_limit: usize,
}

impl Dispatcher {
    /// Create a dispatcher that chunks multicasts at `multicast_limit`.
    pub fn new(gateway: Arc<dyn PushGateway>, multicast_limit: usize) -> Self {
        Self {
            gateway,
            multicast_limit: multicast_limit.max(1),
        }
    }

    /// Send `message` to every address, in chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway itself fails (unreachable,
    /// non-success status, malformed response). Addresses in chunks
    /// dispatched before the failure have already received the message.
    pub async fn dispatch(
        &self,
        event_id: &str,
        message: &PushMessage,
        addresses: &[PushAddress],
    ) -> Result<DispatchOutcome> {
        let mut outcome = DispatchOutcome::default();

        for chunk in addresses.chunks(self.multicast_limit) {
            let report = self.gateway.send_multicast(chunk, message).await?;
            // Every address must come back with an outcome; a short
            // report is a malformed response like any other.
            if report.results.len() != chunk.len() {
                return Err(DispatchError::Push(format!(
                    "gateway report covered {} of {} addresses",
                    report.results.len(),
                    chunk.len()
                )));
            }
            for (address, result) in chunk.iter().zip(report.results) {
                match result {
                    SendOutcome::Delivered => outcome.delivered.push(address.clone()),
                    SendOutcome::Unregistered => {
                        outcome.stale.push(address.clone());
                        outcome.failed.push(address.clone());
                    }
                    SendOutcome::Failed(reason) => {
                        tracing::warn!(
                            event = %event_id,
                            reason = %reason,
                            "push delivery failed for one address"
                        );
                        outcome.failed.push(address.clone());
                    }
                }
            }
        }

        tracing::debug!(
            event = %event_id,
            delivered = outcome.delivered.len(),
            failed = outcome.failed.len(),
            stale = outcome.stale.len(),
            "dispatch complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::DispatchError;
    use crate::push::MulticastReport;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Gateway scripted by address prefix: `stale-*` comes back
    /// unregistered, `flaky-*` fails, anything else is delivered.
    #[derive(Default)]
    struct ScriptedGateway {
        chunk_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl PushGateway for ScriptedGateway {
        async fn send(&self, address: &str, _message: &PushMessage) -> Result<SendOutcome> {
            Ok(outcome_for(address))
        }

        async fn send_multicast(
            &self,
            addresses: &[PushAddress],
            _message: &PushMessage,
        ) -> Result<MulticastReport> {
            self.chunk_sizes.lock().await.push(addresses.len());
            Ok(MulticastReport {
                results: addresses.iter().map(|a| outcome_for(a)).collect(),
            })
        }
    }

    fn outcome_for(address: &str) -> SendOutcome {
        if address.starts_with("stale") {
            SendOutcome::Unregistered
        } else if address.starts_with("flaky") {
            SendOutcome::Failed("Unavailable".to_owned())
        } else {
            SendOutcome::Delivered
        }
    }

    struct DownGateway;

    #[async_trait]
    impl PushGateway for DownGateway {
        async fn send(&self, _address: &str, _message: &PushMessage) -> Result<SendOutcome> {
            Err(DispatchError::Push("gateway unreachable".to_owned()))
        }

        async fn send_multicast(
            &self,
            _addresses: &[PushAddress],
            _message: &PushMessage,
        ) -> Result<MulticastReport> {
            Err(DispatchError::Push("gateway unreachable".to_owned()))
        }
    }

    /// Gateway that loses the last outcome of every report.
    struct ShortReportGateway;

    #[async_trait]
    impl PushGateway for ShortReportGateway {
        async fn send(&self, _address: &str, _message: &PushMessage) -> Result<SendOutcome> {
            Ok(SendOutcome::Delivered)
        }

        async fn send_multicast(
            &self,
            addresses: &[PushAddress],
            _message: &PushMessage,
        ) -> Result<MulticastReport> {
            let mut results = vec![SendOutcome::Delivered; addresses.len()];
            results.pop();
            Ok(MulticastReport { results })
        }
    }

    fn message() -> PushMessage {
        PushMessage {
            title: "Dinner tomorrow".to_owned(),
            body: "See you there".to_owned(),
        }
    }

    #[tokio::test]
    async fn dispatch_chunks_at_the_multicast_limit() {
        let gateway = Arc::new(ScriptedGateway::default());
        let dispatcher = Dispatcher::new(gateway.clone(), 2);

        let addresses: Vec<PushAddress> = (0..5).map(|i| format!("token-{i}")).collect();
        let outcome = dispatcher
            .dispatch("evt-1", &message(), &addresses)
            .await
            .unwrap();

        assert_eq!(outcome.delivered.len(), 5);
        assert_eq!(*gateway.chunk_sizes.lock().await, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn per_address_failures_are_collected_not_raised() {
        let dispatcher = Dispatcher::new(Arc::new(ScriptedGateway::default()), 10);

        let addresses = vec![
            "token-1".to_owned(),
            "stale-2".to_owned(),
            "flaky-3".to_owned(),
            "token-4".to_owned(),
        ];
        let outcome = dispatcher
            .dispatch("evt-1", &message(), &addresses)
            .await
            .unwrap();

        assert_eq!(outcome.delivered, vec!["token-1", "token-4"]);
        assert_eq!(outcome.failed, vec!["stale-2", "flaky-3"]);
        assert_eq!(outcome.stale, vec!["stale-2"]);
    }

    #[tokio::test]
    async fn gateway_failure_propagates() {
        let dispatcher = Dispatcher::new(Arc::new(DownGateway), 10);
        let err = dispatcher
            .dispatch("evt-1", &message(), &["token-1".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Push(_)));
    }

    #[tokio::test]
    async fn report_covering_fewer_addresses_than_sent_is_rejected() {
        let dispatcher = Dispatcher::new(Arc::new(ShortReportGateway), 10);

        let addresses = vec!["token-1".to_owned(), "token-2".to_owned()];
        let err = dispatcher
            .dispatch("evt-1", &message(), &addresses)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("1 of 2"));
    }

    #[tokio::test]
    async fn empty_address_list_makes_no_gateway_calls() {
        let gateway = Arc::new(ScriptedGateway::default());
        let dispatcher = Dispatcher::new(gateway.clone(), 10);

        let outcome = dispatcher.dispatch("evt-1", &message(), &[]).await.unwrap();
        assert!(outcome.delivered.is_empty());
        assert!(gateway.chunk_sizes.lock().await.is_empty());
    }
}
