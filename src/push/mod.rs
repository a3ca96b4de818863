//! Push delivery seam.
//!
//! [`PushGateway`] abstracts the downstream push service so the engine
//! can be tested against scripted gateways. [`FcmGateway`] is the
//! production implementation.

use async_trait::async_trait;

use crate::error::Result;

pub mod fcm;

pub use fcm::FcmGateway;

/// Device push address (a registration token issued by the push service).
pub type PushAddress = String;

/// Rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

/// Delivery outcome for a single address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The gateway accepted the message for this address.
    Delivered,
    /// The address is no longer valid and should be dropped.
    Unregistered,
    /// Delivery failed for another reason (stable gateway error code).
    Failed(String),
}

/// Per-address outcomes of one multicast request, aligned with the
/// input address order.
#[derive(Debug, Clone, Default)]
pub struct MulticastReport {
    pub results: Vec<SendOutcome>,
}

impl MulticastReport {
    /// Number of addresses the gateway accepted.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, SendOutcome::Delivered))
            .count()
    }

    /// Number of addresses that failed, stale tokens included.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.delivered()
    }
}

/// Async push delivery backend.
///
/// An `Err` from either method means the gateway itself was
/// unreachable; per-address problems are reported inside the `Ok`
/// payload so one bad token never hides the rest of a batch.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Deliver to a single address.
    async fn send(&self, address: &str, message: &PushMessage) -> Result<SendOutcome>;

    /// Deliver to a batch of addresses in one request. Callers chunk to
    /// the configured multicast limit; implementations reject oversized
    /// batches outright.
    async fn send_multicast(
        &self,
        addresses: &[PushAddress],
        message: &PushMessage,
    ) -> Result<MulticastReport>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn report_counts_split_delivered_and_failed() {
        let report = MulticastReport {
            results: vec![
                SendOutcome::Delivered,
                SendOutcome::Unregistered,
                SendOutcome::Failed("Unavailable".to_owned()),
                SendOutcome::Delivered,
            ],
        };
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 2);
    }

    #[test]
    fn empty_report_counts_zero() {
        let report = MulticastReport::default();
        assert_eq!(report.delivered(), 0);
        assert_eq!(report.failed(), 0);
    }
}
