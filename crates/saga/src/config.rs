use std::time::Duration;

/// Timeouts and retry policy of the checkout coordinator.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Upper bound on every call to the ledger, the cart or the payment gate.
    pub rpc_timeout: Duration,

    /// Confirm attempts per line after a payment is approved.
    pub confirm_max_attempts: u32,

    /// Base delay between confirm attempts; grows linearly per attempt.
    pub confirm_retry_backoff: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_millis(2000),
            confirm_max_attempts: 5,
            confirm_retry_backoff: Duration::from_millis(200),
        }
    }
}
