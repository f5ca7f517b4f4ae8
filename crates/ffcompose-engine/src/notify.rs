//! Webhook completion notifications.

use std::time::Duration;

use ffcompose_models::WebhookPayload;
use tracing::{debug, warn};

use crate::error::NotifyError;

/// Dispatcher for job completion webhooks.
///
/// Delivery is best-effort: transport errors and non-2xx responses are
/// retried with exponential backoff a bounded number of times, then logged.
/// The notification outcome never changes job state.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
    request_timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(max_retries: u32, base_delay: Duration, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_retries,
            base_delay,
            request_timeout,
        }
    }

    /// Deliver a terminal payload, logging any failure instead of
    /// escalating it.
    pub async fn dispatch(&self, endpoint: &str, payload: &WebhookPayload) {
        match self.deliver(endpoint, payload).await {
            Ok(()) => {
                debug!(task_id = %payload.task_id, endpoint, "webhook delivered");
            }
            Err(e) => {
                warn!(task_id = %payload.task_id, error = %e, "webhook delivery failed");
            }
        }
    }

    /// Deliver a payload, retrying with exponential backoff.
    pub async fn deliver(
        &self,
        endpoint: &str,
        payload: &WebhookPayload,
    ) -> Result<(), NotifyError> {
        let mut attempt = 0u32;
        loop {
            let outcome = self
                .client
                .post(endpoint)
                .timeout(self.request_timeout)
                .json(payload)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match outcome {
                Ok(_) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "webhook attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(NotifyError::DeliveryFailed {
                        endpoint: endpoint.to_string(),
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Caps at 32x the base delay.
        let factor = 2u32.saturating_pow(attempt.min(5));
        self.base_delay.saturating_mul(factor)
    }
}
