//! Model call retries with linear backoff.
//!
//! Failures are classified by HTTP status when the provider reports one, and
//! by their display text otherwise: a `400` aborts at once, a `429` or
//! "too many tokens" waits `base × attempt` and tries again, and anything
//! else aborts.

use std::sync::Arc;
use std::time::Duration;

use threadscout_core::error::{Error, ProviderError};
use threadscout_core::event::{DomainEvent, EventBus};
use threadscout_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::{error, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(30);

/// How a model failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Malformed request; `billing` marks credit or quota exhaustion.
    Rejected { billing: bool },
    /// Rate limiting or token pressure; worth waiting for.
    Transient,
    /// Anything else.
    Unclassified,
}

impl FailureClass {
    /// Classify a provider failure. Response bodies may contain any digits,
    /// so a known status always wins over the text.
    pub fn classify(err: &ProviderError) -> Self {
        let message = err.to_string();
        match err.status_code() {
            Some(400) => Self::Rejected {
                billing: mentions_billing(&message),
            },
            Some(429) => Self::Transient,
            Some(_) if mentions_token_pressure(&message) => Self::Transient,
            Some(_) => Self::Unclassified,
            None => Self::of(&message),
        }
    }

    /// Classify from display text alone.
    pub fn of(message: &str) -> Self {
        if message.contains("400") {
            return Self::Rejected {
                billing: mentions_billing(message),
            };
        }
        if message.contains("429") || mentions_token_pressure(message) {
            return Self::Transient;
        }
        Self::Unclassified
    }
}

fn mentions_billing(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["credit", "insufficient", "balance", "quota"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn mentions_token_pressure(message: &str) -> bool {
    message.to_lowercase().contains("too many tokens")
}

/// Calls a provider, retrying transient failures.
#[derive(Clone)]
pub struct RequestRetrier {
    max_attempts: u32,
    base_delay: Duration,
    event_bus: Option<Arc<EventBus>>,
}

impl Default for RequestRetrier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RequestRetrier {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            event_bus: None,
        }
    }

    /// Publish a `ModelRetry` event before each wait.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Send `request`, making at most `max_attempts` calls.
    pub async fn call(&self, provider: &dyn Provider, request: &ProviderRequest) -> Result<ProviderResponse, Error> {
        let mut attempt = 1;
        loop {
            let err = match provider.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            let message = err.to_string();

            match FailureClass::classify(&err) {
                FailureClass::Rejected { billing } => {
                    if billing {
                        error!(error = %message, "Model request rejected: credit exhausted, check the API key balance");
                    } else {
                        error!(error = %message, "Model request rejected: invalid request parameters");
                    }
                    return Err(Error::ModelRejected(message));
                }
                FailureClass::Unclassified => {
                    error!(error = %message, "Model request failed");
                    return Err(Error::ModelFailed(message));
                }
                FailureClass::Transient if attempt >= self.max_attempts => {
                    error!(attempts = attempt, error = %message, "Model request still rate limited, giving up");
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        message,
                    });
                }
                FailureClass::Transient => {
                    let wait = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        wait_secs = wait.as_secs(),
                        "Rate limit detected, retrying"
                    );
                    self.publish_retry(attempt + 1, wait, &err);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    fn publish_retry(&self, attempt: u32, wait: Duration, err: &ProviderError) {
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ModelRetry {
                attempt,
                max_attempts: self.max_attempts,
                wait_ms: wait.as_millis() as u64,
                reason: err.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
