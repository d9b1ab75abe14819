//! Domain events as log lines.

use threadscout_core::event::EventBus;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Log every event published on `bus` until all publishers are gone.
pub fn spawn_logger(bus: &EventBus) -> JoinHandle<usize> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let mut logged = 0;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
                    debug!(event = event.name(), data = %data, "Domain event");
                    logged += 1;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
        logged
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use threadscout_core::event::DomainEvent;

    #[tokio::test]
    async fn logs_until_bus_is_dropped() {
        let bus = EventBus::new(16);
        let logger = spawn_logger(&bus);

        bus.publish(DomainEvent::ModelRetry {
            attempt: 2,
            max_attempts: 5,
            wait_ms: 30_000,
            reason: "rate limited".into(),
            timestamp: Utc::now(),
        });
        bus.publish(DomainEvent::ErrorOccurred {
            context: "answer loop iteration 2".into(),
            error_message: "gave up".into(),
            timestamp: Utc::now(),
        });
        drop(bus);

        assert_eq!(logger.await.unwrap(), 2);
    }
}
