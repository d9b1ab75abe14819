//! Channel traits: where questions come from and where answers go.
//!
//! A [`ThreadSource`] resolves a chat message and the thread around it; an
//! [`AnswerSink`] delivers the final answer (or an apology) back to that
//! thread. The agent only sees these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ChannelError;

/// A chat message as seen by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Platform timestamp, doubles as message id
    pub ts: String,

    #[serde(default)]
    pub text: String,

    /// Parent timestamp when the message lives in a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Platform subtype (e.g. "tombstone" for deleted messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl ThreadMessage {
    /// Timestamp of the thread this message belongs to.
    pub fn thread_root(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    pub fn is_deleted(&self) -> bool {
        self.subtype.as_deref() == Some("tombstone")
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Read-only snapshot of the question and its thread, captured before the loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadContext {
    /// The question text
    pub question: String,

    /// Thread messages in chronological order (may include the question)
    pub messages: Vec<ThreadMessage>,
}

/// Resolves questions and their surrounding threads.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Fetch a single message from its permalink.
    async fn fetch_message(&self, message_url: &str) -> Result<ThreadMessage, ChannelError>;

    /// Capture the thread around `message`.
    async fn thread_context(
        &self,
        channel_id: &str,
        message: &ThreadMessage,
    ) -> Result<ThreadContext, ChannelError>;
}

/// Delivers answers back to where the question was asked.
#[async_trait]
pub trait AnswerSink: Send + Sync {
    /// Post `text` as a reply in the question's thread.
    async fn post_answer(
        &self,
        channel_id: &str,
        message: &ThreadMessage,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Post an error notice. Delivery failures are logged and swallowed.
    async fn post_error(&self, channel_id: &str, message: &ThreadMessage, text: &str) {
        if let Err(e) = self.post_answer(channel_id, message, text).await {
            warn!(channel = %channel_id, error = %e, "Failed to post error notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn thread_root_prefers_parent() {
        let top = ThreadMessage {
            ts: "1.1".into(),
            text: "question".into(),
            ..Default::default()
        };
        assert_eq!(top.thread_root(), "1.1");

        let reply = ThreadMessage {
            thread_ts: Some("0.9".into()),
            ..top.clone()
        };
        assert_eq!(reply.thread_root(), "0.9");
    }

    #[test]
    fn deleted_and_blank_detection() {
        let msg = ThreadMessage {
            ts: "1".into(),
            text: "  \n".into(),
            subtype: Some("tombstone".into()),
            ..Default::default()
        };
        assert!(msg.is_deleted());
        assert!(msg.is_blank());
    }

    struct FailingSink {
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl AnswerSink for FailingSink {
        async fn post_answer(&self, channel_id: &str, _: &ThreadMessage, _: &str) -> Result<(), ChannelError> {
            *self.attempts.lock().unwrap() += 1;
            Err(ChannelError::DeliveryFailed {
                channel: channel_id.into(),
                reason: "offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn post_error_swallows_delivery_failure() {
        let sink = FailingSink { attempts: Mutex::new(0) };
        sink.post_error("C1", &ThreadMessage::default(), "sorry").await;
        assert_eq!(*sink.attempts.lock().unwrap(), 1);
    }
}
