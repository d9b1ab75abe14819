//! Slack channel adapter.
//!
//! Resolves message permalinks through `conversations.history`, captures the
//! thread with `conversations.replies`, and replies with `chat.postMessage`.

use async_trait::async_trait;
use serde_json::Value;
use threadscout_core::channel::{AnswerSink, ThreadContext, ThreadMessage, ThreadSource};
use threadscout_core::error::ChannelError;
use threadscout_tools::backends::{Permalink, SlackApi, SlackApiError};
use tracing::{debug, info, warn};

/// Slack as the question source and answer destination.
#[derive(Debug, Clone)]
pub struct SlackChannel {
    api: SlackApi,
}

impl SlackChannel {
    pub fn new(api: SlackApi) -> Self {
        Self { api }
    }

    /// The single message at `ts`, if the history holds one.
    async fn message_at(&self, channel: &str, ts: &str) -> Result<Option<ThreadMessage>, SlackApiError> {
        let messages = self.api.history(channel, &exact_ts_filters(ts)).await?;
        Ok(messages.into_iter().next().and_then(|m| to_thread_message(m, channel)))
    }
}

/// History filters selecting exactly the message at `ts`.
fn exact_ts_filters(ts: &str) -> Vec<(String, String)> {
    vec![
        ("latest".to_string(), ts.to_string()),
        ("oldest".to_string(), ts.to_string()),
        ("inclusive".to_string(), "true".to_string()),
        ("limit".to_string(), "1".to_string()),
    ]
}

/// Convert a raw Slack message; entries without `ts` are dropped.
fn to_thread_message(raw: Value, channel: &str) -> Option<ThreadMessage> {
    let mut message: ThreadMessage = serde_json::from_value(raw).ok()?;
    if message.ts.is_empty() {
        return None;
    }
    message.channel.get_or_insert_with(|| channel.to_string());
    Some(message)
}

fn api_failed(e: SlackApiError) -> ChannelError {
    let method = match &e {
        SlackApiError::Http { method, .. } | SlackApiError::Api { method, .. } => method.clone(),
    };
    ChannelError::ApiFailed {
        method,
        reason: e.to_string(),
    }
}

#[async_trait]
impl ThreadSource for SlackChannel {
    async fn fetch_message(&self, message_url: &str) -> Result<ThreadMessage, ChannelError> {
        let link = Permalink::parse(message_url).ok_or_else(|| ChannelError::InvalidUrl(message_url.to_string()))?;
        debug!(channel = %link.channel, ts = %link.ts, thread_ts = ?link.thread_ts, "Parsed permalink");

        if let Some(message) = self.message_at(&link.channel, &link.ts).await.map_err(api_failed)? {
            return Ok(message);
        }

        // Thread replies are not in the channel history; try the parent
        if let Some(thread_ts) = &link.thread_ts {
            info!(thread_ts = %thread_ts, "Message not in history, retrying with thread_ts");
            match self.message_at(&link.channel, thread_ts).await {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Retry with thread_ts failed"),
            }
        }

        Err(ChannelError::MessageNotFound(format!(
            "ts={}, thread_ts={}",
            link.ts,
            link.thread_ts.as_deref().unwrap_or("none")
        )))
    }

    async fn thread_context(&self, channel_id: &str, message: &ThreadMessage) -> Result<ThreadContext, ChannelError> {
        let messages = match self.api.replies(channel_id, message.thread_root()).await {
            Ok(raw) => raw
                .into_iter()
                .filter_map(|m| to_thread_message(m, channel_id))
                .collect(),
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "Failed to load thread, continuing without history");
                Vec::new()
            }
        };
        debug!(channel = %channel_id, messages = messages.len(), "Thread context captured");

        Ok(ThreadContext {
            question: message.text.clone(),
            messages,
        })
    }
}

#[async_trait]
impl AnswerSink for SlackChannel {
    async fn post_answer(&self, channel_id: &str, message: &ThreadMessage, text: &str) -> Result<(), ChannelError> {
        self.api
            .post_message(channel_id, text, Some(message.thread_root()))
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: channel_id.to_string(),
                reason: e.to_string(),
            })?;
        info!(channel = %channel_id, thread_ts = %message.thread_root(), chars = text.chars().count(), "Posted reply");
        Ok(())
    }
}
