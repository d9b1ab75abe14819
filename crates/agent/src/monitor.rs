//! Answering a question identified by its permalink.

use std::sync::Arc;

use threadscout_core::channel::ThreadSource;
use threadscout_tools::backends::Permalink;
use tracing::{error, info};

use crate::answer::QuestionAnswerer;

/// What happened to a checked message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// An answer was posted.
    Answered,
    /// The message was deleted or had no text.
    Skipped { ts: String, reason: &'static str },
    /// Fetching or answering failed; already logged.
    Failed(String),
}

/// Resolves a permalink and hands the message to the answerer.
pub struct Monitor {
    source: Arc<dyn ThreadSource>,
    answerer: QuestionAnswerer,
    default_channel: String,
}

impl Monitor {
    pub fn new(source: Arc<dyn ThreadSource>, answerer: QuestionAnswerer) -> Self {
        Self {
            source,
            answerer,
            default_channel: String::new(),
        }
    }

    /// Channel used when the permalink carries none.
    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }

    /// Fetch the message behind `url` and answer it. Never returns an error.
    pub async fn check_by_url(&self, url: &str) -> CheckOutcome {
        info!(url = %url, "Checking message by URL");

        let channel_id = Permalink::channel_of(url).unwrap_or_else(|| self.default_channel.clone());

        let message = match self.source.fetch_message(url).await {
            Ok(message) => message,
            Err(e) => {
                error!(url = %url, error = %e, "Failed to get message");
                return CheckOutcome::Failed(e.to_string());
            }
        };
        info!(ts = %message.ts, "Found message");

        if message.is_deleted() {
            info!(ts = %message.ts, "Skipping deleted message");
            return CheckOutcome::Skipped {
                ts: message.ts,
                reason: "deleted",
            };
        }
        if message.is_blank() {
            info!(ts = %message.ts, "Skipping message without text");
            return CheckOutcome::Skipped {
                ts: message.ts,
                reason: "no text",
            };
        }

        match self.answerer.answer(&channel_id, &message).await {
            Ok(_) => {
                info!(ts = %message.ts, "Message processed");
                CheckOutcome::Answered
            }
            Err(e) => CheckOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use threadscout_core::channel::{AnswerSink, ThreadContext, ThreadMessage};
    use threadscout_core::error::{ChannelError, ProviderError};
    use threadscout_core::message::Message;
    use threadscout_core::provider::{Provider, ProviderRequest, ProviderResponse, StopReason};
    use threadscout_core::tool::BackendRegistry;
    use threadscout_tools::ToolDispatcher;

    use crate::loop_runner::AnswerLoop;
    use crate::summary::SummaryGenerator;

    struct FixedSource(Option<ThreadMessage>);

    #[async_trait]
    impl ThreadSource for FixedSource {
        async fn fetch_message(&self, _url: &str) -> Result<ThreadMessage, ChannelError> {
            self.0
                .clone()
                .ok_or_else(|| ChannelError::MessageNotFound("ts=1700000000.000100".into()))
        }

        async fn thread_context(&self, _channel_id: &str, message: &ThreadMessage) -> Result<ThreadContext, ChannelError> {
            Ok(ThreadContext {
                question: message.text.clone(),
                messages: vec![],
            })
        }
    }

    #[derive(Default)]
    struct ChannelRecorder {
        channels: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerSink for ChannelRecorder {
        async fn post_answer(&self, channel_id: &str, _message: &ThreadMessage, _text: &str) -> Result<(), ChannelError> {
            self.channels.lock().unwrap().push(channel_id.to_string());
            Ok(())
        }
    }

    struct Answers;

    #[async_trait]
    impl Provider for Answers {
        fn name(&self) -> &str {
            "answers"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant("answer"),
                stop_reason: StopReason::EndTurn,
                usage: None,
                model: "mock".into(),
            })
        }
    }

    fn monitor(message: Option<ThreadMessage>) -> (Monitor, Arc<ChannelRecorder>) {
        let source = Arc::new(FixedSource(message));
        let sink = Arc::new(ChannelRecorder::default());
        let dispatcher = Arc::new(ToolDispatcher::new(BackendRegistry::new()).unwrap());
        let answerer = QuestionAnswerer::new(
            source.clone(),
            sink.clone(),
            AnswerLoop::new(Arc::new(Answers), dispatcher, "mock"),
            SummaryGenerator::new("mock"),
        );
        (Monitor::new(source, answerer).with_default_channel("CDEFAULT"), sink)
    }

    fn message(text: &str, subtype: Option<&str>) -> ThreadMessage {
        ThreadMessage {
            ts: "1700000000.000100".into(),
            text: text.into(),
            subtype: subtype.map(String::from),
            ..Default::default()
        }
    }

    const URL: &str = "https://acme.slack.com/archives/C0123ABC/p1700000000000100";

    #[tokio::test]
    async fn answers_in_permalink_channel() {
        let (monitor, sink) = monitor(Some(message("why?", None)));
        assert_eq!(monitor.check_by_url(URL).await, CheckOutcome::Answered);
        assert_eq!(*sink.channels.lock().unwrap(), vec!["C0123ABC".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_to_default_channel() {
        let (monitor, sink) = monitor(Some(message("why?", None)));
        assert_eq!(monitor.check_by_url("https://acme.example/x").await, CheckOutcome::Answered);
        assert_eq!(*sink.channels.lock().unwrap(), vec!["CDEFAULT".to_string()]);
    }

    #[tokio::test]
    async fn skips_deleted_and_blank_messages() {
        let (deleted, sink) = monitor(Some(message("gone", Some("tombstone"))));
        assert!(matches!(
            deleted.check_by_url(URL).await,
            CheckOutcome::Skipped { reason: "deleted", .. }
        ));

        let (blank, _) = monitor(Some(message("  ", None)));
        assert!(matches!(
            blank.check_by_url(URL).await,
            CheckOutcome::Skipped { reason: "no text", .. }
        ));
        assert!(sink.channels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_not_propagated() {
        let (monitor, _) = monitor(None);
        assert!(matches!(monitor.check_by_url(URL).await, CheckOutcome::Failed(_)));
    }
}
