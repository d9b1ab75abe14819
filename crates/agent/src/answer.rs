//! Answering one question end to end.

use std::sync::Arc;

use threadscout_core::channel::{AnswerSink, ThreadMessage, ThreadSource};
use threadscout_core::error::Result;
use tracing::{error, info};

use crate::loop_runner::AnswerLoop;
use crate::prompt::ERROR_APOLOGY;
use crate::summary::SummaryGenerator;

/// Append the sources section to `answer`; omitted when there are none.
pub fn format_final_answer(answer: &str, sources: &[String]) -> String {
    if sources.is_empty() {
        return answer.to_string();
    }
    let mut out = format!("{answer}\n\n---\n*Sources:*\n");
    for url in sources {
        out.push_str(&format!("• {url}\n"));
    }
    out
}

/// Gathers the thread, runs the loop, and posts the answer.
pub struct QuestionAnswerer {
    source: Arc<dyn ThreadSource>,
    sink: Arc<dyn AnswerSink>,
    answer_loop: AnswerLoop,
    summary: SummaryGenerator,
}

impl QuestionAnswerer {
    pub fn new(
        source: Arc<dyn ThreadSource>,
        sink: Arc<dyn AnswerSink>,
        answer_loop: AnswerLoop,
        summary: SummaryGenerator,
    ) -> Self {
        Self {
            source,
            sink,
            answer_loop,
            summary,
        }
    }

    /// Answer `message` in `channel_id` and return the posted text.
    ///
    /// On failure an apology is posted to the thread and the error returned.
    pub async fn answer(&self, channel_id: &str, message: &ThreadMessage) -> Result<String> {
        match self.try_answer(channel_id, message).await {
            Ok(text) => Ok(text),
            Err(e) => {
                error!(channel = %channel_id, ts = %message.ts, error = %e, "Failed to answer question");
                self.sink.post_error(channel_id, message, ERROR_APOLOGY).await;
                Err(e)
            }
        }
    }

    async fn try_answer(&self, channel_id: &str, message: &ThreadMessage) -> Result<String> {
        info!(channel = %channel_id, ts = %message.ts, "Answering question");

        let context = self.source.thread_context(channel_id, message).await?;
        let tools = self.answer_loop.tool_definitions();
        let mut outcome = self.answer_loop.run(&context, &tools).await?;

        let body = match outcome.answer.take() {
            Some(answer) => answer,
            None => {
                info!(termination = %outcome.termination, "No direct answer, summarizing");
                self.summary
                    .summarize(self.answer_loop.provider(), &mut outcome.conversation)
                    .await
            }
        };

        let text = format_final_answer(&body, &outcome.sources);
        self.sink.post_answer(channel_id, message, &text).await?;
        info!(
            channel = %channel_id,
            iterations = outcome.iterations,
            sources = outcome.sources.len(),
            "Answer posted"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use threadscout_core::channel::ThreadContext;
    use threadscout_core::error::{ChannelError, Error, ProviderError};
    use threadscout_core::message::Message;
    use threadscout_core::provider::{Provider, ProviderRequest, ProviderResponse, StopReason};
    use threadscout_core::tool::BackendRegistry;
    use threadscout_tools::ToolDispatcher;

    use crate::prompt::FALLBACK_ANSWER;

    struct StaticSource;

    #[async_trait]
    impl ThreadSource for StaticSource {
        async fn fetch_message(&self, _url: &str) -> std::result::Result<ThreadMessage, ChannelError> {
            Err(ChannelError::MessageNotFound("unused".into()))
        }

        async fn thread_context(
            &self,
            _channel_id: &str,
            message: &ThreadMessage,
        ) -> std::result::Result<ThreadContext, ChannelError> {
            Ok(ThreadContext {
                question: message.text.clone(),
                messages: vec![message.clone()],
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerSink for RecordingSink {
        async fn post_answer(
            &self,
            _channel_id: &str,
            _message: &ThreadMessage,
            text: &str,
        ) -> std::result::Result<(), ChannelError> {
            self.posts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Replies(Mutex<VecDeque<std::result::Result<ProviderResponse, ProviderError>>>);

    #[async_trait]
    impl Provider for Replies {
        fn name(&self) -> &str {
            "replies"
        }

        async fn complete(&self, _request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
        }
    }

    fn reply(text: &str, stop_reason: StopReason) -> std::result::Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(text),
            stop_reason,
            usage: None,
            model: "mock".into(),
        })
    }

    fn answerer(
        replies: Vec<std::result::Result<ProviderResponse, ProviderError>>,
        max_iterations: u32,
    ) -> (QuestionAnswerer, Arc<RecordingSink>) {
        let provider = Arc::new(Replies(Mutex::new(replies.into())));
        let dispatcher = Arc::new(ToolDispatcher::new(BackendRegistry::new()).unwrap());
        let answer_loop = AnswerLoop::new(provider, dispatcher, "mock").with_max_iterations(max_iterations);
        let sink = Arc::new(RecordingSink::default());
        let answerer = QuestionAnswerer::new(
            Arc::new(StaticSource),
            sink.clone(),
            answer_loop,
            SummaryGenerator::new("mock"),
        );
        (answerer, sink)
    }

    fn question() -> ThreadMessage {
        ThreadMessage {
            ts: "1700000000.000100".into(),
            text: "How do I reset my password?".into(),
            ..Default::default()
        }
    }

    #[test]
    fn sources_section_format() {
        let text = format_final_answer(
            "Use the portal.",
            &["https://a/1".to_string(), "https://b/2".to_string()],
        );
        assert_eq!(text, "Use the portal.\n\n---\n*Sources:*\n• https://a/1\n• https://b/2\n");
        assert_eq!(format_final_answer("Plain.", &[]), "Plain.");
    }

    #[tokio::test]
    async fn direct_answer_is_posted() {
        let (answerer, sink) = answerer(vec![reply("Use the portal.", StopReason::EndTurn)], 10);

        let text = answerer.answer("C01", &question()).await.unwrap();

        assert_eq!(text, "Use the portal.");
        assert_eq!(*sink.posts.lock().unwrap(), vec!["Use the portal.".to_string()]);
    }

    #[tokio::test]
    async fn missing_answer_falls_back_to_summary() {
        let (answerer, sink) = answerer(
            vec![reply("", StopReason::MaxTokens), reply("Summarized.", StopReason::EndTurn)],
            1,
        );

        let text = answerer.answer("C01", &question()).await.unwrap();
        assert_eq!(text, "Summarized.");
        assert_eq!(sink.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_summary_posts_fallback() {
        let (answerer, _) = answerer(vec![reply("", StopReason::MaxTokens)], 1);
        let text = answerer.answer("C01", &question()).await.unwrap();
        assert_eq!(text, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn model_error_posts_apology() {
        let (answerer, sink) = answerer(
            vec![Err(ProviderError::ApiError {
                status_code: 400,
                message: "bad".into(),
            })],
            10,
        );

        let err = answerer.answer("C01", &question()).await.unwrap_err();

        assert!(matches!(err, Error::ModelRejected(_)));
        assert_eq!(*sink.posts.lock().unwrap(), vec![ERROR_APOLOGY.to_string()]);
    }
}
