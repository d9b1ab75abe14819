//! End-to-end tests for the ThreadScout question-answering pipeline.
//!
//! These exercise the path from a Slack question to the posted answer:
//! prompt building, the model/tool loop, result shaping, source collection,
//! retry handling and final formatting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use threadscout_agent::{AnswerLoop, CheckOutcome, Monitor, QuestionAnswerer, RequestRetrier, SummaryGenerator, Termination};
use threadscout_core::channel::{AnswerSink, ThreadContext, ThreadMessage, ThreadSource};
use threadscout_core::error::{ChannelError, Error, ProviderError, ToolError};
use threadscout_core::message::{ContentBlock, Message, MessageContent, Role};
use threadscout_core::provider::{Provider, ProviderRequest, ProviderResponse, StopReason};
use threadscout_core::tool::{Backend, BackendRegistry, BackendResponse, FunctionSpec, ParamKind, ParamSpec};
use threadscout_tools::ToolDispatcher;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted outcomes in sequence and records every request.
struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(outcomes: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ProviderError::Network("ScriptedProvider exhausted".into()))
        })
    }
}

fn text_response(text: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        message: Message::assistant_blocks(vec![ContentBlock::Text { text: text.into() }]),
        stop_reason: StopReason::EndTurn,
        usage: None,
        model: "mock-model".into(),
    })
}

fn tool_response(id: &str, name: &str, input: Value) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        message: Message::assistant_blocks(vec![
            ContentBlock::Text {
                text: "Let me search.".into(),
            },
            ContentBlock::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            },
        ]),
        stop_reason: StopReason::ToolUse,
        usage: None,
        model: "mock-model".into(),
    })
}

fn rate_limited() -> Result<ProviderResponse, ProviderError> {
    Err(ProviderError::RateLimited {
        message: "rate_limit_error: Number of requests has exceeded your rate limit".into(),
    })
}

// ── Mock back-ends ───────────────────────────────────────────────────────

/// `faq_search(query)` returning canned hits.
#[derive(Default)]
struct FaqBackend {
    calls: Mutex<Vec<Vec<Value>>>,
}

#[async_trait::async_trait]
impl Backend for FaqBackend {
    fn platform(&self) -> &str {
        "faq"
    }

    fn functions(&self) -> Vec<FunctionSpec> {
        vec![FunctionSpec {
            name: "search",
            description: "Search the FAQ",
            params: vec![ParamSpec::required("query", ParamKind::String, "Search words")],
        }]
    }

    fn usage_context(&self) -> Vec<String> {
        vec!["Basic specifications and procedures.".into()]
    }

    async fn invoke(&self, function: &str, args: Vec<Value>) -> Result<BackendResponse, ToolError> {
        assert_eq!(function, "search");
        self.calls.lock().unwrap().push(args);
        Ok(BackendResponse::success(json!({
            "matches": [
                {"text": "Use the account portal.", "context": "How do I reset my password?", "score": 0.93}
            ]
        })))
    }
}

/// `slack_getThreadMessages(messageUrl)`.
struct ThreadBackend;

#[async_trait::async_trait]
impl Backend for ThreadBackend {
    fn platform(&self) -> &str {
        "slack"
    }

    fn functions(&self) -> Vec<FunctionSpec> {
        vec![FunctionSpec {
            name: "getThreadMessages",
            description: "Fetch a thread",
            params: vec![ParamSpec::required("messageUrl", ParamKind::String, "Permalink")],
        }]
    }

    async fn invoke(&self, _function: &str, args: Vec<Value>) -> Result<BackendResponse, ToolError> {
        let url = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(BackendResponse::success(json!({
            "channel": "C0THREAD",
            "messages": [{"ts": "1700000000.000100", "text": "original report"}],
            "threadUrl": url,
        })))
    }
}

// ── Mock channel ─────────────────────────────────────────────────────────

/// Thread source and answer sink backed by memory.
struct MemoryChannel {
    message: ThreadMessage,
    history: Vec<ThreadMessage>,
    posts: Mutex<Vec<(String, String)>>,
}

impl MemoryChannel {
    fn new(text: &str) -> Arc<Self> {
        let message = ThreadMessage {
            ts: "1759736875.617839".into(),
            text: text.into(),
            user: Some("U0ASKER".into()),
            ..Default::default()
        };
        Arc::new(Self {
            history: vec![message.clone()],
            message,
            posts: Mutex::new(Vec::new()),
        })
    }

    fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ThreadSource for MemoryChannel {
    async fn fetch_message(&self, _message_url: &str) -> Result<ThreadMessage, ChannelError> {
        Ok(self.message.clone())
    }

    async fn thread_context(&self, _channel_id: &str, message: &ThreadMessage) -> Result<ThreadContext, ChannelError> {
        Ok(ThreadContext {
            question: message.text.clone(),
            messages: self.history.clone(),
        })
    }
}

#[async_trait::async_trait]
impl AnswerSink for MemoryChannel {
    async fn post_answer(&self, channel_id: &str, _message: &ThreadMessage, text: &str) -> Result<(), ChannelError> {
        self.posts.lock().unwrap().push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn dispatcher(faq: Arc<FaqBackend>) -> Arc<ToolDispatcher> {
    let registry = BackendRegistry::new().with(faq).with(Arc::new(ThreadBackend));
    Arc::new(ToolDispatcher::new(registry).unwrap())
}

fn answerer(provider: Arc<ScriptedProvider>, faq: Arc<FaqBackend>, channel: Arc<MemoryChannel>) -> QuestionAnswerer {
    let answer_loop = AnswerLoop::new(provider, dispatcher(faq), "mock-model");
    QuestionAnswerer::new(channel.clone(), channel, answer_loop, SummaryGenerator::new("mock-model"))
}

fn blocks(message: &Message) -> &[ContentBlock] {
    match &message.content {
        MessageContent::Blocks(blocks) => blocks,
        MessageContent::Text(_) => &[],
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_permalink_question_asks_model_to_fetch_thread() {
    let provider = ScriptedProvider::new(vec![text_response("Checked.")]);
    let channel = MemoryChannel::new(
        "Can someone look at <https://acme.slack.com/archives/C017U6EBKQS/p1759736875617839>?",
    );
    let qa = answerer(provider.clone(), Arc::new(FaqBackend::default()), channel.clone());

    qa.answer("C017U6EBKQS", &channel.message).await.unwrap();

    let first = &provider.requests()[0];
    let prompt = first.messages[0].text();
    assert!(prompt.contains("slack_getThreadMessages"));
    assert!(prompt.contains("https://acme.slack.com/archives/C017U6EBKQS/p1759736875617839"));
    assert!(prompt.contains("- [faq] Basic specifications and procedures."));
    let names: Vec<&str> = first.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["faq_search", "slack_getThreadMessages"]);
}

#[tokio::test]
async fn e2e_tool_call_routes_positionally_and_continues() {
    let provider = ScriptedProvider::new(vec![
        tool_response("toolu_01", "faq_search", json!({"query": "x"})),
        text_response("Use the account portal."),
    ]);
    let faq = Arc::new(FaqBackend::default());
    let channel = MemoryChannel::new("How do I reset my password?");
    let qa = answerer(provider.clone(), faq.clone(), channel.clone());

    let answer = qa.answer("C01", &channel.message).await.unwrap();

    assert_eq!(*faq.calls.lock().unwrap(), vec![vec![json!("x")]]);
    assert_eq!(answer, "Use the account portal.");

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    // user prompt, assistant tool_use turn, user tool_result turn
    let second = &requests[1].messages;
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].role, Role::Assistant);
    assert_eq!(second[2].role, Role::User);
    match &blocks(&second[2])[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "toolu_01");
            assert!(!is_error);
            assert!(content.contains("Use the account portal."));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_first_response_is_final_answer() {
    let provider = ScriptedProvider::new(vec![text_response("It is in the FAQ.")]);
    let faq = Arc::new(FaqBackend::default());
    let answer_loop = AnswerLoop::new(provider.clone(), dispatcher(faq), "mock-model");
    let tools = answer_loop.tool_definitions();
    let context = ThreadContext {
        question: "Where is the FAQ?".into(),
        messages: vec![],
    };

    let outcome = answer_loop.run(&context, &tools).await.unwrap();

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.termination, Termination::EndTurn);
    assert_eq!(outcome.answer.as_deref(), Some("It is in the FAQ."));
    assert!(outcome.sources.is_empty());
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn e2e_rate_limit_exhaustion_is_fatal() {
    let provider = ScriptedProvider::new((0..5).map(|_| rate_limited()).collect());
    let channel = MemoryChannel::new("Anything?");
    let answer_loop = AnswerLoop::new(provider.clone(), dispatcher(Arc::new(FaqBackend::default())), "mock-model")
        .with_retrier(RequestRetrier::new(5, Duration::from_secs(30)));
    let qa = QuestionAnswerer::new(channel.clone(), channel.clone(), answer_loop, SummaryGenerator::new("mock-model"));

    let err = qa.answer("C01", &channel.message).await.unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 5, .. }));
    assert!(err.to_string().contains("5 attempts"));
    assert_eq!(provider.requests().len(), 5);

    // Only the apology reached the thread
    let posts = channel.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.starts_with("Sorry, an error occurred"));
}

#[tokio::test]
async fn e2e_chat_sources_are_cited() {
    let url = "https://acme.slack.com/archives/C0THREAD/p1700000000000100";
    let provider = ScriptedProvider::new(vec![
        tool_response("toolu_01", "slack_getThreadMessages", json!({"messageUrl": url})),
        text_response("The original report describes it."),
    ]);
    let channel = MemoryChannel::new("What happened?");
    let qa = answerer(provider, Arc::new(FaqBackend::default()), channel.clone());

    let answer = qa.answer("C01", &channel.message).await.unwrap();

    assert_eq!(
        answer,
        format!("The original report describes it.\n\n---\n*Sources:*\n• {url}\n")
    );
    assert_eq!(channel.posts()[0].1, answer);
}

#[tokio::test]
async fn e2e_repetition_falls_back_to_summary() {
    let provider = ScriptedProvider::new(vec![
        tool_response("toolu_01", "faq_search", json!({"query": "vpn"})),
        tool_response("toolu_02", "faq_search", json!({"query": "vpn"})),
        text_response("*VPN*\n• Use the portal."),
    ]);
    let faq = Arc::new(FaqBackend::default());
    let channel = MemoryChannel::new("VPN setup?");
    let qa = answerer(provider.clone(), faq.clone(), channel.clone());

    let answer = qa.answer("C01", &channel.message).await.unwrap();

    assert_eq!(answer, "*VPN*\n• Use the portal.");
    assert_eq!(faq.calls.lock().unwrap().len(), 1);

    let summary_request = provider.requests().pop().unwrap();
    assert!(summary_request.tools.is_empty());
    assert_eq!(summary_request.max_tokens, Some(4096));
}

#[tokio::test]
async fn e2e_monitor_answers_in_url_channel() {
    let provider = ScriptedProvider::new(vec![text_response("Done.")]);
    let channel = MemoryChannel::new("Is the build green?");
    let qa = answerer(provider, Arc::new(FaqBackend::default()), channel.clone());
    let monitor = Monitor::new(channel.clone(), qa);

    let outcome = monitor
        .check_by_url("https://acme.slack.com/archives/C017U6EBKQS/p1759736875617839")
        .await;

    assert_eq!(outcome, CheckOutcome::Answered);
    assert_eq!(channel.posts(), vec![("C017U6EBKQS".to_string(), "Done.".to_string())]);
}
