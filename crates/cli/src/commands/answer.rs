//! `threadscout answer`: Answer one Slack question by permalink.

use std::sync::Arc;
use std::time::Duration;

use threadscout_agent::{AnswerLoop, CheckOutcome, Monitor, QuestionAnswerer, RequestRetrier, SummaryGenerator};
use threadscout_channels::SlackChannel;
use threadscout_config::AppConfig;
use threadscout_core::event::EventBus;
use threadscout_core::tool::BackendRegistry;
use threadscout_tools::backends::{RedmineBackend, SlackApi, SlackBackend};
use threadscout_tools::{SourceCollector, ToolDispatcher};
use tracing::info;

pub async fn run(message_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(slack_token) = config.slack.token.clone().filter(|t| !t.is_empty()) else {
        eprintln!();
        eprintln!("  ERROR: No Slack token configured!");
        eprintln!("  Set SLACK_USER_OAUTH_TOKEN or [slack].token in");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No Slack token found. See above for setup instructions.".into());
    };

    let provider = threadscout_providers::build_from_config(&config)?;
    let slack_api = SlackApi::new(&config.slack.api_url, slack_token);

    // Back-ends
    let mut slack_backend = SlackBackend::new(slack_api.clone());
    if let Some(url) = &config.slack.workspace_url {
        slack_backend = slack_backend.with_workspace_url(url);
    }
    let mut registry = BackendRegistry::new().with(Arc::new(slack_backend));
    let mut collector = SourceCollector::default();
    if let (Some(base_url), Some(api_key)) = (&config.redmine.base_url, &config.redmine.api_key) {
        registry.register(Arc::new(RedmineBackend::new(base_url, api_key)));
        collector = SourceCollector::new(base_url);
    }
    let dispatcher = Arc::new(ToolDispatcher::new(registry)?);
    info!(
        platforms = ?dispatcher.registry().platforms(),
        model = %config.model,
        "Back-ends ready"
    );

    let event_bus = Arc::new(EventBus::default());
    let event_logger = crate::events::spawn_logger(&event_bus);

    let retrier = RequestRetrier::new(
        config.agent.max_retries,
        Duration::from_secs(config.agent.retry_base_delay_secs),
    )
    .with_event_bus(event_bus.clone());
    let answer_loop = AnswerLoop::new(provider, dispatcher, &config.model)
        .with_retrier(retrier)
        .with_event_bus(event_bus.clone())
        .with_source_collector(collector)
        .with_max_iterations(config.agent.max_iterations)
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature)
        .with_large_result_chars(config.agent.large_result_warn_chars);
    let summary = SummaryGenerator::new(&config.model)
        .with_max_tokens(config.agent.summary_max_tokens)
        .with_temperature(config.temperature);

    let channel = Arc::new(SlackChannel::new(slack_api));
    let answerer = QuestionAnswerer::new(channel.clone(), channel.clone(), answer_loop, summary);
    let mut monitor = Monitor::new(channel, answerer);
    if let Some(default_channel) = &config.slack.default_channel {
        monitor = monitor.with_default_channel(default_channel);
    }

    let outcome = monitor.check_by_url(message_url).await;

    // Closing the bus lets the logger drain and exit
    drop(monitor);
    drop(event_bus);
    let _ = event_logger.await;

    match outcome {
        CheckOutcome::Answered => {
            println!("✅ Answer posted");
            Ok(())
        }
        CheckOutcome::Skipped { ts, reason } => {
            println!("⏭️  Skipped message {ts}: {reason}");
            Ok(())
        }
        CheckOutcome::Failed(reason) => Err(format!("Could not answer {message_url}: {reason}").into()),
    }
}
