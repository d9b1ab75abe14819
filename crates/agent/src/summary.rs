//! Final summary for loops that ended without a usable answer.

use threadscout_core::message::{Conversation, Message};
use threadscout_core::provider::{Provider, ProviderRequest};
use tracing::{error, info, warn};

use crate::prompt::{FALLBACK_ANSWER, SUMMARY_SYSTEM_PROMPT, summary_instruction};

pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 4096;

/// Asks the model for a tool-free answer from the gathered history.
#[derive(Debug, Clone)]
pub struct SummaryGenerator {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl SummaryGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Append the summary instruction to `conversation` and return the
    /// model's answer. Never fails: any problem yields [`FALLBACK_ANSWER`].
    pub async fn summarize(&self, provider: &dyn Provider, conversation: &mut Conversation) -> String {
        conversation.push(Message::user(summary_instruction()));

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: conversation.messages.clone(),
            system: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            tools: Vec::new(),
        };

        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Requesting final summary"
        );

        match provider.complete(request).await {
            Ok(response) => {
                let text = response.text();
                if text.trim().is_empty() {
                    warn!("Summary response had no text, using fallback answer");
                    return FALLBACK_ANSWER.to_string();
                }
                info!(chars = text.chars().count(), "Summary generated");
                text
            }
            Err(e) => {
                error!(error = %e, "Summary request failed, using fallback answer");
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}
