//! Chat platform adapters for ThreadScout.
//!
//! A channel implements both sides of the conversation with the asker:
//! [`ThreadSource`](threadscout_core::ThreadSource) to read the question and
//! its thread, [`AnswerSink`](threadscout_core::AnswerSink) to reply.
//!
//! Available channels:
//! - **Slack**: Web API with a user OAuth token

pub mod slack;

pub use slack::SlackChannel;
