//! Language model provider implementations for ThreadScout.
//!
//! All providers implement the `threadscout_core::Provider` trait.

pub mod anthropic;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use router::build_from_config;
