//! Tool execution for ThreadScout.
//!
//! Routes model tool calls to information-source back-ends, bounds their
//! results, and collects the URLs an answer can cite.

pub mod backends;
pub mod dispatcher;
pub mod shaper;
pub mod sources;

pub use dispatcher::{ARG_ORDER, ToolDispatcher};
pub use shaper::{ToolFamily, shape};
pub use sources::{SourceCollector, SourceList};
