//! The question-answering agent.
//!
//! One invocation runs a bounded **ask → act → observe** cycle:
//!
//! 1. **Gather** the question and its thread from a [`ThreadSource`](threadscout_core::ThreadSource)
//! 2. **Ask** the model through the [`RequestRetrier`]
//! 3. **If tool calls**: check them against the [`RepetitionGuard`], run them,
//!    append the shaped results, loop back to step 2
//! 4. **If text**: keep it as the answer
//!
//! The loop ends on a final answer, a repeated tool call, or the iteration
//! limit. A loop without an answer is summarized in one tool-free request,
//! and the result is posted with its sources.

pub mod answer;
pub mod guard;
pub mod loop_runner;
pub mod monitor;
pub mod prompt;
pub mod retry;
pub mod summary;

pub use answer::{QuestionAnswerer, format_final_answer};
pub use guard::{RepetitionGuard, Signature, Verdict};
pub use loop_runner::{AnswerLoop, LoopOutcome, Termination};
pub use monitor::{CheckOutcome, Monitor};
pub use retry::{FailureClass, RequestRetrier};
pub use summary::SummaryGenerator;
