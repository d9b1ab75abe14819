//! Prompt texts and the initial prompt builder.

use threadscout_core::channel::ThreadContext;
use threadscout_core::tool::BackendRegistry;
use threadscout_tools::backends::Permalink;

/// System prompt for every tool-loop request.
pub const SYSTEM_PROMPT: &str = "\
You are an engineer on the team. Answer the question precisely.

Principles:
- Gather information from several sources before answering; check at least two or three different sources.
- For technical questions, consult sources in this order of priority:
  1. Issue tracker (related tickets, past inquiries)
  2. FAQ (basic specifications and procedures)
  3. Chat history (related past conversations)
  4. Wiki (detailed documentation and design notes)
- When unsure, use additional tools to fill the gaps.

Tool constraints:
- Only use tools included in the provided tool definitions.
- Never guess tool names that do not exist.
- Never call the same tool with the same arguments twice.
- After receiving tool results, use them to decide the next step.
- Once enough information is gathered, stop calling tools and write the answer.";

/// How answers must be formatted for Slack.
pub const FORMAT_INSTRUCTION: &str = "\
Answer format:
- The answer is posted to Slack, so use Slack mrkdwn.
- Express headings in *bold* (## is not supported).
- Bold: *text*, italic: _text_, strikethrough: ~text~, code: `code`
- Links use the form <url|label> (e.g. <https://example.com|link>).
- Start bullet points with • or -";

/// User turn appended when the model repeats an executed tool call.
pub const REPETITION_NOTICE: &str = "\
You are calling the same tool repeatedly. Answer the question using the information gathered so far.";

/// Tool result answering each call of a batch stopped for repetition.
pub const SKIPPED_CALL_RESULT: &str = "Not executed: repeated call";

/// System prompt of the tool-free summary request.
pub const SUMMARY_SYSTEM_PROMPT: &str = "\
Write a comprehensive answer to the question from the information gathered. \
Do not use tools; answer only from the existing information.";

/// Returned when no summary could be produced.
pub const FALLBACK_ANSWER: &str = "Sorry, I could not generate an answer.";

/// Posted to the thread when answering fails.
pub const ERROR_APOLOGY: &str = "Sorry, an error occurred while generating the answer.";

/// User turn requesting the final summary.
pub fn summary_instruction() -> String {
    format!(
        "Write a comprehensive answer to the question based on the information gathered.\n\n\
         Important:\n\
         - No more tools need to be run\n\
         - Use only the information already gathered\n\
         - Make the answer specific and detailed\n\n\
         {FORMAT_INSTRUCTION}"
    )
}

/// Security rules and usage context published by the back-ends.
pub fn registry_guidance(registry: &BackendRegistry) -> String {
    let mut out = String::new();

    let rules = registry.security_rules();
    if !rules.is_empty() {
        out.push_str("\nSecurity rules:\n");
        for (platform, rule) in rules {
            out.push_str(&format!("- [{platform}] {rule}\n"));
        }
    }

    let contexts = registry.usage_context();
    if !contexts.is_empty() {
        out.push_str("\nWhen to use each tool:\n");
        for (platform, line) in contexts {
            out.push_str(&format!("- [{platform}] {line}\n"));
        }
    }

    out
}

/// The first user turn of a conversation.
pub fn initial_prompt(context: &ThreadContext, registry: &BackendRegistry) -> String {
    let mut prompt = String::from("Please answer the following question.\n\n");
    prompt.push_str(&format!("Question:\n{}\n\n", context.question));
    prompt.push_str(FORMAT_INSTRUCTION);
    prompt.push_str("\n\n");

    if let Some(url) = Permalink::find_in(&context.question) {
        prompt.push_str(&format!(
            "Important: the question may contain a Slack message URL: {url}\n\
             Always fetch that thread with the slack_getThreadMessages tool.\n\
             Base the answer on the actual thread content, not only on the URL.\n\n"
        ));
    }

    prompt.push_str(&registry_guidance(registry));

    if context.messages.len() > 1 {
        prompt.push_str("Thread history:\n");
        for (i, msg) in context.messages.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, msg.text));
        }
        prompt.push('\n');
    }

    prompt
}
