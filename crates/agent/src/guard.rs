//! Loop-breaking on repeated tool calls.

use serde_json::Value;
use std::collections::HashSet;
use threadscout_core::tool::ToolInvocation;

/// Identity of a tool call: name plus canonical JSON of its input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn of(invocation: &ToolInvocation) -> Self {
        let mut out = format!("{}:", invocation.name);
        write_canonical(&Value::Object(invocation.input.clone()), &mut out);
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Outcome of checking one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No call was seen before; the batch is now recorded.
    Fresh,
    /// These signatures were already executed; nothing in the batch may run.
    Repeated(Vec<Signature>),
}

/// Remembers every executed tool call of one invocation.
#[derive(Debug, Default)]
pub struct RepetitionGuard {
    executed: HashSet<Signature>,
}

impl RepetitionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a batch; records it only when nothing repeats.
    pub fn check(&mut self, batch: &[ToolInvocation]) -> Verdict {
        let signatures: Vec<Signature> = batch.iter().map(Signature::of).collect();
        let repeated: Vec<Signature> = signatures
            .iter()
            .filter(|s| self.executed.contains(*s))
            .cloned()
            .collect();

        if !repeated.is_empty() {
            return Verdict::Repeated(repeated);
        }
        self.executed.extend(signatures);
        Verdict::Fresh
    }

    /// Number of distinct calls executed so far.
    pub fn len(&self) -> usize {
        self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }
}
