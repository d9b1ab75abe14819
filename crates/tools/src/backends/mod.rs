//! Concrete information-source back-ends.

pub mod redmine;
pub mod slack;

use serde_json::{Map, Value};
use threadscout_core::error::ToolError;

pub use redmine::RedmineBackend;
pub use slack::{Permalink, SlackApi, SlackApiError, SlackBackend};

/// Required string argument at `index`.
pub(crate) fn expect_str<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, ToolError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ToolError::InvalidArguments(format!("'{name}' must be a string, got {other}"))),
        None => Err(ToolError::InvalidArguments(format!("Missing '{name}' argument"))),
    }
}

/// Optional object argument at `index`; `null` counts as absent.
pub(crate) fn expect_object<'a>(
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>, ToolError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(ToolError::InvalidArguments(format!("'{name}' must be an object, got {other}"))),
    }
}

/// Render an argument object as query pairs.
pub(crate) fn query_pairs(params: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    params
        .into_iter()
        .flatten()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_argument_checks() {
        let args = vec![json!("C123"), json!(5)];
        assert_eq!(expect_str(&args, 0, "channel").unwrap(), "C123");
        assert!(expect_str(&args, 1, "query").is_err());
        assert!(expect_str(&args, 2, "query").is_err());
    }

    #[test]
    fn object_argument_checks() {
        let args = vec![json!({"limit": 5, "status_id": "open"}), Value::Null, json!("x")];
        let pairs = query_pairs(expect_object(&args, 0, "queryParams").unwrap());
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
        assert!(pairs.contains(&("status_id".to_string(), "open".to_string())));
        assert!(expect_object(&args, 1, "queryParams").unwrap().is_none());
        assert!(expect_object(&args, 3, "queryParams").unwrap().is_none());
        assert!(expect_object(&args, 2, "queryParams").is_err());
    }
}
