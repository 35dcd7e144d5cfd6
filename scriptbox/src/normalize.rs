//! Raw backend output → caller-facing `{result, stdout, error}` response.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::backend::RawExecution;
use crate::harness::{RESULT_MARKER, status};

/// Caller-facing outcome of one execution request.
///
/// Exactly one of `result` / `error` is set on a well-formed run. A script
/// that legitimately returns JSON `null` yields `result: Some(Value::Null)`
/// with no error; `result: None` always means "no result".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResponse {
    pub result: Option<Value>,
    pub stdout: String,
    pub error: Option<String>,
}

impl ExecutionResponse {
    pub(crate) fn rejected(summary: String) -> Self {
        Self {
            result: None,
            stdout: String::new(),
            error: Some(summary),
        }
    }
}

/// Extract the marker payload from raw stdout and assemble the response.
///
/// Every stdout line is either a marker line (candidate payload) or printed
/// output, preserved in original order. User code could print
/// marker-prefixed text; the last marker line wins as the defined, if
/// imperfect, tie-break.
pub fn normalize(raw: &RawExecution, timeout: Duration) -> ExecutionResponse {
    let mut printed: Vec<&str> = Vec::new();
    let mut payload: Option<&str> = None;
    for line in raw.stdout.lines() {
        match line.strip_prefix(RESULT_MARKER) {
            Some(rest) => payload = Some(rest),
            None => printed.push(line),
        }
    }
    let stdout = printed.join("\n");

    let Some(payload) = payload else {
        return ExecutionResponse {
            result: None,
            stdout,
            error: Some(missing_result_error(raw, timeout)),
        };
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => {
            if let Some(detail) = serialization_failure(&value) {
                return ExecutionResponse {
                    result: None,
                    stdout,
                    error: Some(format!("result is not JSON-serializable: {detail}")),
                };
            }
            ExecutionResponse {
                result: Some(value),
                stdout,
                error: None,
            }
        }
        Err(err) => ExecutionResponse {
            result: None,
            stdout,
            error: Some(format!("result payload is not valid JSON: {err}")),
        },
    }
}

/// No marker line: derive the most useful error text available, in priority
/// order stderr → timeout sentinel → generic exit status.
fn missing_result_error(raw: &RawExecution, timeout: Duration) -> String {
    let stderr = raw.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    if raw.exit_status == status::TIMED_OUT {
        return format!("Execution timed out after {} seconds", timeout.as_secs());
    }
    format!(
        "script produced no result (exit status {})",
        raw.exit_status
    )
}

/// The harness encodes "return value was not serializable" as a one-member
/// `{"__error__": detail}` payload so the normalizer always has a
/// predictable shape to look for.
fn serialization_failure(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("__error__")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn raw(stdout: &str, stderr: &str, exit_status: i32) -> RawExecution {
        RawExecution {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_status,
            fallback_note: None,
        }
    }

    fn marker_line(payload: &str) -> String {
        format!("{RESULT_MARKER}{payload}")
    }

    #[test]
    fn decodes_marker_payload_as_result() {
        let stdout = format!("computing\n{}\n", marker_line("{\"answer\": 42}"));
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        assert_eq!(response.result, Some(json!({"answer": 42})));
        assert_eq!(response.stdout, "computing");
        assert_eq!(response.error, None);
    }

    #[test]
    fn null_result_is_explicit_not_missing() {
        let stdout = marker_line("null");
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        assert_eq!(response.result, Some(Value::Null));
        assert_eq!(response.error, None);
    }

    #[test]
    fn last_marker_line_wins() {
        let stdout = format!(
            "{}\n{}\n",
            marker_line("\"printed fake\""),
            marker_line("\"real\"")
        );
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        assert_eq!(response.result, Some(json!("real")));
        assert_eq!(response.stdout, "");
    }

    #[test]
    fn marker_mid_line_is_ordinary_output() {
        let stdout = format!(
            "look: {RESULT_MARKER} not a payload\n{}\n",
            marker_line("7")
        );
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        assert_eq!(response.result, Some(json!(7)));
        assert_eq!(response.stdout, format!("look: {RESULT_MARKER} not a payload"));
    }

    #[test]
    fn marker_lines_are_excluded_from_stdout_in_order() {
        let stdout = format!("a\n{}\nb\n", marker_line("1"));
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        assert_eq!(response.stdout, "a\nb");
    }

    #[test]
    fn missing_marker_prefers_stderr() {
        let response = normalize(&raw("partial\n", "Traceback: boom\n", 1), TIMEOUT);
        assert_eq!(response.result, None);
        assert_eq!(response.error.as_deref(), Some("Traceback: boom"));
        assert_eq!(response.stdout, "partial");
    }

    #[test]
    fn missing_marker_with_timeout_sentinel_names_the_timeout() {
        let response = normalize(&raw("", "", status::TIMED_OUT), TIMEOUT);
        let error = response.error.expect("error");
        assert!(error.contains("timed out after 5 seconds"), "{error}");
    }

    #[test]
    fn missing_marker_falls_back_to_exit_status() {
        let response = normalize(&raw("", "", 3), TIMEOUT);
        assert_eq!(
            response.error.as_deref(),
            Some("script produced no result (exit status 3)")
        );
    }

    #[test]
    fn undecodable_payload_is_a_distinct_error() {
        let stdout = marker_line("{not json");
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        let error = response.error.expect("error");
        assert!(error.contains("not valid JSON"), "{error}");
        assert_eq!(response.result, None);
    }

    #[test]
    fn serialization_failure_payload_becomes_error() {
        let stdout = marker_line(r#"{"__error__": "Object of type object is not JSON serializable"}"#);
        let response = normalize(&raw(&stdout, "", status::UNSERIALIZABLE), TIMEOUT);
        assert_eq!(response.result, None);
        let error = response.error.expect("error");
        assert!(error.contains("not JSON-serializable"), "{error}");
        assert!(error.contains("Object of type object"), "{error}");
    }

    #[test]
    fn user_object_with_extra_keys_is_not_mistaken_for_failure() {
        let stdout = marker_line(r#"{"__error__": "mine", "other": 1}"#);
        let response = normalize(&raw(&stdout, "", 0), TIMEOUT);
        assert_eq!(
            response.result,
            Some(json!({"__error__": "mine", "other": 1}))
        );
        assert_eq!(response.error, None);
    }
}
