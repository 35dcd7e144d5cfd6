//! Full-pipeline tests against scripted backends: validation short-circuit,
//! remote-to-local fallback, marker extraction, and error normalization,
//! with no interpreter or network involved.

use std::time::Duration;

use serde_json::json;

use scriptbox::denylist::Denylist;
use scriptbox::execute::{ExecRequest, Sandbox};
use scriptbox::harness::{RESULT_MARKER, build_harness, status};
use scriptbox::test_support::{ScriptedBackend, ScriptedRun, failed_run, success_run};
use scriptbox::validate::{ScriptLimits, Validator};

const TIMEOUT: Duration = Duration::from_secs(5);

fn validator() -> Validator {
    Validator::new(Denylist::default(), ScriptLimits::default())
}

fn request(script: &str) -> ExecRequest {
    ExecRequest::new(script, TIMEOUT)
}

#[test]
fn rejected_script_never_reaches_a_backend() {
    let remote = ScriptedBackend::untouchable();
    let local = ScriptedBackend::untouchable();
    let sandbox = Sandbox::new(validator(), &remote, &local);

    let response = sandbox.execute(&request("def helper():\n    return 1\n"));

    let error = response.error.expect("rejection error");
    assert!(error.contains("main()"), "{error}");
    assert_eq!(response.result, None);
    assert_eq!(remote.calls(), 0);
    assert_eq!(local.calls(), 0);
}

#[test]
fn denylisted_script_reports_the_specific_construct() {
    let sandbox = Sandbox::new(
        validator(),
        ScriptedBackend::untouchable(),
        ScriptedBackend::untouchable(),
    );

    let response = sandbox.execute(&request(
        "import subprocess\n\ndef main():\n    return 1\n",
    ));

    let error = response.error.expect("rejection error");
    assert!(error.contains("subprocess"), "{error}");
}

#[test]
fn remote_success_is_normalized_without_touching_local() {
    let remote = ScriptedBackend::new(vec![success_run("", "42")]);
    let local = ScriptedBackend::untouchable();
    let sandbox = Sandbox::new(validator(), &remote, &local);

    let response = sandbox.execute(&request("def main():\n    return 42\n"));

    assert_eq!(response.result, Some(json!(42)));
    assert_eq!(response.error, None);
    assert_eq!(response.stdout, "");
    assert_eq!(remote.calls(), 1);
    assert_eq!(local.calls(), 0);
}

#[test]
fn unavailable_remote_falls_back_to_local_transparently() {
    let remote = ScriptedBackend::new(vec![ScriptedRun::Unavailable(
        "connection refused".to_string(),
    )]);
    let local = ScriptedBackend::new(vec![success_run("", "42")]);
    let sandbox = Sandbox::new(validator(), &remote, &local);

    let response = sandbox.execute(&request("def main():\n    return 42\n"));

    // The caller-facing response shows no trace of the fallback.
    assert_eq!(response.result, Some(json!(42)));
    assert_eq!(response.error, None);
    assert_eq!(response.stdout, "");
    assert_eq!(remote.calls(), 1);
    assert_eq!(local.calls(), 1);
}

#[test]
fn fallback_annotates_raw_stderr_with_the_reason() {
    let remote = ScriptedBackend::new(vec![ScriptedRun::Unavailable(
        "connection refused".to_string(),
    )]);
    let local = ScriptedBackend::new(vec![success_run("", "42")]);
    let sandbox = Sandbox::new(validator(), remote, local);

    let raw = sandbox.run_raw(&build_harness("def main():\n    return 42\n"), TIMEOUT);

    assert!(raw.stderr.starts_with("[runner-unavailable] connection refused"));
    let note = raw.fallback_note.expect("fallback note");
    assert!(note.contains("connection refused"));
}

#[test]
fn fallback_prepends_note_to_existing_stderr() {
    let remote = ScriptedBackend::new(vec![ScriptedRun::Unavailable("dns failure".to_string())]);
    let local = ScriptedBackend::new(vec![failed_run("Traceback: boom", status::USER_EXCEPTION)]);
    let sandbox = Sandbox::new(validator(), remote, local);

    let raw = sandbox.run_raw(&build_harness("def main():\n    return 42\n"), TIMEOUT);

    assert!(raw.stderr.starts_with("[runner-unavailable] dns failure\n"));
    assert!(raw.stderr.contains("Traceback: boom"));
}

#[test]
fn each_backend_is_attempted_at_most_once() {
    let remote = ScriptedBackend::new(vec![ScriptedRun::Unavailable("refused".to_string())]);
    let local = ScriptedBackend::new(vec![failed_run("boom", status::USER_EXCEPTION)]);
    let sandbox = Sandbox::new(validator(), &remote, &local);

    let response = sandbox.execute(&request("def main():\n    return 42\n"));

    assert!(response.error.is_some());
    assert_eq!(remote.calls(), 1);
    assert_eq!(local.calls(), 1);
}

#[test]
fn backend_fault_surfaces_as_error_not_panic() {
    let remote = ScriptedBackend::new(vec![ScriptedRun::Fault("runner bug".to_string())]);
    let local = ScriptedBackend::untouchable();
    let sandbox = Sandbox::new(validator(), remote, local);

    let response = sandbox.execute(&request("def main():\n    return 42\n"));

    let error = response.error.expect("fault error");
    assert!(error.contains("runner fault"), "{error}");
    assert!(error.contains("runner bug"), "{error}");
}

#[test]
fn printed_marker_text_does_not_shadow_the_real_result() {
    let payload_line = format!("{RESULT_MARKER}\"fake\"");
    let remote = ScriptedBackend::new(vec![success_run(
        &format!("legit output\n{payload_line}"),
        "\"real\"",
    )]);
    let sandbox = Sandbox::new(validator(), remote, ScriptedBackend::untouchable());

    let response = sandbox.execute(&request("def main():\n    return 'real'\n"));

    assert_eq!(response.result, Some(json!("real")));
    assert_eq!(response.stdout, "legit output");
    assert_eq!(response.error, None);
}

#[test]
fn timeout_from_backend_yields_timeout_error() {
    let remote = ScriptedBackend::new(vec![failed_run("", status::TIMED_OUT)]);
    let sandbox = Sandbox::new(validator(), remote, ScriptedBackend::untouchable());

    let response = sandbox.execute(&request("def main():\n    while True:\n        pass\n"));

    assert_eq!(response.result, None);
    let error = response.error.expect("timeout error");
    assert!(error.contains("timed out"), "{error}");
}

#[test]
fn undecodable_payload_is_distinct_from_no_result() {
    let remote = ScriptedBackend::new(vec![success_run("", "{broken")]);
    let sandbox = Sandbox::new(validator(), remote, ScriptedBackend::untouchable());

    let response = sandbox.execute(&request("def main():\n    return 1\n"));

    let error = response.error.expect("decode error");
    assert!(error.contains("not valid JSON"), "{error}");
}

#[test]
fn serialization_failure_payload_maps_to_error() {
    let remote = ScriptedBackend::new(vec![success_run(
        "",
        r#"{"__error__": "Object of type object is not JSON serializable"}"#,
    )]);
    let sandbox = Sandbox::new(validator(), remote, ScriptedBackend::untouchable());

    let response = sandbox.execute(&request("def main():\n    return 1\n"));

    assert_eq!(response.result, None);
    let error = response.error.expect("serialization error");
    assert!(error.contains("not JSON-serializable"), "{error}");
}

#[test]
fn null_return_is_a_result_not_an_error() {
    let remote = ScriptedBackend::new(vec![success_run("", "null")]);
    let sandbox = Sandbox::new(validator(), remote, ScriptedBackend::untouchable());

    let response = sandbox.execute(&request("def main():\n    return None\n"));

    assert_eq!(response.result, Some(serde_json::Value::Null));
    assert_eq!(response.error, None);
}

#[test]
fn local_only_sandbox_skips_the_remote_path() {
    let local = ScriptedBackend::new(vec![success_run("", "7")]);
    let sandbox = Sandbox::local_only(validator(), local);

    let response = sandbox.execute(&request("def main():\n    return 7\n"));

    assert_eq!(response.result, Some(json!(7)));
    // No fallback annotation when the local path was chosen directly.
    let raw = Sandbox::local_only(
        validator(),
        ScriptedBackend::new(vec![success_run("", "7")]),
    )
    .run_raw("harness", TIMEOUT);
    assert_eq!(raw.fallback_note, None);
    assert_eq!(raw.stderr, "");
}
