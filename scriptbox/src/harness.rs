//! Harness generation: wraps an accepted script into an executable source
//! that emits one marker-delimited JSON result line.
//!
//! The harness never redirects or buffers user `print` output; it interleaves
//! with the marker line on stdout and the normalizer separates the two
//! afterwards. The marker is a process-wide constant, deliberately long and
//! distinctive so ordinary output is exceedingly unlikely to start a line
//! with it.

use minijinja::{Environment, context};

/// Sentinel prefixing the single stdout line that carries the JSON result.
/// Not user-configurable.
pub const RESULT_MARKER: &str = "<<<__SCRIPTBOX_RESULT__>>>";

/// Exit statuses the generated harness and the backends agree on.
///
/// Callers can distinguish "user code raised" from "result not serializable"
/// from the status alone. Negative values are assigned by backends, never by
/// the harness itself.
pub mod status {
    /// Harness ran `main()` and emitted a marker line.
    pub const SUCCESS: i32 = 0;
    /// `main()` raised; traceback went to stderr.
    pub const USER_EXCEPTION: i32 = 1;
    /// `main()` returned a value `json.dumps` could not encode.
    pub const UNSERIALIZABLE: i32 = 2;
    /// Sentinel: the backend terminated the harness at the deadline.
    pub const TIMED_OUT: i32 = -1;
    /// Sentinel: the backend itself failed before or while running the
    /// harness (spawn error, runner-internal fault).
    pub const RUNNER_FAULT: i32 = -2;
}

const HARNESS_TEMPLATE: &str = include_str!("harness.py.j2");

/// Build executable harness source embedding `script` verbatim.
///
/// Total function: assumes the script already passed validation. The
/// template is static and the inputs are plain strings, so rendering cannot
/// fail at runtime.
pub fn build_harness(script: &str) -> String {
    let mut env = Environment::new();
    env.add_template("harness", HARNESS_TEMPLATE)
        .expect("harness template should be valid");
    let template = env
        .get_template("harness")
        .expect("harness template was just added");
    template
        .render(context! {
            script => script,
            marker => RESULT_MARKER,
            user_exception_status => status::USER_EXCEPTION,
            unserializable_status => status::UNSERIALIZABLE,
        })
        .expect("harness template renders from string context")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "def main():\n    return 42";

    #[test]
    fn embeds_script_verbatim() {
        let harness = build_harness(SCRIPT);
        assert!(harness.contains(SCRIPT));
    }

    #[test]
    fn embeds_marker_exactly_once() {
        let harness = build_harness(SCRIPT);
        assert_eq!(harness.matches(RESULT_MARKER).count(), 1);
    }

    #[test]
    fn emits_distinct_statuses_for_exception_and_serialization_failure() {
        let harness = build_harness(SCRIPT);
        assert!(harness.contains(&format!("sys.exit({})", status::USER_EXCEPTION)));
        assert!(harness.contains(&format!("sys.exit({})", status::UNSERIALIZABLE)));
        assert_ne!(status::USER_EXCEPTION, status::UNSERIALIZABLE);
    }

    #[test]
    fn main_stays_callable_at_top_level() {
        let harness = build_harness(SCRIPT);
        let script_at = harness.find("def main()").expect("script embedded");
        let entry_at = harness.find("__scriptbox_entry").expect("entry defined");
        assert!(script_at < entry_at, "script must precede the entry routine");
    }

    #[test]
    fn marker_is_long_enough_to_avoid_accidental_collisions() {
        assert!(RESULT_MARKER.len() >= 20);
    }
}
