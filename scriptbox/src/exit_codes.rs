//! Stable exit codes for scriptbox CLI commands.
//!
//! These are the exit codes of the `scriptbox` binary itself. They are
//! unrelated to the statuses a harness process exits with; those live in
//! [`crate::harness::status`].

/// Command succeeded; for `exec`, the script produced a result.
pub const OK: i32 = 0;
/// Command failed due to bad usage, unreadable input, or invalid config.
pub const INVALID: i32 = 1;
/// `scriptbox check` or `scriptbox exec` rejected the script during validation.
pub const REJECTED: i32 = 2;
/// `scriptbox exec` ran the script but it produced an error instead of a result.
pub const EXECUTION_FAILED: i32 = 3;
