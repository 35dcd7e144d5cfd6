//! Validated, harnessed execution of untrusted Python snippets.
//!
//! A submitted script is statically screened against a denylist, wrapped in a
//! harness that separates printed output from a single marker-delimited JSON
//! result, executed under a hard time bound, and normalized into a
//! `{result, stdout, error}` response. Execution prefers a remote runner
//! service and transparently falls back to a local interpreter process when
//! the runner is unreachable. The architecture enforces a strict separation:
//!
//! - **[`validate`] / [`harness`] / [`normalize`]**: Pure logic (screening,
//!   source generation, output parsing). No I/O, fully testable in isolation.
//! - **[`backend`] / [`process`]**: Side-effecting execution paths (HTTP to
//!   the runner service, local child processes). Swappable behind one trait
//!   to enable scripted fakes in tests.
//!
//! [`execute`] coordinates the pure stages with the backends and owns the
//! remote-then-local fallback policy.
//!
//! The denylist screening is best-effort static analysis. It is **not**
//! process isolation; production deployments run harnesses inside a
//! containerized runner service.

pub mod backend;
pub mod config;
pub mod denylist;
pub mod execute;
pub mod exit_codes;
pub mod harness;
pub mod logging;
pub mod normalize;
pub mod process;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
