//! Test-only backends that return scripted results without spawning
//! processes or touching the network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{BackendError, ExecBackend, RawExecution};
use crate::harness::RESULT_MARKER;

/// One scripted backend response.
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    Raw(RawExecution),
    Unavailable(String),
    Fault(String),
}

/// Backend that pops predetermined responses in order.
///
/// Panics (in the test) when invoked more times than scripted, and counts
/// calls so tests can assert a backend was never reached.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<ScriptedRun>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            queue: Mutex::new(runs.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Backend that should never be invoked.
    pub fn untouchable() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExecBackend for ScriptedBackend {
    fn run(&self, _harness: &str, _timeout: Duration) -> Result<RawExecution, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .queue
            .lock()
            .expect("scripted queue poisoned")
            .pop_front()
            .expect("scripted backend invoked more times than scripted");
        match next {
            ScriptedRun::Raw(raw) => Ok(raw),
            ScriptedRun::Unavailable(reason) => Err(BackendError::Unavailable(reason)),
            ScriptedRun::Fault(detail) => Err(BackendError::Fault(detail)),
        }
    }
}

/// A successful run whose marker line carries `payload` (already-encoded
/// JSON), preceded by optional printed output.
pub fn success_run(printed: &str, payload: &str) -> ScriptedRun {
    let mut stdout = String::new();
    if !printed.is_empty() {
        stdout.push_str(printed);
        if !printed.ends_with('\n') {
            stdout.push('\n');
        }
    }
    stdout.push_str(RESULT_MARKER);
    stdout.push_str(payload);
    stdout.push('\n');
    ScriptedRun::Raw(RawExecution {
        stdout,
        stderr: String::new(),
        exit_status: 0,
        fallback_note: None,
    })
}

/// A run that produced no marker line, with the given stderr and status.
pub fn failed_run(stderr: &str, exit_status: i32) -> ScriptedRun {
    ScriptedRun::Raw(RawExecution {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_status,
        fallback_note: None,
    })
}
