//! Denylist tables consumed by the validator.
//!
//! The tables are plain data, injected into [`crate::validate::Validator`] at
//! construction so tests (and deployments with different risk appetites) can
//! supply alternates. They are never mutated after construction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Names, attribute pairs, and module paths treated as forbidden.
///
/// This is denylisting, not a capability system: it reduces the obvious
/// escape routes but must never be treated as a substitute for running
/// harnesses in an isolated process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Denylist {
    /// Bare names whose *calls* are flagged, and module paths whose imports
    /// (plain or `from`-style, including dotted sub-paths) are flagged.
    pub names: BTreeSet<String>,

    /// `(object, attribute)` pairs flagged both when called and when merely
    /// referenced.
    pub attributes: BTreeSet<(String, String)>,

    /// Names flagged on any bare reference, even uncalled. These are the
    /// primitives dangerous to merely alias (`f = eval`).
    pub references: BTreeSet<String>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self {
            names: to_set(&[
                "eval",
                "exec",
                "compile",
                "__import__",
                "importlib",
                "ctypes",
                "ctypes.util",
                // network / process control
                "subprocess",
                "socket",
                "multiprocessing",
                "threading",
                "os.system",
                // module-registry access usable for escapes
                "sys.modules",
            ]),
            attributes: [
                ("os", "system"),
                ("os", "popen"),
                ("os", "execv"),
                ("os", "execl"),
                ("sys", "exec_prefix"),
            ]
            .iter()
            .map(|(obj, attr)| ((*obj).to_string(), (*attr).to_string()))
            .collect(),
            references: to_set(&["eval", "exec", "__import__"]),
        }
    }
}

impl Denylist {
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn contains_attribute(&self, object: &str, attribute: &str) -> bool {
        self.attributes
            .contains(&(object.to_string(), attribute.to_string()))
    }

    pub fn contains_reference(&self, name: &str) -> bool {
        self.references.contains(name)
    }

    /// True when `module` equals a denylisted module or is nested under one
    /// (`os.system` denies `import os.system.anything` too).
    pub fn denies_module(&self, module: &str) -> bool {
        self.names.iter().any(|denied| {
            module == denied
                || (module.len() > denied.len()
                    && module.starts_with(denied.as_str())
                    && module.as_bytes()[denied.len()] == b'.')
        })
    }
}

fn to_set(entries: &[&str]) -> BTreeSet<String> {
    entries.iter().map(|entry| (*entry).to_string()).collect()
}
