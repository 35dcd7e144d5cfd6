//! Static screening of submitted scripts.
//!
//! A script is parsed with tree-sitter and scanned in a single traversal for
//! constructs on the configured [`Denylist`]: calls, imports, attribute
//! access, and bare references to dynamic-execution primitives. Screening is
//! best-effort by design; it narrows the attack surface but does not replace
//! process isolation.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::config::SandboxConfig;
use crate::denylist::Denylist;

/// Issue classification, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    EmptyScript,
    ScriptTooLarge,
    SyntaxInvalid,
    MissingEntryPoint,
    DisallowedCall,
    DisallowedImport,
    DisallowedAttributeAccess,
    DisallowedNameReference,
    TooManyDefinitions,
}

/// One reason a script was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of validating one submission.
///
/// An empty issue list means the script was accepted. Issues are recorded in
/// discovery order and deduplicated by message text; [`Self::summary`]
/// renders at most the first [`SUMMARY_LIMIT`] while the full list stays
/// available for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

/// Cap on issues rendered into the caller-facing summary.
pub const SUMMARY_LIMIT: usize = 5;

impl ValidationReport {
    pub fn is_accepted(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Caller-facing rejection text, `None` when accepted.
    pub fn summary(&self) -> Option<String> {
        if self.issues.is_empty() {
            return None;
        }
        let rendered: Vec<&str> = self
            .issues
            .iter()
            .take(SUMMARY_LIMIT)
            .map(|issue| issue.message.as_str())
            .collect();
        Some(rendered.join("; "))
    }
}

/// Size and complexity bounds applied before and during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_script_bytes: usize,
    pub max_function_defs: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_script_bytes: 200 * 1024,
            max_function_defs: 100,
        }
    }
}

/// Pure validator: script text in, accept/reject plus diagnostics out.
///
/// Holds only immutable configuration, so one instance may serve concurrent
/// requests without locking.
#[derive(Debug, Clone)]
pub struct Validator {
    denylist: Denylist,
    limits: ScriptLimits,
}

impl Validator {
    pub fn new(denylist: Denylist, limits: ScriptLimits) -> Self {
        Self { denylist, limits }
    }

    /// Default denylist with limits taken from config.
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            Denylist::default(),
            ScriptLimits {
                max_script_bytes: config.max_script_bytes,
                max_function_defs: config.max_function_defs,
            },
        )
    }

    /// Validate a submission. Short-circuits only on empty/oversized input
    /// and unparseable source; all structural issues are collected in one
    /// traversal so the caller gets a complete picture.
    pub fn validate(&self, script: &str) -> ValidationReport {
        if script.trim().is_empty() {
            return report(vec![ValidationIssue::new(
                IssueKind::EmptyScript,
                "script is empty or whitespace-only",
            )]);
        }
        if script.len() > self.limits.max_script_bytes {
            return report(vec![ValidationIssue::new(
                IssueKind::ScriptTooLarge,
                format!(
                    "script exceeds maximum size ({} > {} bytes)",
                    script.len(),
                    self.limits.max_script_bytes
                ),
            )]);
        }

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar must be compatible with the linked tree-sitter");
        let Some(tree) = parser.parse(script, None) else {
            return report(vec![syntax_invalid()]);
        };
        let root = tree.root_node();
        if root.has_error() {
            // Nothing structural is meaningful once parsing failed.
            return report(vec![syntax_invalid()]);
        }

        let mut issues = Vec::new();
        if !has_top_level_main(root, script) {
            issues.push(ValidationIssue::new(
                IssueKind::MissingEntryPoint,
                "script must define a top-level function named 'main()'",
            ));
        }

        let mut function_defs = 0usize;
        let mut stack: Vec<Node<'_>> = vec![root];
        while let Some(node) = stack.pop() {
            self.check_node(node, script, &mut issues, &mut function_defs);
            let mut cursor = node.walk();
            let mut children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            children.reverse();
            stack.extend(children);
        }

        if function_defs > self.limits.max_function_defs {
            issues.push(ValidationIssue::new(
                IssueKind::TooManyDefinitions,
                format!(
                    "too many function definitions ({} > {})",
                    function_defs, self.limits.max_function_defs
                ),
            ));
        }

        report(dedupe(issues))
    }

    fn check_node(
        &self,
        node: Node<'_>,
        src: &str,
        issues: &mut Vec<ValidationIssue>,
        function_defs: &mut usize,
    ) {
        match node.kind() {
            "function_definition" => *function_defs += 1,
            "call" => self.check_call(node, src, issues),
            "import_statement" => self.check_import(node, src, issues),
            "import_from_statement" => self.check_import_from(node, src, issues),
            "attribute" => self.check_attribute_reference(node, src, issues),
            "identifier" => self.check_name_reference(node, src, issues),
            _ => {}
        }
    }

    fn check_call(&self, node: Node<'_>, src: &str, issues: &mut Vec<ValidationIssue>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        match function.kind() {
            "identifier" => {
                let name = text(function, src);
                if self.denylist.contains_name(name) {
                    issues.push(ValidationIssue::new(
                        IssueKind::DisallowedCall,
                        format!("call to '{name}()' is disallowed"),
                    ));
                }
            }
            "attribute" => {
                let Some((object, attribute)) = attribute_pair(function, src) else {
                    return;
                };
                if self.denylist.contains_attribute(object, attribute) {
                    issues.push(ValidationIssue::new(
                        IssueKind::DisallowedCall,
                        format!("call to '{object}.{attribute}()' is disallowed"),
                    ));
                }
            }
            _ => {}
        }
    }

    fn check_import(&self, node: Node<'_>, src: &str, issues: &mut Vec<ValidationIssue>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let module = match child.kind() {
                "dotted_name" => Some(text(child, src)),
                "aliased_import" => child.child_by_field_name("name").map(|name| text(name, src)),
                _ => None,
            };
            if let Some(module) = module
                && self.denylist.denies_module(module)
            {
                issues.push(ValidationIssue::new(
                    IssueKind::DisallowedImport,
                    format!("import of '{module}' is disallowed"),
                ));
            }
        }
    }

    fn check_import_from(&self, node: Node<'_>, src: &str, issues: &mut Vec<ValidationIssue>) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = text(module_node, src);
        if self.denylist.denies_module(module) {
            issues.push(ValidationIssue::new(
                IssueKind::DisallowedImport,
                format!("import from '{module}' is disallowed"),
            ));
        }
    }

    /// Attribute access is flagged even without a call: `f = os.system`
    /// escapes the call check but not this one.
    fn check_attribute_reference(
        &self,
        node: Node<'_>,
        src: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some((object, attribute)) = attribute_pair(node, src) else {
            return;
        };
        if self.denylist.contains_attribute(object, attribute) {
            issues.push(ValidationIssue::new(
                IssueKind::DisallowedAttributeAccess,
                format!("reference to attribute '{object}.{attribute}' is disallowed"),
            ));
        }
    }

    /// Bare references to dynamic-execution primitives are flagged even when
    /// not called, since an alias can be invoked later.
    fn check_name_reference(&self, node: Node<'_>, src: &str, issues: &mut Vec<ValidationIssue>) {
        if !is_name_reference(node) {
            return;
        }
        let name = text(node, src);
        if self.denylist.contains_reference(name) {
            issues.push(ValidationIssue::new(
                IssueKind::DisallowedNameReference,
                format!("reference to '{name}' is disallowed"),
            ));
        }
    }
}

fn report(issues: Vec<ValidationIssue>) -> ValidationReport {
    ValidationReport { issues }
}

fn syntax_invalid() -> ValidationIssue {
    ValidationIssue::new(
        IssueKind::SyntaxInvalid,
        "script is not syntactically valid Python",
    )
}

fn text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

/// `(object, attribute)` for a simple `name.attr` node. Chained or computed
/// receivers (`a.b.c`, `get()[0].x`) have no simple object name and are not
/// matched, same as the denylist tables themselves.
fn attribute_pair<'a>(node: Node<'_>, src: &'a str) -> Option<(&'a str, &'a str)> {
    let object = node.child_by_field_name("object")?;
    if object.kind() != "identifier" {
        return None;
    }
    let attribute = node.child_by_field_name("attribute")?;
    Some((text(object, src), text(attribute, src)))
}

/// Whether a top-level `def main` exists, directly or under decorators.
fn has_top_level_main(root: Node<'_>, src: &str) -> bool {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let def = match child.kind() {
            "function_definition" => Some(child),
            "decorated_definition" => child
                .child_by_field_name("definition")
                .filter(|definition| definition.kind() == "function_definition"),
            _ => None,
        };
        if let Some(def) = def
            && let Some(name) = def.child_by_field_name("name")
            && text(name, src) == "main"
        {
            return true;
        }
    }
    false
}

/// Whether an identifier node is a plain name reference, as opposed to a
/// definition name, parameter, attribute member, keyword, or import segment.
fn is_name_reference(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    let is_field = |field: &str| {
        parent
            .child_by_field_name(field)
            .is_some_and(|child| child.id() == node.id())
    };
    match parent.kind() {
        "attribute" => is_field("object"),
        "function_definition" | "class_definition" => !is_field("name"),
        "keyword_argument" | "default_parameter" | "typed_default_parameter" => !is_field("name"),
        "parameters" | "lambda_parameters" | "typed_parameter" => false,
        "dotted_name" | "aliased_import" | "import_statement" | "import_from_statement"
        | "import_prefix" | "relative_import" | "wildcard_import" => false,
        "global_statement" | "nonlocal_statement" => false,
        _ => true,
    }
}

fn dedupe(issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
    let mut seen: Vec<ValidationIssue> = Vec::new();
    for issue in issues {
        if !seen.iter().any(|kept| kept.message == issue.message) {
            seen.push(issue);
        }
    }
    seen
}
