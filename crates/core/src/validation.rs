//! Rule-violation reporting shared by the rule engine and the error model.

use serde::{Deserialize, Serialize};

/// Severity of a rule violation.
///
/// Only `Error` violations block a write; `Warning` violations are reported
/// alongside the result and left to the caller to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single named rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    /// Stable rule name (e.g. "no_circular_ownership").
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}

impl RuleViolation {
    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Aggregated outcome of running a set of validation rules.
///
/// Every violation is collected (never just the first), partitioned into
/// blocking errors and non-blocking warnings. `passed` records the names of
/// rules that evaluated clean, for the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<RuleViolation>,
    pub warnings: Vec<RuleViolation>,
    pub passed: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no error-severity violation was recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a violation into the matching partition.
    pub fn push(&mut self, violation: RuleViolation) {
        match violation.severity {
            Severity::Error => self.errors.push(violation),
            Severity::Warning => self.warnings.push(violation),
        }
    }

    /// Record a rule that evaluated without violation.
    pub fn push_passed(&mut self, rule: impl Into<String>) {
        self.passed.push(rule.into());
    }

    /// Names of all error-severity rules that failed, in evaluation order.
    pub fn failed_rules(&self) -> Vec<&str> {
        self.errors.iter().map(|v| v.rule.as_str()).collect()
    }
}

impl core::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )?;
        for v in &self.errors {
            write!(f, "; {}: {}", v.rule, v.message)?;
        }
        Ok(())
    }
}
