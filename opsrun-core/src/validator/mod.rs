//! Script Validator - deny-list screening of raw script text
//!
//! Screens a script for known-destructive cmdlets and dangerous idioms before
//! anything is executed. The screening is purely lexical: no parsing, no
//! evaluation. Obfuscated or semantically-equivalent constructs will pass -
//! this is a documented limitation of the deny-list approach, not a gap to
//! close silently (callers depend on the observable behavior).

use tracing::debug;

pub mod rules;

#[cfg(test)]
mod tests;

use rules::{DangerousPatternRule, RestrictedCommandRule};

/// Outcome of screening one script. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    passed: bool,
    issues: Vec<String>,
}

impl ValidationResult {
    /// A passing result with no issues.
    pub fn passing() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
        }
    }

    /// Build a result from the collected issue list; passes iff empty.
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Issue strings in the order the screening rules produced them.
    pub fn issues(&self) -> &[String] {
        &self.issues
    }
}

/// Trait for screening rules
pub trait ScreeningRule: Send + Sync {
    /// Check the script text, returning one issue string per finding
    fn check(&self, script: &str) -> Vec<String>;

    /// Rule identifier
    fn rule_id(&self) -> &'static str;

    /// Rule description
    fn description(&self) -> &'static str;
}

/// Main script validator
pub struct ScriptValidator {
    rules: Vec<Box<dyn ScreeningRule>>,
}

impl ScriptValidator {
    /// Create validator with the default deny-list rules
    pub fn new() -> Self {
        let rules: Vec<Box<dyn ScreeningRule>> = vec![
            Box::new(RestrictedCommandRule),
            Box::new(DangerousPatternRule),
        ];

        Self { rules }
    }

    /// Screen a script against the deny-list.
    ///
    /// With restrictions disabled the script passes unconditionally - this is
    /// the privileged-caller bypass. The flag is a per-call capability input
    /// decided by the orchestrating layer, never ambient state of the
    /// validator.
    pub fn check(&self, script: &str, restrictions_enabled: bool) -> ValidationResult {
        if !restrictions_enabled {
            debug!("Restrictions disabled - skipping deny-list screening");
            return ValidationResult::passing();
        }

        let mut issues = Vec::new();
        for rule in &self.rules {
            let found = rule.check(script);
            if !found.is_empty() {
                debug!("Rule '{}' flagged {} issue(s)", rule.rule_id(), found.len());
            }
            issues.extend(found);
        }

        ValidationResult::from_issues(issues)
    }
}

impl Default for ScriptValidator {
    fn default() -> Self {
        Self::new()
    }
}
