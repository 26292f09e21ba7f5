//! Screening rules backed by the fixed deny-lists

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::ScreeningRule;

/// Cmdlets known to be destructive or to enable arbitrary code execution:
/// deletion of files/VMs/services/accounts, disabling protections, dynamic
/// expression evaluation, starting arbitrary processes.
pub const RESTRICTED_COMMANDS: &[&str] = &[
    "Remove-Item",
    "Remove-Computer",
    "Remove-ADUser",
    "Format-Volume",
    "Clear-Disk",
    "Initialize-Disk",
    "Remove-VM",
    "Remove-VMHost",
    "Remove-Datacenter",
    "Invoke-Expression",
    "Invoke-Command",
    "Start-Process",
    "New-Service",
    "Stop-Service",
    "Disable-WindowsOptionalFeature",
    "Uninstall-WindowsFeature",
    "Set-ExecutionPolicy",
    "Remove-Module",
];

/// Dangerous idioms the command deny-list alone would miss: recursive force
/// deletes, redirect-into-overwrite, downloaded payloads piped into dynamic
/// evaluation, and shorthand evaluation invocations.
pub const DANGEROUS_PATTERNS: &[&str] = &[
    r"rm\s+-rf",
    r"del\s+/[fs]",
    r"\|\s*Out-File\s+.*>",
    r"Invoke-WebRequest.*\|.*Invoke-Expression",
    r"iex\s*\(",
    r"&\s*\(",
];

static RESTRICTED_COMMAND_REGEXES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    RESTRICTED_COMMANDS
        .iter()
        .map(|command| {
            let regex = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(command)))
                .case_insensitive(true)
                .build()
                .expect("restricted command regex must compile");
            (*command, regex)
        })
        .collect()
});

static DANGEROUS_PATTERN_REGEXES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    DANGEROUS_PATTERNS
        .iter()
        .map(|pattern| {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("dangerous pattern regex must compile");
            (*pattern, regex)
        })
        .collect()
});

/// Rule: whole-word, case-insensitive match against the restricted cmdlet list
pub struct RestrictedCommandRule;

impl ScreeningRule for RestrictedCommandRule {
    fn rule_id(&self) -> &'static str {
        "restricted-command"
    }

    fn description(&self) -> &'static str {
        "Deny-listed cmdlets that delete infrastructure or enable arbitrary code execution"
    }

    fn check(&self, script: &str) -> Vec<String> {
        let mut issues = Vec::new();

        for (command, regex) in RESTRICTED_COMMAND_REGEXES.iter() {
            if regex.is_match(script) {
                issues.push(format!("Restricted cmdlet detected: {command}"));
            }
        }

        issues
    }
}

/// Rule: case-insensitive match against the dangerous idiom patterns
pub struct DangerousPatternRule;

impl ScreeningRule for DangerousPatternRule {
    fn rule_id(&self) -> &'static str {
        "dangerous-pattern"
    }

    fn description(&self) -> &'static str {
        "Dangerous idioms: recursive force deletes, overwrite redirection, download-and-eval"
    }

    fn check(&self, script: &str) -> Vec<String> {
        let mut issues = Vec::new();

        for (pattern, regex) in DANGEROUS_PATTERN_REGEXES.iter() {
            if regex.is_match(script) {
                issues.push(format!("Dangerous pattern detected: {pattern}"));
            }
        }

        issues
    }
}
