//! Parameter Binder - turns a typed parameter map into script-local variables
//!
//! Parameters become variable-assignment statements prepended to the script
//! body, never text spliced into command arguments. Assignment generation is
//! the injection defense: a value can only ever be a PowerShell literal on
//! the right-hand side of `=`.

use serde_json::{Map, Value};
use tracing::warn;

/// Marker comment separating generated assignments from the script body.
const PARAMETER_MARKER: &str = "# Auto-generated parameters";

/// Prepend one assignment statement per parameter to the script body.
/// Returns the script unchanged when there is nothing to bind.
pub fn compose(script: &str, parameters: &Map<String, Value>) -> String {
    if parameters.is_empty() {
        return script.to_string();
    }

    let mut assignments = Vec::with_capacity(parameters.len());

    for (name, value) in parameters {
        let safe_name = sanitize_name(name);
        if safe_name.is_empty() {
            // An empty identifier would compose an unrunnable script.
            warn!("Parameter name {:?} has no usable characters, skipping", name);
            continue;
        }

        assignments.push(assignment(&safe_name, value));
    }

    if assignments.is_empty() {
        return script.to_string();
    }

    format!("{PARAMETER_MARKER}\n{}\n\n{script}", assignments.join("\n"))
}

/// Strip every character outside `[A-Za-z0-9_]`. Primary injection defense
/// for parameter names.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn assignment(name: &str, value: &Value) -> String {
    match value {
        // Single-quoted literal; embedded single quotes doubled. PowerShell
        // performs no interpolation inside single quotes.
        Value::String(s) => format!("${name} = '{}'", escape_single_quotes(s)),
        Value::Bool(true) => format!("${name} = $true"),
        Value::Bool(false) => format!("${name} = $false"),
        // Bare numeric literal, unquoted.
        Value::Number(n) => format!("${name} = {n}"),
        // Structured values travel as JSON and are rehydrated in-script so
        // the variable holds a native object, not a string.
        other => {
            let json = escape_single_quotes(&other.to_string());
            format!("${name} = '{json}' | ConvertFrom-Json")
        }
    }
}

fn escape_single_quotes(raw: &str) -> String {
    raw.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_map_returns_script_unchanged() {
        let script = "Get-VM | Format-Table";
        assert_eq!(compose(script, &Map::new()), script);
    }

    #[test]
    fn string_parameter_becomes_single_quoted_assignment() {
        let composed = compose("Write-Output $Target", &params(&[("Target", json!("esx-01"))]));

        assert_eq!(
            composed,
            "# Auto-generated parameters\n$Target = 'esx-01'\n\nWrite-Output $Target"
        );
    }

    #[test]
    fn body_appears_unmodified_after_the_blank_line() {
        let body = "$a = 1\nWrite-Output $a\n# trailing comment";
        let composed = compose(body, &params(&[("x", json!(1))]));

        let (_, tail) = composed.split_once("\n\n").unwrap();
        assert_eq!(tail, body);
        assert!(composed.starts_with("# Auto-generated parameters\n"));
    }

    #[test]
    fn embedded_single_quotes_are_doubled_and_balanced() {
        let composed = compose("", &params(&[("msg", json!("it's o'clock"))]));

        assert!(composed.contains("$msg = 'it''s o''clock'"));
        // Balanced quoting: the assignment line carries an even quote count.
        let assignment_line = composed.lines().nth(1).unwrap();
        assert_eq!(assignment_line.matches('\'').count() % 2, 0);
    }

    #[test]
    fn booleans_use_powershell_literals() {
        let composed = compose(
            "",
            &params(&[("DryRun", json!(true)), ("Force", json!(false))]),
        );

        assert!(composed.contains("$DryRun = $true"));
        assert!(composed.contains("$Force = $false"));
    }

    #[test]
    fn numbers_are_bare_literals() {
        let composed = compose(
            "",
            &params(&[("Count", json!(42)), ("Ratio", json!(2.5))]),
        );

        assert!(composed.contains("$Count = 42"));
        assert!(composed.contains("$Ratio = 2.5"));
    }

    #[test]
    fn structured_values_round_trip_through_convertfrom_json() {
        let composed = compose(
            "",
            &params(&[("Hosts", json!({"primary": "esx-01", "count": 2}))]),
        );

        assert!(composed.contains(
            r#"$Hosts = '{"count":2,"primary":"esx-01"}' | ConvertFrom-Json"#
        ));
    }

    #[test]
    fn names_are_stripped_to_identifier_characters() {
        let composed = compose("", &params(&[("host-name;rm", json!("a"))]));

        assert!(composed.contains("$hostnamerm = 'a'"));
    }

    #[test]
    fn name_with_no_usable_characters_is_skipped() {
        let script = "Write-Output ok";
        let composed = compose(script, &params(&[("$();", json!("a"))]));

        // The sole parameter was dropped, so the script passes through as-is.
        assert_eq!(composed, script);
    }

    #[test]
    fn each_assignment_is_on_its_own_line() {
        let composed = compose(
            "body",
            &params(&[("A", json!("1")), ("B", json!("2")), ("C", json!(3))]),
        );

        let header: Vec<&str> = composed.split("\n\n").next().unwrap().lines().collect();
        assert_eq!(header.len(), 4); // marker + three assignments
    }
}
