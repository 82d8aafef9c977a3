//! String template rendering utilities.
//!
//! Command templates use `{{name}}` placeholders. Rendering is plain text
//! substitution; quoting policy is decided by the caller when it builds the
//! substitution values.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("valid regex"))
}

pub fn render_map(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

/// List every `{{name}}` placeholder in a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_re()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Placeholders in `template` with no binding in `variables`.
pub fn unbound(template: &str, variables: &HashMap<String, String>) -> Vec<String> {
    placeholders(template)
        .into_iter()
        .filter(|name| !variables.contains_key(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn render_replaces_all_occurrences() {
        let v = vars(&[("branch", "develop"), ("remote", "origin")]);
        assert_eq!(
            render_map("git pull --ff-only {{remote}} {{branch}}", &v),
            "git pull --ff-only origin develop"
        );
    }

    #[test]
    fn placeholders_in_order() {
        assert_eq!(
            placeholders("rsync {{src}}/ {{dest}} {{src}}"),
            vec!["src", "dest", "src"]
        );
    }

    #[test]
    fn unbound_reports_missing_only() {
        let v = vars(&[("queue", "batch1")]);
        assert_eq!(
            unbound("batch_simulate -q {{queue}} {{config}}", &v),
            vec!["config"]
        );
    }

    #[test]
    fn non_placeholder_braces_ignored() {
        assert!(placeholders("awk '{print $1}'").is_empty());
    }
}
