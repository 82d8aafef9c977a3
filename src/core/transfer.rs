//! Run-directory mirroring.
//!
//! A push mirrors one local run directory to the remote runs area with an
//! ordered include/exclude filter: the four file classes a run needs (config,
//! geometry macros, data, text) pass, everything else is excluded. Order is
//! first-match-wins, so the catch-all exclude must come last. `--delete` is
//! deliberate: the remote copy is an exact mirror, and stale files from
//! earlier pushes would otherwise leak into new simulations.

use glob_match::glob_match;

use crate::utils::shell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    Include(String),
    Exclude(String),
}

impl FilterRule {
    pub fn include(pattern: &str) -> Self {
        FilterRule::Include(pattern.to_string())
    }

    pub fn exclude(pattern: &str) -> Self {
        FilterRule::Exclude(pattern.to_string())
    }

    fn pattern(&self) -> &str {
        match self {
            FilterRule::Include(p) | FilterRule::Exclude(p) => p,
        }
    }
}

/// The filter set for simulation run directories.
pub fn run_filters() -> Vec<FilterRule> {
    vec![
        FilterRule::include("*.cfg"),
        FilterRule::include("*.C"),
        FilterRule::include("*.dta"),
        FilterRule::include("*.txt"),
        FilterRule::exclude("*"),
    ]
}

/// First-match-wins evaluation, mirroring rsync's filter semantics. A file
/// matching no rule is transferred.
pub fn is_transferred(rules: &[FilterRule], file_name: &str) -> bool {
    for rule in rules {
        if glob_match(rule.pattern(), file_name) {
            return matches!(rule, FilterRule::Include(_));
        }
    }
    true
}

/// Render rules as rsync arguments, preserving order.
pub fn rsync_filter_args(rules: &[FilterRule]) -> String {
    rules
        .iter()
        .map(|rule| match rule {
            FilterRule::Include(p) => format!("--include={}", shell::quote_arg(p)),
            FilterRule::Exclude(p) => format!("--exclude={}", shell::quote_arg(p)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_files_pass_the_filter() {
        let rules = run_filters();
        assert!(is_transferred(&rules, "setup.cfg"));
        assert!(is_transferred(&rules, "model_cryoedm_geom.C"));
        assert!(is_transferred(&rules, "fields.dta"));
        assert!(is_transferred(&rules, "notes.txt"));
    }

    #[test]
    fn everything_else_is_excluded() {
        let rules = run_filters();
        assert!(!is_transferred(&rules, "run.log"));
        assert!(!is_transferred(&rules, "initial.root"));
        assert!(!is_transferred(&rules, "core.12345"));
    }

    #[test]
    fn order_is_first_match_wins() {
        // Moving the catch-all exclude first swallows everything.
        let reordered = vec![
            FilterRule::exclude("*"),
            FilterRule::include("*.cfg"),
        ];
        assert!(!is_transferred(&reordered, "setup.cfg"));
    }

    #[test]
    fn rsync_args_preserve_order() {
        let args = rsync_filter_args(&run_filters());
        assert_eq!(
            args,
            "--include='*.cfg' --include='*.C' --include='*.dta' --include='*.txt' --exclude='*'"
        );
        let exclude_pos = args.find("--exclude='*'").unwrap();
        let include_pos = args.find("--include='*.cfg'").unwrap();
        assert!(include_pos < exclude_pos);
    }
}
