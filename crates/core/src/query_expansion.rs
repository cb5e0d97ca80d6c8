//! Closed abbreviation/synonym table used to widen the keyword leg of a
//! hybrid search before it reaches the full-text store.

use std::collections::HashMap;

pub struct QueryExpansion {
    table: HashMap<&'static str, &'static [&'static str]>,
}

const DEFAULT_ENTRIES: &[(&str, &[&str])] = &[
    ("auth", &["authentication", "authorization"]),
    ("authn", &["authentication"]),
    ("authz", &["authorization"]),
    ("config", &["configuration"]),
    ("cfg", &["config", "configuration"]),
    ("db", &["database"]),
    ("repo", &["repository"]),
    ("impl", &["implementation"]),
    ("fn", &["function"]),
    ("func", &["function"]),
    ("init", &["initialize", "initialization"]),
    ("conn", &["connection"]),
    ("ctx", &["context"]),
    ("req", &["request"]),
    ("res", &["response"]),
    ("resp", &["response"]),
    ("err", &["error"]),
    ("exc", &["exception"]),
    ("msg", &["message"]),
    ("pkg", &["package"]),
    ("dep", &["dependency"]),
    ("deps", &["dependencies"]),
    ("env", &["environment"]),
    ("var", &["variable"]),
    ("vars", &["variables"]),
    ("param", &["parameter"]),
    ("params", &["parameters"]),
    ("arg", &["argument"]),
    ("args", &["arguments"]),
    ("async", &["asynchronous"]),
    ("sync", &["synchronous"]),
    ("auth.", &["authentication"]),
    ("mgr", &["manager"]),
    ("mgmt", &["management"]),
    ("admin", &["administrator"]),
    ("info", &["information"]),
    ("temp", &["temporary"]),
    ("tmp", &["temporary"]),
    ("util", &["utility"]),
    ("utils", &["utilities"]),
    ("lib", &["library"]),
    ("ref", &["reference"]),
    ("refs", &["references"]),
    ("dir", &["directory"]),
    ("idx", &["index"]),
];

impl Default for QueryExpansion {
    fn default() -> Self {
        Self { table: DEFAULT_ENTRIES.iter().copied().collect() }
    }
}

impl QueryExpansion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct from an arbitrary table, for tests that want deterministic
    /// control over which terms expand.
    pub fn with_table(entries: &[(&'static str, &'static [&'static str])]) -> Self {
        Self { table: entries.iter().copied().collect() }
    }

    /// Expand a query string into itself plus every synonym of every token
    /// that has an entry, deduplicated, original order preserved.
    pub fn expand(&self, query: &str) -> String {
        let mut seen: Vec<String> = Vec::new();
        let mut push_unique = |term: &str| {
            if !seen.iter().any(|s| s.eq_ignore_ascii_case(term)) {
                seen.push(term.to_string());
            }
        };

        for token in query.split_whitespace() {
            push_unique(token);
            let lower = token.to_lowercase();
            if let Some(synonyms) = self.table.get(lower.as_str()) {
                for syn in *synonyms {
                    push_unique(syn);
                }
            }
        }
        seen.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_abbreviation() {
        let qe = QueryExpansion::new();
        let expanded = qe.expand("auth flow");
        assert!(expanded.contains("authentication"));
        assert!(expanded.contains("authorization"));
        assert!(expanded.contains("flow"));
    }

    #[test]
    fn leaves_unknown_terms_untouched() {
        let qe = QueryExpansion::new();
        assert_eq!(qe.expand("banana"), "banana");
    }

    #[test]
    fn deduplicates_synonyms_already_present() {
        let qe = QueryExpansion::new();
        let expanded = qe.expand("config configuration");
        let count = expanded.matches("configuration").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn with_table_overrides_default_entries() {
        let qe = QueryExpansion::with_table(&[("foo", &["bar"])]);
        assert_eq!(qe.expand("foo"), "foo bar");
        assert_eq!(qe.expand("auth"), "auth");
    }
}
