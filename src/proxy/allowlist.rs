use regex::Regex;

/// Upstream paths the gateway will forward. A `*` segment matches exactly
/// one path segment - no slashes, so `lists/*/webhooks.json` does not match
/// nested paths.
const ALLOWED_PATHS: &[&str] = &[
    // Account-level endpoints
    "clients.json",
    "billingdetails.json",
    "countries.json",
    "timezones.json",
    "systemdate.json",
    // Client-level endpoints
    "clients/*.json",
    "clients/*/lists.json",
    "clients/*/segments.json",
    "clients/*/suppressionlist.json",
    "clients/*/templates.json",
    // List-level endpoints
    "lists/*.json",
    "lists/*/stats.json",
    "lists/*/customfields.json",
    "lists/*/segments.json",
    "lists/*/webhooks.json",
    "lists/*/webhooks/*.json",
];

/// Compiled allow-list matcher for upstream API paths.
pub struct AllowList {
    patterns: Vec<Regex>,
}

impl AllowList {
    pub fn new() -> Self {
        let patterns = ALLOWED_PATHS
            .iter()
            .map(|path| {
                let pattern = regex::escape(path).replace(r"\*", "[^/]+");
                Regex::new(&format!("^{pattern}$")).expect("allow-list patterns are fixed and valid")
            })
            .collect();
        Self { patterns }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_account_paths() {
        let allow = AllowList::new();
        assert!(allow.is_allowed("clients.json"));
        assert!(allow.is_allowed("billingdetails.json"));
        assert!(allow.is_allowed("systemdate.json"));
        assert!(!allow.is_allowed("admin.json"));
        assert!(!allow.is_allowed("subscribers.json"));
    }

    #[test]
    fn test_wildcard_matches_one_segment() {
        let allow = AllowList::new();
        assert!(allow.is_allowed("clients/4a397ccaaa55eb4e6aa1221e1e2d7122/lists.json"));
        assert!(allow.is_allowed("lists/a58ee1d3039b8bec838e6d1482a8a965/webhooks.json"));
        assert!(allow.is_allowed("lists/abc/webhooks/def.json"));

        // Wildcards never span segments.
        assert!(!allow.is_allowed("clients/a/b/lists.json"));
        assert!(!allow.is_allowed("lists/a/b/webhooks.json"));
    }

    #[test]
    fn test_patterns_are_anchored() {
        let allow = AllowList::new();
        assert!(!allow.is_allowed("prefix/clients.json"));
        assert!(!allow.is_allowed("clients.json/suffix"));
        assert!(!allow.is_allowed("clients.jsonx"));
    }

    #[test]
    fn test_dots_are_literal() {
        let allow = AllowList::new();
        // The '.' in '.json' must not act as a regex wildcard.
        assert!(!allow.is_allowed("clientsxjson"));
    }

    #[test]
    fn test_write_targets_on_list() {
        let allow = AllowList::new();
        // Webhook create/delete targets must be reachable.
        assert!(allow.is_allowed("lists/x/webhooks.json"));
        assert!(allow.is_allowed("lists/x/webhooks/y.json"));
        assert!(!allow.is_allowed("lists/x/webhooks/y/z.json"));
    }
}
