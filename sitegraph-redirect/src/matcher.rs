use crate::rule::{CompiledRule, RuleSet};
use std::cmp::Ordering;
use url::Url;

/// A rule that matched a URL, with the length used for tie-breaking.
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub index: usize,
    pub rule: &'a CompiledRule,
    pub match_length: usize,
}

impl RuleMatch<'_> {
    /// Precedence order: lowest priority value, then longest match, then
    /// earliest rule. `Ordering::Less` means `self` wins.
    pub fn precedence(&self, other: &RuleMatch<'_>) -> Ordering {
        self.rule
            .rule
            .priority
            .cmp(&other.rule.rule.priority)
            .then_with(|| other.match_length.cmp(&self.match_length))
            .then_with(|| self.rule.order.cmp(&other.rule.order))
    }
}

/// Normalizes a URL or site path for rule comparison.
///
/// Absolute URLs keep their origin with scheme and host lower-cased; bare
/// paths stay paths. Fragments are dropped, duplicate slashes collapsed and
/// the trailing slash removed everywhere except the root.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw.contains("://")
        && let Ok(parsed) = Url::parse(raw)
        && parsed.has_host()
    {
        let mut origin = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
        if let Some(port) = parsed.port() {
            origin.push_str(&format!(":{}", port));
        }
        let path = normalize_path(parsed.path());
        let query = parsed
            .query()
            .map(|q| format!("?{}", q))
            .unwrap_or_default();
        return format!("{}{}{}", origin, path, query);
    }

    let without_fragment = raw.split('#').next().unwrap_or("");
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let mut normalized = normalize_path(path);
    if let Some(query) = query
        && !query.is_empty()
    {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}

fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Returns every enabled rule matching `url`. An empty list means no redirect.
pub fn match_url<'a>(url: &str, rules: &'a RuleSet) -> Vec<RuleMatch<'a>> {
    let url = normalize_url(url);
    match_normalized(&url, rules)
}

pub(crate) fn match_normalized<'a>(url: &str, rules: &'a RuleSet) -> Vec<RuleMatch<'a>> {
    let mut matches = Vec::new();

    let candidates = rules
        .literal_candidates(url)
        .iter()
        .chain(rules.wildcard_candidates().iter());

    for &index in candidates {
        let Some(rule) = rules.get(index) else {
            continue;
        };
        if !rule.rule.enabled {
            continue;
        }
        if let Some(match_length) = rule.source.match_length(url) {
            matches.push(RuleMatch {
                index,
                rule,
                match_length,
            });
        }
    }

    matches.sort_by(|a, b| a.precedence(b));
    matches
}

/// Highest-precedence match for `url`, if any.
pub fn best_match<'a>(url: &str, rules: &'a RuleSet) -> Option<RuleMatch<'a>> {
    match_url(url, rules).into_iter().next()
}
