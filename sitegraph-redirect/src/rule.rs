use crate::error::{RedirectError, Result};
use crate::matcher::normalize_url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// HTTP redirect class of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectKind {
    #[default]
    MovedPermanently,
    Found,
    TemporaryRedirect,
    PermanentRedirect,
}

impl RedirectKind {
    pub fn status_code(&self) -> u16 {
        match self {
            RedirectKind::MovedPermanently => 301,
            RedirectKind::Found => 302,
            RedirectKind::TemporaryRedirect => 307,
            RedirectKind::PermanentRedirect => 308,
        }
    }

    /// Permanent redirects pass ranking signals to the destination.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            RedirectKind::MovedPermanently | RedirectKind::PermanentRedirect
        )
    }

    pub fn preserves_method(&self) -> bool {
        matches!(
            self,
            RedirectKind::TemporaryRedirect | RedirectKind::PermanentRedirect
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectKind::MovedPermanently => "301 moved permanently",
            RedirectKind::Found => "302 found",
            RedirectKind::TemporaryRedirect => "307 temporary redirect",
            RedirectKind::PermanentRedirect => "308 permanent redirect",
        }
    }
}

impl TryFrom<u16> for RedirectKind {
    type Error = String;

    fn try_from(code: u16) -> std::result::Result<Self, Self::Error> {
        match code {
            301 => Ok(RedirectKind::MovedPermanently),
            302 => Ok(RedirectKind::Found),
            307 => Ok(RedirectKind::TemporaryRedirect),
            308 => Ok(RedirectKind::PermanentRedirect),
            other => Err(format!("unsupported redirect status {}", other)),
        }
    }
}

impl From<RedirectKind> for u16 {
    fn from(kind: RedirectKind) -> Self {
        kind.status_code()
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

fn default_enabled() -> bool {
    true
}

/// A redirect rule as supplied by the rule manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub id: String,
    pub source: String,
    pub destination: String,
    #[serde(default, alias = "status_code")]
    pub kind: RedirectKind,
    /// Lower value wins.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub hits: u64,
}

impl RedirectRule {
    pub fn new(id: &str, source: &str, destination: &str) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            kind: RedirectKind::default(),
            priority: 0,
            enabled: true,
            hits: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_kind(mut self, kind: RedirectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_hits(mut self, hits: u64) -> Self {
        self.hits = hits;
        self
    }
}

/// Compiled form of a source or destination pattern.
///
/// `Prefix` holds the normalized part before the trailing `/*`; the empty
/// prefix comes from a bare `/*` and covers every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Literal(String),
    Prefix(String),
}

impl Pattern {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("pattern is empty".to_string());
        }

        let (body, wildcard) = match raw.strip_suffix("/*") {
            Some(body) => (body, true),
            None => (raw, false),
        };

        if body.contains('*') {
            return Err(format!(
                "'{}' has a wildcard that is not a trailing '/*'",
                raw
            ));
        }

        if wildcard && body.is_empty() {
            return Ok(Pattern::Prefix(String::new()));
        }

        if !body.starts_with('/') && !is_absolute(body) {
            return Err(format!("'{}' is neither a path nor an absolute URL", raw));
        }

        let normalized = normalize_url(body);
        if wildcard {
            Ok(Pattern::Prefix(normalized.trim_end_matches('/').to_string()))
        } else {
            Ok(Pattern::Literal(normalized))
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Pattern::Prefix(_))
    }

    /// Match length for a normalized URL, or `None` when it does not match.
    pub fn match_length(&self, url: &str) -> Option<usize> {
        match self {
            Pattern::Literal(literal) => (literal == url).then_some(literal.len()),
            Pattern::Prefix(prefix) if prefix.is_empty() => url.starts_with('/').then_some(0),
            Pattern::Prefix(prefix) => {
                let rest = url.strip_prefix(prefix.as_str())?;
                if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                    Some(prefix.len())
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(literal) => write!(f, "{}", literal),
            Pattern::Prefix(prefix) => write!(f, "{}/*", prefix),
        }
    }
}

fn is_absolute(raw: &str) -> bool {
    raw.contains("://") && url::Url::parse(raw).is_ok()
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: RedirectRule,
    pub source: Pattern,
    pub destination: Pattern,
    /// Position in the supplied rule list, used as creation order.
    pub order: usize,
}

impl CompiledRule {
    /// Computes the next URL for a normalized URL this rule matched.
    pub fn apply(&self, url: &str) -> String {
        let remainder = match &self.source {
            Pattern::Prefix(prefix) => &url[prefix.len().min(url.len())..],
            Pattern::Literal(_) => "",
        };

        let next = match &self.destination {
            Pattern::Literal(literal) => literal.clone(),
            Pattern::Prefix(prefix) => format!("{}{}", prefix, remainder),
        };

        if next.is_empty() {
            "/".to_string()
        } else {
            normalize_url(&next)
        }
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }
}

/// Validated, immutable rule set shared by every resolution in a pass.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    literal_index: HashMap<String, Vec<usize>>,
    wildcard_rules: Vec<usize>,
    by_id: HashMap<String, usize>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates and compiles rules. Any malformed rule rejects the whole set.
    pub fn compile(rules: Vec<RedirectRule>) -> Result<Self> {
        let mut set = RuleSet::default();

        for (order, rule) in rules.into_iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(RedirectError::invalid_rule(&rule.id, "rule id is empty"));
            }
            if set.by_id.contains_key(&rule.id) {
                return Err(RedirectError::DuplicateRuleId(rule.id));
            }

            let source = Pattern::parse(&rule.source)
                .map_err(|reason| RedirectError::invalid_rule(&rule.id, reason))?;
            let destination = Pattern::parse(&rule.destination)
                .map_err(|reason| RedirectError::invalid_rule(&rule.id, reason))?;

            if destination.is_wildcard() && !source.is_wildcard() {
                return Err(RedirectError::invalid_rule(
                    &rule.id,
                    "wildcard destination requires a wildcard source",
                ));
            }
            if source == destination {
                return Err(RedirectError::invalid_rule(
                    &rule.id,
                    "source and destination are identical",
                ));
            }

            let index = set.rules.len();
            match &source {
                Pattern::Literal(literal) => {
                    set.literal_index.entry(literal.clone()).or_default().push(index)
                }
                Pattern::Prefix(_) => set.wildcard_rules.push(index),
            }
            set.by_id.insert(rule.id.clone(), index);
            set.rules.push(CompiledRule {
                rule,
                source,
                destination,
                order,
            });
        }

        debug!(
            "Compiled {} redirect rules ({} wildcard)",
            set.rules.len(),
            set.wildcard_rules.len()
        );
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.rule.enabled).count()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn get(&self, index: usize) -> Option<&CompiledRule> {
        self.rules.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn literal_candidates(&self, url: &str) -> &[usize] {
        self.literal_index
            .get(url)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn wildcard_candidates(&self) -> &[usize] {
        &self.wildcard_rules
    }
}
