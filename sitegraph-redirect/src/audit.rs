// Health checks for a redirect rule set

use crate::counters::HitCounters;
use crate::matcher::{best_match, match_url};
use crate::resolver::Resolver;
use crate::result::{ResolutionStatus, ResolvedRedirect};
use crate::rule::{CompiledRule, Pattern, RuleSet};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditIssue {
    /// Source takes more than one hop to reach its destination.
    Chain { hops: usize },
    Loop,
    HopLimit,
    /// A chain that mixes in 302/307 hops and so does not pass full value.
    TemporaryInChain,
    /// Another rule always takes precedence over this one.
    Shadowed { by: String },
}

impl AuditIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditIssue::Chain { .. } => "chain",
            AuditIssue::Loop => "loop",
            AuditIssue::HopLimit => "hop_limit",
            AuditIssue::TemporaryInChain => "temporary_in_chain",
            AuditIssue::Shadowed { .. } => "shadowed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFinding {
    pub rule_id: String,
    pub sample_url: String,
    pub issue: AuditIssue,
    pub resolution: ResolvedRedirect,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleAudit {
    pub rules_checked: usize,
    pub findings: Vec<AuditFinding>,
}

impl RuleAudit {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count(&self, issue: &str) -> usize {
        self.findings
            .iter()
            .filter(|f| f.issue.as_str() == issue)
            .count()
    }
}

/// Resolves the source of every enabled rule and reports chains, loops and
/// shadowed rules. Audit resolutions are not counted as rule hits.
pub fn audit_rules(rules: &RuleSet, max_hops: usize) -> RuleAudit {
    let scratch = HitCounters::new(rules);
    let resolver = Resolver::new(rules, &scratch).with_max_hops(max_hops);
    let mut audit = RuleAudit::default();

    for compiled in rules.rules().iter().filter(|r| r.rule.enabled) {
        audit.rules_checked += 1;

        let sample_url = match &compiled.source {
            Pattern::Literal(literal) => literal.clone(),
            Pattern::Prefix(prefix) if prefix.is_empty() => "/".to_string(),
            Pattern::Prefix(prefix) => prefix.clone(),
        };

        if let Some(by) = shadowed_by(compiled, &sample_url, rules) {
            audit.findings.push(AuditFinding {
                rule_id: compiled.id().to_string(),
                sample_url: sample_url.clone(),
                issue: AuditIssue::Shadowed {
                    by: by.id().to_string(),
                },
                resolution: resolver.resolve(&sample_url),
            });
            continue;
        }

        let resolution = resolver.resolve(&sample_url);
        let issue = match resolution.status {
            ResolutionStatus::CycleDetected => Some(AuditIssue::Loop),
            ResolutionStatus::MaxHopsExceeded => Some(AuditIssue::HopLimit),
            _ if resolution.hop_count() > 1 && !resolution.is_permanent() => {
                Some(AuditIssue::TemporaryInChain)
            }
            _ if resolution.hop_count() > 1 => Some(AuditIssue::Chain {
                hops: resolution.hop_count(),
            }),
            _ => None,
        };

        if let Some(issue) = issue {
            audit.findings.push(AuditFinding {
                rule_id: compiled.id().to_string(),
                sample_url,
                issue,
                resolution,
            });
        }
    }

    info!(
        "Audited {} rules: {} findings",
        audit.rules_checked,
        audit.findings.len()
    );
    audit
}

/// The rule that wins over `compiled` on every URL `compiled` matches.
///
/// A literal only matches its own URL, so the winner on that URL shadows it.
/// A wildcard also matches every deeper path, which only another wildcard
/// covering its prefix can take over; a literal never shadows a wildcard.
fn shadowed_by<'a>(
    compiled: &CompiledRule,
    sample_url: &str,
    rules: &'a RuleSet,
) -> Option<&'a CompiledRule> {
    let winner = if compiled.source.is_wildcard() {
        match_url(sample_url, rules)
            .into_iter()
            .find(|m| m.rule.source.is_wildcard())?
    } else {
        best_match(sample_url, rules)?
    };

    (winner.rule.id() != compiled.id()).then_some(winner.rule)
}
