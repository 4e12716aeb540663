pub mod audit;
pub mod counters;
pub mod error;
pub mod matcher;
pub mod resolver;
pub mod result;
pub mod rule;

pub use audit::{AuditFinding, AuditIssue, RuleAudit, audit_rules};
pub use counters::HitCounters;
pub use error::RedirectError;
pub use matcher::{RuleMatch, best_match, match_url, normalize_url};
pub use resolver::{DEFAULT_MAX_HOPS, Resolver, resolve};
pub use result::{Hop, ResolutionStatus, ResolvedRedirect};
pub use rule::{RedirectKind, RedirectRule, RuleSet};
