use crate::rule::RedirectKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    CycleDetected,
    MaxHopsExceeded,
    NoMatch,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::CycleDetected => "cycle_detected",
            ResolutionStatus::MaxHopsExceeded => "max_hops_exceeded",
            ResolutionStatus::NoMatch => "no_match",
        }
    }

    /// Whether the destination is trustworthy as a final URL.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolutionStatus::Resolved | ResolutionStatus::NoMatch)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub from: String,
    pub to: String,
    pub rule_id: String,
    pub kind: RedirectKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRedirect {
    pub source: String,
    pub destination: String,
    pub hops: Vec<Hop>,
    pub status: ResolutionStatus,
}

impl ResolvedRedirect {
    pub fn no_match(url: String) -> Self {
        Self {
            source: url.clone(),
            destination: url,
            hops: Vec::new(),
            status: ResolutionStatus::NoMatch,
        }
    }

    /// URLs visited in order, starting with the source.
    pub fn trace(&self) -> Vec<String> {
        let mut trace = Vec::with_capacity(self.hops.len() + 1);
        trace.push(self.source.clone());
        trace.extend(self.hops.iter().map(|hop| hop.to.clone()));
        trace
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn is_redirected(&self) -> bool {
        !self.hops.is_empty()
    }

    /// True only if every hop is a permanent redirect.
    pub fn is_permanent(&self) -> bool {
        self.hops.iter().all(|hop| hop.kind.is_permanent())
    }

    pub fn is_broken(&self) -> bool {
        !self.status.is_terminal()
    }
}
