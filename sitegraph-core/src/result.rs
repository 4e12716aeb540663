// Versioned analysis results

use crate::analyzer::Depth;
use crate::cannibal::{KeywordVerdict, Recommendation};
use crate::graph::{LinkRecord, LinkStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFlag {
    EmptySnapshot,
    ConvergenceNotReached,
    RedirectLoops,
    RedirectHopLimit,
    MissingRoots,
}

impl AnalysisFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisFlag::EmptySnapshot => "empty_snapshot",
            AnalysisFlag::ConvergenceNotReached => "convergence_not_reached",
            AnalysisFlag::RedirectLoops => "redirect_loops",
            AnalysisFlag::RedirectHopLimit => "redirect_hop_limit",
            AnalysisFlag::MissingRoots => "missing_roots",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnalysisFlag::EmptySnapshot => "snapshot contained no pages",
            AnalysisFlag::ConvergenceNotReached => {
                "link equity hit the iteration cap before converging"
            }
            AnalysisFlag::RedirectLoops => "some links end in a redirect loop",
            AnalysisFlag::RedirectHopLimit => "some links exceed the redirect hop limit",
            AnalysisFlag::MissingRoots => "no configured root page exists in the snapshot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub path: String,
    pub title: String,
    pub depth: Depth,
    pub orphan: bool,
    /// 0-100, relative to the strongest page.
    pub equity: f64,
    pub raw_equity: f64,
    pub inbound_links: usize,
    pub outbound_links: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquitySummary {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
    pub seed_mass: f64,
}

/// Immutable output of one session run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: String,
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub roots: Vec<String>,
    pub pages: Vec<PageMetrics>,
    pub keywords: Vec<KeywordVerdict>,
    pub equity: EquitySummary,
    pub links: LinkStats,
    pub broken_links: Vec<LinkRecord>,
    /// Hits recorded by this run only, keyed by rule id.
    pub rule_hits: BTreeMap<String, u64>,
    pub flags: Vec<AnalysisFlag>,
}

impl AnalysisResult {
    pub fn page(&self, path: &str) -> Option<&PageMetrics> {
        self.pages.iter().find(|p| p.path == path)
    }

    pub fn has_flag(&self, flag: AnalysisFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn orphans(&self) -> impl Iterator<Item = &PageMetrics> {
        self.pages.iter().filter(|p| p.orphan)
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &PageMetrics> {
        self.pages.iter().filter(|p| !p.depth.is_reachable())
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.pages.iter().filter_map(|p| p.depth.value()).max()
    }

    pub fn keyword(&self, keyword: &str) -> Option<&KeywordVerdict> {
        self.keywords.iter().find(|k| k.group.keyword == keyword)
    }

    pub fn recommendation_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for verdict in &self.keywords {
            *counts.entry(verdict.recommendation.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Pages sorted by equity, strongest first.
    pub fn top_pages(&self, limit: usize) -> Vec<&PageMetrics> {
        let mut pages: Vec<&PageMetrics> = self.pages.iter().collect();
        pages.sort_by(|a, b| b.equity.total_cmp(&a.equity).then_with(|| a.path.cmp(&b.path)));
        pages.truncate(limit);
        pages
    }

    pub fn actionable_keywords(&self) -> impl Iterator<Item = &KeywordVerdict> {
        self.keywords
            .iter()
            .filter(|k| k.recommendation != Recommendation::Monitor)
    }
}
