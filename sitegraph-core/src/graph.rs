// Link graph construction from a crawl snapshot

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::{LinkStatus, Page, Snapshot};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use sitegraph_redirect::{
    DEFAULT_MAX_HOPS, HitCounters, ResolutionStatus, ResolvedRedirect, Resolver, RuleSet,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One collapsed edge: every raw link between an ordered pair of pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub count: usize,
    pub follow_count: usize,
    pub anchors: Vec<String>,
}

impl EdgeData {
    /// Nofollow-only edges are kept for depth but carry no equity.
    pub fn passes_equity(&self) -> bool {
        self.follow_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFlag {
    Broken,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokenReason {
    RedirectLoop,
    RedirectHopLimit,
    CrawledBroken,
}

impl BrokenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokenReason::RedirectLoop => "redirect loop",
            BrokenReason::RedirectHopLimit => "redirect hop limit",
            BrokenReason::CrawledBroken => "broken at crawl time",
        }
    }
}

/// A link that did not become an internal edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: String,
    pub href: String,
    pub target: String,
    pub flag: LinkFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<BrokenReason>,
    pub hops: usize,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub raw_links: usize,
    pub internal_links: usize,
    pub internal_edges: usize,
    pub broken: usize,
    pub external: usize,
    pub self_links: usize,
    pub nofollow: usize,
    pub redirected: usize,
    pub unknown_source: usize,
    pub redirect_loops: usize,
    pub redirect_hop_limits: usize,
}

/// Directed page graph. Every edge is internal and points at a fully
/// resolved page; broken and external links live beside the graph.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    graph: DiGraph<String, EdgeData>,
    index: HashMap<String, NodeIndex>,
    pages: Vec<Page>,
    inbound_links: Vec<usize>,
    outbound_links: Vec<usize>,
    broken: Vec<LinkRecord>,
    external: Vec<LinkRecord>,
    stats: LinkStats,
}

impl LinkGraph {
    pub fn graph(&self) -> &DiGraph<String, EdgeData> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Pages with normalized paths, positioned by node index.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn node(&self, path: &str) -> Option<NodeIndex> {
        self.index.get(path).copied()
    }

    pub fn path(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&EdgeData> {
        let a = self.node(source)?;
        let b = self.node(target)?;
        let edge = self.graph.find_edge(a, b)?;
        self.graph.edge_weight(edge)
    }

    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.edges(node).map(|e| e.target())
    }

    /// Targets of edges that pass equity.
    pub fn followed_successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges(node)
            .filter(|e| e.weight().passes_equity())
            .map(|e| e.target())
    }

    pub fn in_degree(&self, node: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .count()
    }

    /// Raw internal links pointing at the page, before collapsing.
    pub fn inbound_links(&self, node: NodeIndex) -> usize {
        self.inbound_links.get(node.index()).copied().unwrap_or(0)
    }

    /// Raw links of every kind found on the page.
    pub fn outbound_links(&self, node: NodeIndex) -> usize {
        self.outbound_links.get(node.index()).copied().unwrap_or(0)
    }

    pub fn broken_links(&self) -> &[LinkRecord] {
        &self.broken
    }

    pub fn external_links(&self) -> &[LinkRecord] {
        &self.external
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

pub struct GraphBuilder<'a> {
    rules: &'a RuleSet,
    counters: &'a HitCounters,
    max_hops: usize,
    workers: usize,
    cancel: Option<&'a CancelToken>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(rules: &'a RuleSet, counters: &'a HitCounters) -> Self {
        Self {
            rules,
            counters,
            max_hops: DEFAULT_MAX_HOPS,
            workers: 1,
            cancel: None,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    pub fn build(&self, snapshot: &Snapshot) -> Result<LinkGraph> {
        let mut graph = LinkGraph::default();

        // Pages first so every link can be classified against them
        for page in &snapshot.pages {
            let path = snapshot.localize(&page.path);
            if graph.index.contains_key(&path) {
                warn!("Duplicate page {} in snapshot, keeping the first", path);
                continue;
            }
            let node = graph.graph.add_node(path.clone());
            graph.index.insert(path.clone(), node);
            graph.pages.push(Page {
                path,
                ..page.clone()
            });
        }
        graph.inbound_links = vec![0; graph.pages.len()];
        graph.outbound_links = vec![0; graph.pages.len()];
        self.check_cancelled()?;

        // Links from unknown pages are dropped before resolution so they never count hits
        let mut sourced = Vec::with_capacity(snapshot.links.len());
        for link in &snapshot.links {
            graph.stats.raw_links += 1;
            if link.nofollow {
                graph.stats.nofollow += 1;
            }

            let source_path = snapshot.localize(&link.source);
            match graph.node(&source_path) {
                Some(source) => sourced.push((link, source, source_path)),
                None => {
                    warn!("Link from unknown page {} skipped", source_path);
                    graph.stats.unknown_source += 1;
                }
            }
        }

        let hrefs: Vec<String> = sourced
            .iter()
            .map(|(link, _, _)| snapshot.localize(&link.target))
            .collect();
        let resolutions = Resolver::new(self.rules, self.counters)
            .with_max_hops(self.max_hops)
            .resolve_batch(&hrefs, self.workers);
        self.check_cancelled()?;

        let mut record_positions: HashMap<(LinkFlag, String, String), usize> = HashMap::new();

        for (((link, source, source_path), href), resolution) in
            sourced.into_iter().zip(hrefs).zip(resolutions)
        {
            if resolution.is_redirected() {
                graph.stats.redirected += 1;
            }
            graph.outbound_links[source.index()] += 1;

            let broken_reason = if link.status == LinkStatus::Broken {
                Some(BrokenReason::CrawledBroken)
            } else {
                match resolution.status {
                    ResolutionStatus::CycleDetected => {
                        graph.stats.redirect_loops += 1;
                        Some(BrokenReason::RedirectLoop)
                    }
                    ResolutionStatus::MaxHopsExceeded => {
                        graph.stats.redirect_hop_limits += 1;
                        Some(BrokenReason::RedirectHopLimit)
                    }
                    _ => None,
                }
            };

            if let Some(reason) = broken_reason {
                graph.stats.broken += 1;
                push_record(
                    &mut graph.broken,
                    &mut record_positions,
                    &source_path,
                    &href,
                    &resolution,
                    LinkFlag::Broken,
                    Some(reason),
                );
                continue;
            }

            let target_path = snapshot.localize(&resolution.destination);
            let Some(target) = graph.node(&target_path) else {
                graph.stats.external += 1;
                push_record(
                    &mut graph.external,
                    &mut record_positions,
                    &source_path,
                    &href,
                    &ResolvedRedirect {
                        destination: target_path,
                        ..resolution
                    },
                    LinkFlag::External,
                    None,
                );
                continue;
            };

            graph.stats.internal_links += 1;
            if source == target {
                graph.stats.self_links += 1;
                continue;
            }
            graph.inbound_links[target.index()] += 1;

            let edge = match graph.graph.find_edge(source, target) {
                Some(edge) => edge,
                None => graph.graph.add_edge(source, target, EdgeData::default()),
            };
            let data = &mut graph.graph[edge];
            data.count += 1;
            if !link.nofollow {
                data.follow_count += 1;
            }
            let anchor = link.anchor.trim();
            if !anchor.is_empty() && !data.anchors.iter().any(|a| a == anchor) {
                data.anchors.push(anchor.to_string());
            }
        }
        self.check_cancelled()?;

        graph.stats.internal_edges = graph.graph.edge_count();
        debug!("Link stats: {:?}", graph.stats);
        info!(
            "Built link graph: {} pages, {} edges, {} broken, {} external",
            graph.node_count(),
            graph.edge_count(),
            graph.stats.broken,
            graph.stats.external
        );

        Ok(graph)
    }
}

fn push_record(
    records: &mut Vec<LinkRecord>,
    positions: &mut HashMap<(LinkFlag, String, String), usize>,
    source: &str,
    href: &str,
    resolution: &ResolvedRedirect,
    flag: LinkFlag,
    reason: Option<BrokenReason>,
) {
    let key = (flag, source.to_string(), href.to_string());
    if let Some(&position) = positions.get(&key) {
        records[position].count += 1;
        return;
    }
    positions.insert(key, records.len());
    records.push(LinkRecord {
        source: source.to_string(),
        href: href.to_string(),
        target: resolution.destination.clone(),
        flag,
        reason,
        hops: resolution.hop_count(),
        count: 1,
    });
}

/// Builds a graph with default limits and a single worker.
pub fn build_graph(
    snapshot: &Snapshot,
    rules: &RuleSet,
    counters: &HitCounters,
) -> Result<LinkGraph> {
    GraphBuilder::new(rules, counters).build(snapshot)
}
