// Depth, orphan and link-equity analysis over a built link graph

use crate::cancel::CancelToken;
use crate::config::EquityConfig;
use crate::error::Result;
use crate::graph::LinkGraph;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use sitegraph_redirect::normalize_url;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Reachable(u32),
    Unreachable,
}

impl Depth {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Depth::Reachable(_))
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            Depth::Reachable(depth) => Some(*depth),
            Depth::Unreachable => None,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Reachable(depth) => write!(f, "{}", depth),
            Depth::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Root pages that exist in the graph, plus the configured ones that don't.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roots {
    pub nodes: Vec<NodeIndex>,
    pub missing: Vec<String>,
}

impl Roots {
    pub fn resolve(graph: &LinkGraph, configured: &[String]) -> Self {
        let mut roots = Roots::default();
        for root in configured {
            let path = normalize_url(root);
            match graph.node(&path) {
                Some(node) if !roots.nodes.contains(&node) => roots.nodes.push(node),
                Some(_) => {}
                None => roots.missing.push(path),
            }
        }
        roots
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.nodes.contains(&node)
    }
}

/// Shortest internal-link distance from any root, by node index.
pub fn compute_depths(graph: &LinkGraph, roots: &Roots) -> Vec<Depth> {
    let mut depths = vec![Depth::Unreachable; graph.node_count()];
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();

    for &root in &roots.nodes {
        depths[root.index()] = Depth::Reachable(0);
        queue.push_back(root);
    }

    while let Some(node) = queue.pop_front() {
        let Depth::Reachable(depth) = depths[node.index()] else {
            continue;
        };
        for next in graph.successors(node) {
            if depths[next.index()] == Depth::Unreachable {
                depths[next.index()] = Depth::Reachable(depth + 1);
                queue.push_back(next);
            }
        }
    }

    depths
}

/// A page is orphaned when no internal edge points at it and it is not a root.
pub fn find_orphans(graph: &LinkGraph, roots: &Roots) -> Vec<bool> {
    graph
        .graph()
        .node_indices()
        .map(|node| !roots.contains(node) && graph.in_degree(node) == 0)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityOutcome {
    /// Scores before normalization; they sum to the seed mass.
    pub raw: Vec<f64>,
    /// Scores scaled so the strongest page is 100.
    pub normalized: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub residual: f64,
}

impl EquityOutcome {
    fn empty() -> Self {
        Self {
            raw: Vec::new(),
            normalized: Vec::new(),
            iterations: 0,
            converged: true,
            residual: 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.raw.iter().sum()
    }
}

/// Damped equity propagation seeded at the roots.
///
/// Each iteration a page sends `damping` of its score evenly along its
/// followed edges. Whatever is not sent (the undamped share, and everything
/// held by pages without followed links) returns to the roots, so the total
/// stays equal to the seed mass. Without usable roots the seed is spread
/// over every page.
pub fn compute_equity(
    graph: &LinkGraph,
    roots: &Roots,
    config: &EquityConfig,
    cancel: Option<&CancelToken>,
) -> Result<EquityOutcome> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(EquityOutcome::empty());
    }

    let seed: Vec<f64> = if roots.nodes.is_empty() {
        vec![1.0 / n as f64; n]
    } else {
        let mut seed = vec![0.0; n];
        let share = 1.0 / roots.nodes.len() as f64;
        for root in &roots.nodes {
            seed[root.index()] = share;
        }
        seed
    };

    let outgoing: Vec<Vec<usize>> = graph
        .graph()
        .node_indices()
        .map(|node| graph.followed_successors(node).map(|t| t.index()).collect())
        .collect();

    let mass = config.seed_mass;
    let threshold = config.tolerance * mass;
    let mut scores: Vec<f64> = seed.iter().map(|s| s * mass).collect();
    let mut iterations = 0;
    let mut residual = f64::INFINITY;
    let mut converged = false;

    while iterations < config.max_iterations {
        if let Some(token) = cancel {
            token.check()?;
        }
        iterations += 1;

        let mut next = vec![0.0; n];
        let mut distributed = 0.0;
        for (node, targets) in outgoing.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = config.damping * scores[node] / targets.len() as f64;
            for &target in targets {
                next[target] += share;
            }
            distributed += config.damping * scores[node];
        }

        let current_total: f64 = scores.iter().sum();
        let returned = current_total - distributed;
        for (node, weight) in seed.iter().enumerate() {
            next[node] += returned * weight;
        }

        residual = next
            .iter()
            .zip(scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        scores = next;

        if residual < threshold {
            converged = true;
            break;
        }
    }

    if converged {
        debug!("Equity converged after {} iterations", iterations);
    } else {
        warn!(
            "Equity did not converge after {} iterations (residual {:.6})",
            iterations, residual
        );
    }

    let max = scores.iter().cloned().fold(0.0_f64, f64::max);
    let normalized = if max > 0.0 {
        scores.iter().map(|s| s / max * 100.0).collect()
    } else {
        vec![0.0; n]
    };

    Ok(EquityOutcome {
        raw: scores,
        normalized,
        iterations,
        converged,
        residual,
    })
}
