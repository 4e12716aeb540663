// Analysis session: runs full passes and hands out versioned results

use crate::analyzer::{Depth, EquityOutcome, Roots, compute_depths, compute_equity, find_orphans};
use crate::cancel::CancelToken;
use crate::cannibal::{self, KeywordVerdict};
use crate::config::AnalysisConfig;
use crate::error::{CoreError, Result};
use crate::graph::{GraphBuilder, LinkGraph};
use crate::model::{Page, Snapshot};
use crate::result::{AnalysisFlag, AnalysisResult, EquitySummary, PageMetrics};
use chrono::Utc;
use sitegraph_redirect::{
    HitCounters, RedirectRule, ResolvedRedirect, Resolver, RuleAudit, RuleSet, audit_rules,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task;
use tracing::{debug, info, warn};

/// Holds the active rule set, the cumulative hit counters and the latest
/// result. Every pass works on its own copy of the inputs and either
/// publishes a complete result or nothing.
pub struct AnalysisSession {
    config: AnalysisConfig,
    rules: RwLock<Arc<RuleSet>>,
    counters: RwLock<Arc<HitCounters>>,
    version: AtomicU64,
    latest: RwLock<Option<Arc<AnalysisResult>>>,
}

struct GraphOutcome {
    graph: Arc<LinkGraph>,
    roots: Roots,
    depths: Vec<Depth>,
    orphans: Vec<bool>,
    equity: EquityOutcome,
}

impl AnalysisSession {
    /// Compiles the rules and validates the configuration. Hit totals carried
    /// on the rules seed the cumulative counters.
    pub fn new(rules: Vec<RedirectRule>, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let rules = RuleSet::compile(rules)?;
        let counters = HitCounters::from_rule_totals(&rules);
        info!(
            "Analysis session ready with {} rules ({} enabled)",
            rules.len(),
            rules.enabled_count()
        );

        Ok(Self {
            config,
            rules: RwLock::new(Arc::new(rules)),
            counters: RwLock::new(Arc::new(counters)),
            version: AtomicU64::new(0),
            latest: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn rules(&self) -> Arc<RuleSet> {
        self.rules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn counters(&self) -> Arc<HitCounters> {
        self.counters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swaps in a new rule set for later passes. Cumulative hits carry over
    /// for rule ids present in both sets.
    pub fn replace_rules(&self, rules: Vec<RedirectRule>) -> Result<()> {
        let rules = RuleSet::compile(rules)?;
        let counters = HitCounters::new(&rules);

        // Held across the swap so no pass merges into the store being replaced
        let mut current = self
            .counters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters.merge(&current);
        *self
            .rules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(rules);
        *current = Arc::new(counters);
        drop(current);

        info!("Rule set replaced");
        Ok(())
    }

    /// Adds one finished pass to the cumulative totals.
    fn merge_hits(&self, pass_counters: &HitCounters) {
        self.counters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .merge(pass_counters);
    }

    /// The most recently published result, if any pass has completed.
    pub fn latest(&self) -> Option<Arc<AnalysisResult>> {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Cumulative hits per rule id across every completed pass.
    pub fn hit_counts(&self) -> BTreeMap<String, u64> {
        self.counters().snapshot()
    }

    /// Resolves one URL against the active rules without touching hit counts.
    pub fn test_redirect(&self, url: &str) -> ResolvedRedirect {
        let rules = self.rules();
        let scratch = HitCounters::new(&rules);
        Resolver::new(&rules, &scratch)
            .with_max_hops(self.config.max_hops)
            .resolve(url)
    }

    pub fn audit(&self) -> RuleAudit {
        audit_rules(&self.rules(), self.config.max_hops)
    }

    /// Runs one full pass: graph build, depth/orphan/equity analysis and
    /// cannibalization detection. Graph work and keyword grouping run as
    /// parallel blocking tasks.
    pub async fn run(&self, snapshot: Snapshot, cancel: &CancelToken) -> Result<Arc<AnalysisResult>> {
        cancel.check()?;
        let rules = self.rules();
        let config = self.config.clone();
        let snapshot = Arc::new(snapshot);
        let roots: Vec<String> = config.roots.iter().map(|r| snapshot.localize(r)).collect();

        if snapshot.is_empty() {
            warn!("Snapshot has no pages, publishing an empty result");
            let result = AnalysisResult {
                run_id: uuid::Uuid::new_v4().to_string(),
                version: self.next_version(),
                generated_at: Utc::now(),
                roots,
                pages: Vec::new(),
                keywords: Vec::new(),
                equity: EquitySummary {
                    converged: true,
                    seed_mass: config.equity.seed_mass,
                    ..EquitySummary::default()
                },
                links: Default::default(),
                broken_links: Vec::new(),
                rule_hits: BTreeMap::new(),
                flags: vec![AnalysisFlag::EmptySnapshot],
            };
            return Ok(self.publish(result));
        }

        info!(
            "Starting analysis pass: {} pages, {} links",
            snapshot.pages.len(),
            snapshot.links.len()
        );
        let pass_counters = Arc::new(HitCounters::new(&rules));

        let graph_task = analyze_graph(
            snapshot.clone(),
            rules.clone(),
            pass_counters.clone(),
            config.clone(),
            roots.clone(),
            cancel.clone(),
        );
        let keyword_task = {
            let snapshot = snapshot.clone();
            let config = config.clone();
            task::spawn_blocking(move || detect_keywords(&snapshot, &config))
        };

        let (outcome, keywords) =
            tokio::try_join!(graph_task, async { keyword_task.await? })?;
        cancel.check()?;

        let GraphOutcome {
            graph,
            roots: resolved_roots,
            depths,
            orphans,
            equity,
        } = outcome;

        let mut flags = Vec::new();
        if !equity.converged {
            flags.push(AnalysisFlag::ConvergenceNotReached);
        }
        if graph.stats().redirect_loops > 0 {
            flags.push(AnalysisFlag::RedirectLoops);
        }
        if graph.stats().redirect_hop_limits > 0 {
            flags.push(AnalysisFlag::RedirectHopLimit);
        }
        if resolved_roots.nodes.is_empty() {
            flags.push(AnalysisFlag::MissingRoots);
        }

        let pages: Vec<PageMetrics> = graph
            .graph()
            .node_indices()
            .map(|node| {
                let i = node.index();
                PageMetrics {
                    path: graph.path(node).to_string(),
                    title: graph.pages()[i].title.clone(),
                    depth: depths[i],
                    orphan: orphans[i],
                    equity: equity.normalized[i],
                    raw_equity: equity.raw[i],
                    inbound_links: graph.inbound_links(node),
                    outbound_links: graph.outbound_links(node),
                }
            })
            .collect();

        // Only a finished pass contributes to the cumulative totals
        let rule_hits = pass_counters.non_zero();
        self.merge_hits(&pass_counters);

        let result = AnalysisResult {
            run_id: uuid::Uuid::new_v4().to_string(),
            version: self.next_version(),
            generated_at: Utc::now(),
            roots,
            pages,
            keywords,
            equity: EquitySummary {
                iterations: equity.iterations,
                residual: equity.residual,
                converged: equity.converged,
                seed_mass: config.equity.seed_mass,
            },
            links: graph.stats().clone(),
            broken_links: graph.broken_links().to_vec(),
            rule_hits,
            flags,
        };

        info!(
            "Analysis pass v{} complete: {} pages, {} keyword groups, {} flags",
            result.version,
            result.pages.len(),
            result.keywords.len(),
            result.flags.len()
        );
        Ok(self.publish(result))
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, result: AnalysisResult) -> Arc<AnalysisResult> {
        let result = Arc::new(result);
        let mut latest = self
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Two overlapping passes may finish out of order
        let newer = latest
            .as_ref()
            .map(|current| current.version < result.version)
            .unwrap_or(true);
        if newer {
            *latest = Some(result.clone());
        }
        result
    }
}

async fn analyze_graph(
    snapshot: Arc<Snapshot>,
    rules: Arc<RuleSet>,
    counters: Arc<HitCounters>,
    config: AnalysisConfig,
    roots: Vec<String>,
    cancel: CancelToken,
) -> Result<GraphOutcome> {
    let graph = {
        let cancel = cancel.clone();
        let max_hops = config.max_hops;
        let workers = config.workers;
        task::spawn_blocking(move || {
            GraphBuilder::new(&rules, &counters)
                .with_max_hops(max_hops)
                .with_workers(workers)
                .with_cancel(&cancel)
                .build(&snapshot)
        })
        .await??
    };
    let graph = Arc::new(graph);

    let roots = Roots::resolve(&graph, &roots);
    for missing in &roots.missing {
        warn!("Root page {} is not in the snapshot", missing);
    }

    let depth_task = {
        let graph = graph.clone();
        let roots = roots.clone();
        task::spawn_blocking(move || (compute_depths(&graph, &roots), find_orphans(&graph, &roots)))
    };
    let equity_task = {
        let graph = graph.clone();
        let roots = roots.clone();
        let equity_config = config.equity.clone();
        task::spawn_blocking(move || compute_equity(&graph, &roots, &equity_config, Some(&cancel)))
    };

    let ((depths, orphans), equity) = tokio::try_join!(
        async { depth_task.await.map_err(CoreError::from) },
        async { equity_task.await? },
    )?;
    debug!(
        "Graph analysis done: {} orphans",
        orphans.iter().filter(|o| **o).count()
    );

    Ok(GraphOutcome {
        graph,
        roots,
        depths,
        orphans,
        equity,
    })
}

/// Keyword grouping over localized pages, first occurrence of a path wins.
fn detect_keywords(snapshot: &Snapshot, config: &AnalysisConfig) -> Result<Vec<KeywordVerdict>> {
    let mut seen = HashSet::new();
    let pages: Vec<Page> = snapshot
        .pages
        .iter()
        .filter_map(|page| {
            let path = snapshot.localize(&page.path);
            seen.insert(path.clone()).then(|| Page {
                path,
                ..page.clone()
            })
        })
        .collect();

    Ok(cannibal::detect(&pages, &config.cannibalization))
}
