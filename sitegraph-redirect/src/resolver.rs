use crate::counters::HitCounters;
use crate::matcher::{match_normalized, normalize_url};
use crate::result::{Hop, ResolutionStatus, ResolvedRedirect};
use crate::rule::RuleSet;
use std::collections::HashSet;
use std::thread;
use tracing::{debug, warn};

pub const DEFAULT_MAX_HOPS: usize = 5;

/// Follows redirect rules from a URL to its final destination.
///
/// Hit counts go to the supplied counter store; every rule traversed during
/// one `resolve` call is counted once, however many times it was applied.
pub struct Resolver<'a> {
    rules: &'a RuleSet,
    counters: &'a HitCounters,
    max_hops: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(rules: &'a RuleSet, counters: &'a HitCounters) -> Self {
        Self {
            rules,
            counters,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn resolve(&self, url: &str) -> ResolvedRedirect {
        let source = normalize_url(url);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(source.clone());

        let mut current = source.clone();
        let mut hops: Vec<Hop> = Vec::new();
        let mut traversed: Vec<usize> = Vec::new();

        let status = loop {
            let Some(best) = match_normalized(&current, self.rules).into_iter().next() else {
                break if hops.is_empty() {
                    ResolutionStatus::NoMatch
                } else {
                    ResolutionStatus::Resolved
                };
            };

            if hops.len() >= self.max_hops {
                warn!(
                    "Redirect chain from {} exceeds {} hops (stopped at {})",
                    source, self.max_hops, current
                );
                break ResolutionStatus::MaxHopsExceeded;
            }

            let next = best.rule.apply(&current);
            debug!("{} -> {} via rule {}", current, next, best.rule.id());

            hops.push(Hop {
                from: current.clone(),
                to: next.clone(),
                rule_id: best.rule.id().to_string(),
                kind: best.rule.rule.kind,
            });
            if !traversed.contains(&best.index) {
                traversed.push(best.index);
            }

            let revisited = !visited.insert(next.clone());
            current = next;
            if revisited {
                warn!("Redirect loop detected starting at {} (revisits {})", source, current);
                break ResolutionStatus::CycleDetected;
            }
        };

        for index in traversed {
            self.counters.increment(index);
        }

        ResolvedRedirect {
            source,
            destination: current,
            hops,
            status,
        }
    }

    /// Resolves many URLs across a pool of scoped worker threads.
    ///
    /// URLs are dealt round-robin to the workers; results come back in input
    /// order.
    pub fn resolve_batch(&self, urls: &[String], workers: usize) -> Vec<ResolvedRedirect> {
        let workers = workers.max(1).min(urls.len().max(1));
        if workers == 1 {
            return urls.iter().map(|url| self.resolve(url)).collect();
        }

        debug!("Resolving {} URLs with {} workers", urls.len(), workers);

        let mut slots: Vec<Option<ResolvedRedirect>> = vec![None; urls.len()];
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker_id| {
                    scope.spawn(move || {
                        urls.iter()
                            .enumerate()
                            .skip(worker_id)
                            .step_by(workers)
                            .map(|(index, url)| (index, self.resolve(url)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(resolved) => {
                        for (index, result) in resolved {
                            slots[index] = Some(result);
                        }
                    }
                    Err(_) => warn!("Redirect worker panicked"),
                }
            }
        });

        slots
            .into_iter()
            .zip(urls.iter())
            .map(|(slot, url)| slot.unwrap_or_else(|| ResolvedRedirect::no_match(normalize_url(url))))
            .collect()
    }
}

/// One-shot resolution with an explicit hop limit.
pub fn resolve(
    url: &str,
    rules: &RuleSet,
    counters: &HitCounters,
    max_hops: usize,
) -> ResolvedRedirect {
    Resolver::new(rules, counters)
        .with_max_hops(max_hops)
        .resolve(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RedirectKind, RedirectRule};

    fn compile(rules: Vec<RedirectRule>) -> RuleSet {
        RuleSet::compile(rules).unwrap()
    }

    #[test]
    fn test_no_match_leaves_url_unchanged() {
        let rules = compile(vec![RedirectRule::new("r1", "/a", "/b")]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/shoes/", &rules, &counters, 5);

        assert_eq!(resolved.status, ResolutionStatus::NoMatch);
        assert_eq!(resolved.destination, "/shoes");
        assert!(resolved.hops.is_empty());
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_single_hop_resolves() {
        let rules = compile(vec![RedirectRule::new("r1", "/old", "/new")]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/old", &rules, &counters, 5);

        assert_eq!(resolved.status, ResolutionStatus::Resolved);
        assert_eq!(resolved.destination, "/new");
        assert_eq!(resolved.trace(), vec!["/old", "/new"]);
        assert_eq!(counters.get_by_id("r1"), 1);
    }

    #[test]
    fn test_chain_follows_every_hop() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/a", "/b"),
            RedirectRule::new("r2", "/b", "/c"),
            RedirectRule::new("r3", "/c", "/d"),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/a", &rules, &counters, 5);

        assert_eq!(resolved.status, ResolutionStatus::Resolved);
        assert_eq!(resolved.destination, "/d");
        assert_eq!(resolved.hop_count(), 3);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn test_wildcard_precedence_by_priority() {
        let rules = compile(vec![
            RedirectRule::new("content", "/blog/*", "/content/*").with_priority(2),
            RedirectRule::new("archive", "/blog/2024/*", "/archive/*").with_priority(1),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/blog/2024/post", &rules, &counters, 5);

        assert_eq!(resolved.destination, "/archive/post");
        assert_eq!(resolved.hops[0].rule_id, "archive");
        assert_eq!(counters.get_by_id("content"), 0);
    }

    #[test]
    fn test_two_rule_cycle_is_detected() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/a", "/b"),
            RedirectRule::new("r2", "/b", "/a"),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/a", &rules, &counters, 5);

        assert_eq!(resolved.status, ResolutionStatus::CycleDetected);
        assert_eq!(resolved.trace(), vec!["/a", "/b", "/a"]);
        assert_eq!(counters.get_by_id("r1"), 1);
        assert_eq!(counters.get_by_id("r2"), 1);
    }

    #[test]
    fn test_wildcard_to_literal_loop_is_detected() {
        let rules = compile(vec![RedirectRule::new("r1", "/shop/*", "/shop")]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/shop/hats", &rules, &counters, 5);

        assert_eq!(resolved.status, ResolutionStatus::CycleDetected);
        assert_eq!(resolved.trace(), vec!["/shop/hats", "/shop", "/shop"]);
        assert_eq!(counters.get_by_id("r1"), 1);
    }

    #[test]
    fn test_max_hops_exceeded() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/1", "/2"),
            RedirectRule::new("r2", "/2", "/3"),
            RedirectRule::new("r3", "/3", "/4"),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/1", &rules, &counters, 2);

        assert_eq!(resolved.status, ResolutionStatus::MaxHopsExceeded);
        assert_eq!(resolved.hop_count(), 2);
        assert_eq!(resolved.destination, "/3");
        assert!(resolved.is_broken());
    }

    #[test]
    fn test_chain_of_exactly_max_hops_resolves() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/1", "/2"),
            RedirectRule::new("r2", "/2", "/3"),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/1", &rules, &counters, 2);
        assert_eq!(resolved.status, ResolutionStatus::Resolved);
    }

    #[test]
    fn test_growing_wildcard_hits_hop_limit() {
        let rules = compile(vec![RedirectRule::new("r1", "/a/*", "/a/b/*")]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/a/x", &rules, &counters, 5);

        assert_eq!(resolved.status, ResolutionStatus::MaxHopsExceeded);
        assert_eq!(counters.get_by_id("r1"), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/old/*", "/new/*"),
            RedirectRule::new("r2", "/new/legacy", "/new/current"),
        ]);
        let counters = HitCounters::new(&rules);
        let first = resolve("/old/legacy", &rules, &counters, 5);
        assert_eq!(first.destination, "/new/current");

        let second = resolve(&first.destination, &rules, &counters, 5);
        assert_eq!(second.status, ResolutionStatus::NoMatch);
        assert_eq!(second.destination, first.destination);
    }

    #[test]
    fn test_disabled_rule_is_ignored() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/a", "/b").with_enabled(false),
            RedirectRule::new("r2", "/a", "/c").with_priority(10),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/a", &rules, &counters, 5);
        assert_eq!(resolved.destination, "/c");
    }

    #[test]
    fn test_temporary_hop_makes_chain_non_permanent() {
        let rules = compile(vec![
            RedirectRule::new("r1", "/a", "/b"),
            RedirectRule::new("r2", "/b", "/c").with_kind(RedirectKind::Found),
        ]);
        let counters = HitCounters::new(&rules);
        let resolved = resolve("/a", &rules, &counters, 5);
        assert!(!resolved.is_permanent());
    }

    #[test]
    fn test_batch_preserves_order_and_counts() {
        let rules = compile(vec![RedirectRule::new("r1", "/old/*", "/new/*")]);
        let counters = HitCounters::new(&rules);
        let urls: Vec<String> = (0..200).map(|i| format!("/old/item-{}", i)).collect();

        let resolved = Resolver::new(&rules, &counters).resolve_batch(&urls, 4);

        assert_eq!(resolved.len(), 200);
        for (i, result) in resolved.iter().enumerate() {
            assert_eq!(result.destination, format!("/new/item-{}", i));
        }
        assert_eq!(counters.get_by_id("r1"), 200);
    }
}
