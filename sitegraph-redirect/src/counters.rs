use crate::rule::RuleSet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Arena of per-rule hit counters, indexed like the `RuleSet` it was built for.
///
/// Increments are lock-free so any number of resolutions can share one store.
#[derive(Debug)]
pub struct HitCounters {
    ids: Vec<String>,
    counts: Vec<AtomicU64>,
}

impl HitCounters {
    /// Zeroed counters, one per rule.
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            ids: rules.rules().iter().map(|r| r.rule.id.clone()).collect(),
            counts: rules.rules().iter().map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Counters seeded with the hit totals carried on each rule.
    pub fn from_rule_totals(rules: &RuleSet) -> Self {
        Self {
            ids: rules.rules().iter().map(|r| r.rule.id.clone()).collect(),
            counts: rules
                .rules()
                .iter()
                .map(|r| AtomicU64::new(r.rule.hits))
                .collect(),
        }
    }

    pub fn increment(&self, index: usize) {
        if let Some(counter) = self.counts.get(index) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self, index: usize) -> u64 {
        self.counts
            .get(index)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn get_by_id(&self, id: &str) -> u64 {
        self.ids
            .iter()
            .position(|candidate| candidate == id)
            .map(|index| self.get(index))
            .unwrap_or(0)
    }

    /// Adds every count of `other` into this store, matching by rule id.
    pub fn merge(&self, other: &HitCounters) {
        for (id, count) in other.non_zero() {
            if let Some(index) = self.ids.iter().position(|candidate| candidate == &id) {
                self.counts[index].fetch_add(count, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.ids
            .iter()
            .zip(self.counts.iter())
            .map(|(id, count)| (id.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Only the rules that were hit at least once.
    pub fn non_zero(&self) -> BTreeMap<String, u64> {
        self.snapshot()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RedirectRule;
    use std::sync::Arc;
    use std::thread;

    fn rules() -> RuleSet {
        RuleSet::compile(vec![
            RedirectRule::new("r1", "/a", "/b").with_hits(10),
            RedirectRule::new("r2", "/c", "/d"),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_counters_start_at_zero() {
        let counters = HitCounters::new(&rules());
        assert_eq!(counters.total(), 0);
        assert!(counters.non_zero().is_empty());
    }

    #[test]
    fn test_seeded_counters_carry_rule_totals() {
        let counters = HitCounters::from_rule_totals(&rules());
        assert_eq!(counters.get_by_id("r1"), 10);
        assert_eq!(counters.get_by_id("r2"), 0);
        assert_eq!(counters.get_by_id("missing"), 0);
    }

    #[test]
    fn test_merge_adds_by_id() {
        let set = rules();
        let total = HitCounters::from_rule_totals(&set);
        let pass = HitCounters::new(&set);
        pass.increment(0);
        pass.increment(1);
        pass.increment(1);

        total.merge(&pass);
        assert_eq!(total.get_by_id("r1"), 11);
        assert_eq!(total.get_by_id("r2"), 2);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(HitCounters::new(&rules()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.increment(0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.get(0), 8000);
    }
}
