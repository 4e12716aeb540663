// Keyword cannibalization detection

use crate::config::CannibalizationConfig;
use crate::model::Page;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Differentiate,
    Consolidate,
    Redirect,
    Monitor,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Differentiate => "differentiate",
            Recommendation::Consolidate => "consolidate",
            Recommendation::Redirect => "redirect",
            Recommendation::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page competing for a keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub path: String,
    pub rank: Option<u32>,
    pub traffic: f64,
    pub traffic_share: f64,
    pub authority: f64,
    pub broken: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub keyword: String,
    /// Ranked pages first (best rank first), then by traffic.
    pub competitors: Vec<Competitor>,
    pub search_volume: u64,
    pub total_traffic: f64,
}

impl KeywordGroup {
    /// The competitor holding the largest traffic share.
    pub fn leader(&self) -> Option<&Competitor> {
        self.competitors
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.traffic_share
                    .total_cmp(&b.traffic_share)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(_, c)| c)
    }

    fn ranked_pair(&self) -> Option<(u32, u32)> {
        let mut ranks = self.competitors.iter().filter_map(|c| c.rank);
        Some((ranks.next()?, ranks.next()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordVerdict {
    #[serde(flatten)]
    pub group: KeywordGroup,
    /// 0-100; higher means the pages are more likely splitting the keyword.
    pub impact: f64,
    pub recommendation: Recommendation,
    pub reason: String,
}

pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Groups pages by shared target keyword. Only keywords targeted by two or
/// more distinct pages form a group.
pub fn group_keywords(pages: &[Page]) -> Vec<KeywordGroup> {
    let mut buckets: BTreeMap<String, Vec<(Competitor, u64)>> = BTreeMap::new();

    for page in pages {
        for target in &page.keywords {
            let keyword = normalize_keyword(&target.keyword);
            if keyword.is_empty() {
                continue;
            }
            let bucket = buckets.entry(keyword).or_default();
            if bucket.iter().any(|(c, _)| c.path == page.path) {
                continue;
            }
            bucket.push((
                Competitor {
                    path: page.path.clone(),
                    rank: target.rank,
                    traffic: target.traffic.max(0.0),
                    traffic_share: 0.0,
                    authority: page.authority,
                    broken: page.is_broken(),
                },
                target.search_volume,
            ));
        }
    }

    buckets
        .into_iter()
        .filter(|(_, bucket)| bucket.len() >= 2)
        .map(|(keyword, bucket)| {
            let search_volume = bucket.iter().map(|(_, v)| *v).max().unwrap_or(0);
            let mut competitors: Vec<Competitor> = bucket.into_iter().map(|(c, _)| c).collect();
            let total_traffic: f64 = competitors.iter().map(|c| c.traffic).sum();
            for competitor in &mut competitors {
                competitor.traffic_share = if total_traffic > 0.0 {
                    competitor.traffic / total_traffic
                } else {
                    0.0
                };
            }
            competitors.sort_by(compare_competitors);

            KeywordGroup {
                keyword,
                competitors,
                search_volume,
                total_traffic,
            }
        })
        .collect()
}

fn compare_competitors(a: &Competitor, b: &Competitor) -> Ordering {
    let by_rank = match (a.rank, b.rank) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_rank
        .then_with(|| b.traffic.total_cmp(&a.traffic))
        .then_with(|| a.path.cmp(&b.path))
}

/// 100 x rank proximity x volume weight.
pub fn impact_score(group: &KeywordGroup, config: &CannibalizationConfig) -> f64 {
    let proximity = match group.ranked_pair() {
        Some((first, second)) => 1.0 / (1.0 + first.abs_diff(second) as f64),
        None => 0.5,
    };

    let volume_weight = if config.volume_reference == 0 {
        1.0
    } else {
        let reference = (1.0 + config.volume_reference as f64).log10();
        ((1.0 + group.search_volume as f64).log10() / reference).min(1.0)
    };

    100.0 * proximity * volume_weight
}

/// Applies the policy conditions. Exactly one matching condition decides the
/// action; none or several fall back to monitoring.
///
/// In a two-page group a negligible loser is also marginal, and with the
/// default thresholds the leader is then dominant, so consolidate holds
/// whenever redirect does. Such groups resolve to monitor; redirect is only
/// returned for groups of three or more pages.
pub fn recommend(group: &KeywordGroup, config: &CannibalizationConfig) -> (Recommendation, String) {
    let mut matched: Vec<(Recommendation, String)> = Vec::new();

    if let [first, second, ..] = group.competitors.as_slice()
        && let (Some(r1), Some(r2)) = (first.rank, second.rank)
        && r1.abs_diff(r2) <= config.close_rank_gap
        && first.traffic_share >= config.substantial_share
        && second.traffic_share >= config.substantial_share
    {
        matched.push((
            Recommendation::Differentiate,
            format!(
                "{} (#{}) and {} (#{}) both draw substantial traffic",
                first.path, r1, second.path, r2
            ),
        ));
    }

    if let Some(leader) = group.leader() {
        let others: Vec<&Competitor> = group
            .competitors
            .iter()
            .filter(|c| c.path != leader.path)
            .collect();

        if leader.traffic_share >= config.dominant_share
            && others
                .iter()
                .all(|c| c.traffic_share <= config.marginal_share)
        {
            matched.push((
                Recommendation::Consolidate,
                format!(
                    "{} holds {:.0}% of traffic",
                    leader.path,
                    leader.traffic_share * 100.0
                ),
            ));
        }

        let weak: Vec<&str> = others
            .iter()
            .filter(|c| {
                c.traffic_share <= config.negligible_share
                    && (c.broken || c.authority < config.low_authority)
            })
            .map(|c| c.path.as_str())
            .collect();
        if !weak.is_empty() {
            matched.push((
                Recommendation::Redirect,
                format!("redirect {} to {}", weak.join(", "), leader.path),
            ));
        }
    }

    match matched.len() {
        1 => matched.remove(0),
        0 => (
            Recommendation::Monitor,
            "no policy condition applies".to_string(),
        ),
        _ => {
            let names: Vec<&str> = matched.iter().map(|(r, _)| r.as_str()).collect();
            (
                Recommendation::Monitor,
                format!("conflicting conditions: {}", names.join(", ")),
            )
        }
    }
}

/// Finds keywords targeted by more than one page and recommends an action
/// for each. Sorted by impact, highest first.
pub fn detect(pages: &[Page], config: &CannibalizationConfig) -> Vec<KeywordVerdict> {
    let mut verdicts: Vec<KeywordVerdict> = group_keywords(pages)
        .into_iter()
        .map(|group| {
            let impact = impact_score(&group, config);
            let (recommendation, reason) = recommend(&group, config);
            debug!(
                "Keyword '{}': {} pages, impact {:.1}, {}",
                group.keyword,
                group.competitors.len(),
                impact,
                recommendation
            );
            KeywordVerdict {
                group,
                impact,
                recommendation,
                reason,
            }
        })
        .collect();

    verdicts.sort_by(|a, b| {
        b.impact
            .total_cmp(&a.impact)
            .then_with(|| a.group.keyword.cmp(&b.group.keyword))
    });
    verdicts
}
