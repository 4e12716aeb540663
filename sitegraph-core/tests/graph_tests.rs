// Tests for link graph construction

use sitegraph_core::cancel::CancelToken;
use sitegraph_core::error::CoreError;
use sitegraph_core::graph::{BrokenReason, GraphBuilder, LinkFlag, build_graph};
use sitegraph_core::model::{Link, Page, Snapshot};
use sitegraph_redirect::{HitCounters, RedirectRule, RuleSet};

fn pages(paths: &[&str]) -> Vec<Page> {
    paths.iter().map(|p| Page::new(p, &p.to_uppercase())).collect()
}

fn rules(rules: Vec<RedirectRule>) -> RuleSet {
    RuleSet::compile(rules).unwrap()
}

// ============================================================================
// Edge Construction Tests
// ============================================================================

#[test]
fn test_simple_edges() {
    let snapshot = Snapshot::new(
        pages(&["/", "/a", "/b"]),
        vec![Link::new("/", "/a"), Link::new("/a", "/b")],
    );
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.edge("/", "/a").is_some());
    assert!(graph.edge("/a", "/b").is_some());
    assert!(graph.edge("/", "/b").is_none());
    assert_eq!(graph.stats().raw_links, 2);
    assert_eq!(graph.stats().internal_edges, 2);
}

#[test]
fn test_duplicate_links_collapse_into_one_edge() {
    let snapshot = Snapshot::new(
        pages(&["/", "/a"]),
        vec![
            Link::new("/", "/a").with_anchor("Shoes"),
            Link::new("/", "/a/").with_anchor("Shoes"),
            Link::new("/", "/a").with_anchor("All shoes").nofollow(),
        ],
    );
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.edge_count(), 1);
    let edge = graph.edge("/", "/a").unwrap();
    assert_eq!(edge.count, 3);
    assert_eq!(edge.follow_count, 2);
    assert_eq!(edge.anchors, vec!["Shoes", "All shoes"]);
    assert!(edge.passes_equity());

    let node = graph.node("/a").unwrap();
    assert_eq!(graph.inbound_links(node), 3);
    assert_eq!(graph.in_degree(node), 1);
    assert_eq!(graph.stats().nofollow, 1);
}

#[test]
fn test_nofollow_only_edge_does_not_pass_equity() {
    let snapshot = Snapshot::new(
        pages(&["/", "/a"]),
        vec![Link::new("/", "/a").nofollow()],
    );
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();
    let root = graph.node("/").unwrap();

    assert!(!graph.edge("/", "/a").unwrap().passes_equity());
    assert_eq!(graph.successors(root).count(), 1);
    assert_eq!(graph.followed_successors(root).count(), 0);
}

#[test]
fn test_self_links_are_counted_but_not_edges() {
    let snapshot = Snapshot::new(pages(&["/"]), vec![Link::new("/", "/")]);
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.stats().self_links, 1);
    assert_eq!(graph.stats().internal_links, 1);
}

#[test]
fn test_duplicate_pages_keep_first() {
    let snapshot = Snapshot::new(
        vec![Page::new("/a", "First"), Page::new("/a/", "Second")],
        vec![],
    );
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.pages()[0].title, "First");
}

#[test]
fn test_links_from_unknown_pages_are_skipped() {
    let snapshot = Snapshot::new(pages(&["/", "/a"]), vec![Link::new("/ghost", "/a")]);
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.stats().unknown_source, 1);
    assert_eq!(graph.stats().raw_links, 1);
}

#[test]
fn test_links_from_unknown_pages_do_not_count_hits() {
    let snapshot = Snapshot::new(
        pages(&["/", "/new"]),
        vec![Link::new("/ghost", "/old"), Link::new("/", "/old")],
    );
    let rules = rules(vec![RedirectRule::new("r1", "/old", "/new")]);
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(counters.get_by_id("r1"), 1);
    assert_eq!(graph.stats().redirected, 1);
    assert_eq!(graph.stats().unknown_source, 1);
    assert_eq!(graph.stats().raw_links, 2);
}

// ============================================================================
// Redirect Folding Tests
// ============================================================================

#[test]
fn test_edges_point_at_final_destination() {
    let snapshot = Snapshot::new(
        pages(&["/", "/new"]),
        vec![Link::new("/", "/old")],
    );
    let rules = rules(vec![
        RedirectRule::new("r1", "/old", "/older"),
        RedirectRule::new("r2", "/older", "/new"),
    ]);
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert!(graph.edge("/", "/new").is_some());
    assert!(graph.node("/old").is_none());
    assert_eq!(graph.stats().redirected, 1);
    assert_eq!(counters.get_by_id("r1"), 1);
    assert_eq!(counters.get_by_id("r2"), 1);
}

#[test]
fn test_wildcard_redirect_folds_into_edge() {
    let snapshot = Snapshot::new(
        pages(&["/", "/archive/post"]),
        vec![Link::new("/", "/blog/2024/post")],
    );
    let rules = rules(vec![
        RedirectRule::new("content", "/blog/*", "/content/*").with_priority(2),
        RedirectRule::new("archive", "/blog/2024/*", "/archive/*").with_priority(1),
    ]);
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert!(graph.edge("/", "/archive/post").is_some());
    assert_eq!(counters.get_by_id("archive"), 1);
    assert_eq!(counters.get_by_id("content"), 0);
}

#[test]
fn test_redirect_loop_marks_link_broken() {
    let snapshot = Snapshot::new(pages(&["/", "/a", "/b"]), vec![Link::new("/", "/a")]);
    let rules = rules(vec![
        RedirectRule::new("ab", "/a", "/b"),
        RedirectRule::new("ba", "/b", "/a"),
    ]);
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.stats().broken, 1);
    assert_eq!(graph.stats().redirect_loops, 1);
    let record = &graph.broken_links()[0];
    assert_eq!(record.flag, LinkFlag::Broken);
    assert_eq!(record.reason, Some(BrokenReason::RedirectLoop));
    assert_eq!(record.href, "/a");
}

#[test]
fn test_hop_limit_marks_link_broken() {
    let snapshot = Snapshot::new(pages(&["/", "/p3"]), vec![Link::new("/", "/p0")]);
    let rules = rules(vec![
        RedirectRule::new("r0", "/p0", "/p1"),
        RedirectRule::new("r1", "/p1", "/p2"),
        RedirectRule::new("r2", "/p2", "/p3"),
    ]);
    let counters = HitCounters::new(&rules);

    let graph = GraphBuilder::new(&rules, &counters)
        .with_max_hops(2)
        .build(&snapshot)
        .unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.stats().redirect_hop_limits, 1);
    assert_eq!(
        graph.broken_links()[0].reason,
        Some(BrokenReason::RedirectHopLimit)
    );
}

#[test]
fn test_crawled_broken_link_is_recorded() {
    let snapshot = Snapshot::new(
        pages(&["/", "/a"]),
        vec![Link::new("/", "/a").broken(), Link::new("/", "/a").broken()],
    );
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.stats().broken, 2);
    assert_eq!(graph.broken_links().len(), 1);
    assert_eq!(graph.broken_links()[0].count, 2);
    assert_eq!(
        graph.broken_links()[0].reason,
        Some(BrokenReason::CrawledBroken)
    );
}

// ============================================================================
// External Link Tests
// ============================================================================

#[test]
fn test_unknown_targets_are_external() {
    let snapshot = Snapshot::new(
        pages(&["/"]),
        vec![
            Link::new("/", "https://partner.example.org/deal"),
            Link::new("/", "/not-crawled"),
        ],
    );
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.stats().external, 2);
    assert!(
        graph
            .external_links()
            .iter()
            .all(|r| r.flag == LinkFlag::External)
    );
}

#[test]
fn test_origin_links_are_localized() {
    let snapshot = Snapshot::new(
        pages(&["https://shop.example.com/", "/shoes"]),
        vec![Link::new(
            "https://shop.example.com",
            "https://shop.example.com/shoes/",
        )],
    )
    .with_origin("https://shop.example.com");
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.node_count(), 2);
    assert!(graph.edge("/", "/shoes").is_some());
    assert_eq!(graph.stats().external, 0);
}

#[test]
fn test_redirect_to_external_host() {
    let snapshot = Snapshot::new(pages(&["/"]), vec![Link::new("/", "/outlet")]);
    let rules = rules(vec![RedirectRule::new(
        "outlet",
        "/outlet",
        "https://outlet.example.net/",
    )]);
    let counters = HitCounters::new(&rules);

    let graph = build_graph(&snapshot, &rules, &counters).unwrap();

    assert_eq!(graph.stats().external, 1);
    let record = &graph.external_links()[0];
    assert_eq!(record.href, "/outlet");
    assert_eq!(record.target, "https://outlet.example.net/");
    assert_eq!(record.hops, 1);
}

// ============================================================================
// Builder Option Tests
// ============================================================================

#[test]
fn test_parallel_workers_match_single_worker() {
    let paths: Vec<String> = (0..50).map(|i| format!("/p{}", i)).collect();
    let page_list: Vec<Page> = std::iter::once(Page::new("/", "Home"))
        .chain(paths.iter().map(|p| Page::new(p, p)))
        .collect();
    let links: Vec<Link> = paths
        .iter()
        .map(|p| Link::new("/", &format!("/old{}", p)))
        .collect();
    let snapshot = Snapshot::new(page_list, links);
    let rules = rules(vec![RedirectRule::new("old", "/old/*", "/*")]);
    let counters = HitCounters::new(&rules);

    let single = GraphBuilder::new(&rules, &counters).build(&snapshot).unwrap();
    let parallel = GraphBuilder::new(&rules, &counters)
        .with_workers(8)
        .build(&snapshot)
        .unwrap();

    assert_eq!(single.edge_count(), 50);
    assert_eq!(single.edge_count(), parallel.edge_count());
    assert_eq!(single.stats(), parallel.stats());
    assert_eq!(counters.get_by_id("old"), 100);
}

#[test]
fn test_cancelled_build_fails() {
    let snapshot = Snapshot::new(pages(&["/", "/a"]), vec![Link::new("/", "/a")]);
    let rules = RuleSet::empty();
    let counters = HitCounters::new(&rules);
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = GraphBuilder::new(&rules, &counters)
        .with_cancel(&cancel)
        .build(&snapshot);

    assert!(matches!(result, Err(CoreError::Cancelled)));
}
