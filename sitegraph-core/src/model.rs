// Crawl snapshot data model

use serde::{Deserialize, Serialize};
use sitegraph_redirect::{RedirectRule, normalize_url};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTarget {
    pub keyword: String,
    #[serde(default)]
    pub rank: Option<u32>,
    /// Estimated monthly clicks this page earns for the keyword.
    #[serde(default)]
    pub traffic: f64,
    #[serde(default)]
    pub search_volume: u64,
}

impl KeywordTarget {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            rank: None,
            traffic: 0.0,
            search_volume: 0,
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_traffic(mut self, traffic: f64) -> Self {
        self.traffic = traffic;
        self
    }

    pub fn with_search_volume(mut self, volume: u64) -> Self {
        self.search_volume = volume;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(alias = "url")]
    pub path: String,
    #[serde(default)]
    pub title: String,
    /// 0-100
    #[serde(default)]
    pub authority: f64,
    #[serde(default)]
    pub keywords: Vec<KeywordTarget>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl Page {
    pub fn new(path: &str, title: &str) -> Self {
        Self {
            path: path.to_string(),
            title: title.to_string(),
            authority: 0.0,
            keywords: Vec::new(),
            status_code: None,
        }
    }

    pub fn with_authority(mut self, authority: f64) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_keyword(mut self, keyword: KeywordTarget) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn is_broken(&self) -> bool {
        self.status_code.map(|code| code >= 400).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPosition {
    Header,
    #[default]
    Content,
    Footer,
    Sidebar,
    Navigation,
}

impl LinkPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPosition::Header => "header",
            LinkPosition::Content => "content",
            LinkPosition::Footer => "footer",
            LinkPosition::Sidebar => "sidebar",
            LinkPosition::Navigation => "navigation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    #[default]
    Text,
    Image,
    Button,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    Active,
    Broken,
}

/// A raw link as found by the crawler; `target` is the href before redirects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub anchor: String,
    #[serde(default)]
    pub position: LinkPosition,
    #[serde(default)]
    pub kind: LinkKind,
    #[serde(default)]
    pub nofollow: bool,
    #[serde(default)]
    pub status: LinkStatus,
}

impl Link {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            anchor: String::new(),
            position: LinkPosition::default(),
            kind: LinkKind::default(),
            nofollow: false,
            status: LinkStatus::default(),
        }
    }

    pub fn with_anchor(mut self, anchor: &str) -> Self {
        self.anchor = anchor.to_string();
        self
    }

    pub fn with_position(mut self, position: LinkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_kind(mut self, kind: LinkKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn nofollow(mut self) -> Self {
        self.nofollow = true;
        self
    }

    pub fn broken(mut self) -> Self {
        self.status = LinkStatus::Broken;
        self
    }
}

/// Everything one analysis pass consumes, supplied wholesale by the crawler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Site origin such as `https://shop.example.com`; absolute URLs on this
    /// origin are treated as site paths.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub rules: Vec<RedirectRule>,
}

impl Snapshot {
    pub fn new(pages: Vec<Page>, links: Vec<Link>) -> Self {
        Self {
            origin: None,
            pages,
            links,
            rules: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn with_rules(mut self, rules: Vec<RedirectRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn origin_prefix(&self) -> Option<String> {
        let origin = self.origin.as_ref()?;
        let parsed = Url::parse(origin).ok()?;
        Some(parsed.origin().ascii_serialization())
    }

    /// Normalizes a URL and strips this snapshot's origin from it.
    pub fn localize(&self, raw: &str) -> String {
        let normalized = normalize_url(raw);

        if let Some(origin) = self.origin_prefix()
            && let Some(rest) = normalized.strip_prefix(origin.as_str())
        {
            if rest.is_empty() {
                return "/".to_string();
            }
            if rest.starts_with('/') {
                return rest.to_string();
            }
        }

        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_strips_origin() {
        let snapshot = Snapshot::default().with_origin("https://Shop.Example.com");
        assert_eq!(snapshot.localize("https://shop.example.com/shoes/"), "/shoes");
        assert_eq!(snapshot.localize("https://shop.example.com"), "/");
        assert_eq!(
            snapshot.localize("https://other.example.com/shoes"),
            "https://other.example.com/shoes"
        );
    }

    #[test]
    fn test_localize_does_not_strip_lookalike_host() {
        let snapshot = Snapshot::default().with_origin("https://shop.com");
        assert_eq!(
            snapshot.localize("https://shop.com.evil.net/x"),
            "https://shop.com.evil.net/x"
        );
    }

    #[test]
    fn test_localize_without_origin_only_normalizes() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.localize("//shoes//red/"), "/shoes/red");
    }

    #[test]
    fn test_page_accepts_url_alias() {
        let json = r#"{"url": "/a", "title": "A"}"#;
        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.path, "/a");
        assert!(page.keywords.is_empty());
    }

    #[test]
    fn test_link_defaults() {
        let json = r#"{"source": "/", "target": "/a"}"#;
        let link: Link = serde_json::from_str(json).unwrap();
        assert_eq!(link.position, LinkPosition::Content);
        assert_eq!(link.kind, LinkKind::Text);
        assert_eq!(link.status, LinkStatus::Active);
        assert!(!link.nofollow);
    }
}
