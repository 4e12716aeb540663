pub mod analyzer;
pub mod cancel;
pub mod cannibal;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod model;
pub mod report;
pub mod result;
pub mod session;

pub use analyzer::{Depth, EquityOutcome, Roots, compute_depths, compute_equity, find_orphans};
pub use cancel::CancelToken;
pub use cannibal::{Competitor, KeywordGroup, KeywordVerdict, Recommendation, detect};
pub use config::{AnalysisConfig, CannibalizationConfig, EquityConfig};
pub use data::{Database, RunSummary};
pub use error::CoreError;
pub use graph::{GraphBuilder, LinkGraph, LinkStats, build_graph};
pub use model::{KeywordTarget, Link, LinkKind, LinkPosition, LinkStatus, Page, Snapshot};
pub use report::ReportFormat;
pub use result::{AnalysisFlag, AnalysisResult, EquitySummary, PageMetrics};
pub use session::AnalysisSession;
