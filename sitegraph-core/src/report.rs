// Report generation from analysis results

use crate::result::AnalysisResult;
use serde::{Deserialize, Serialize};
use sitegraph_redirect::{AuditIssue, RuleAudit};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

/// Pages listed in the equity table of text and markdown reports.
const TOP_PAGES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

pub fn generate_report(
    result: &AnalysisResult,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(result)),
        ReportFormat::Json => generate_json_report(result),
        ReportFormat::Markdown => Ok(generate_markdown_report(result)),
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');
}

pub fn generate_text_report(result: &AnalysisResult) -> String {
    let mut report = String::new();

    // Header
    report.push_str(RULE);
    report.push_str("                       SITEGRAPH LINK ANALYSIS REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Run ID:       {}\n", result.run_id));
    report.push_str(&format!("Version:      {}\n", result.version));
    report.push_str(&format!(
        "Generated:    {}\n",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Roots:        {}\n", result.roots.join(", ")));
    report.push_str(&format!("Pages:        {}\n", result.pages.len()));
    report.push('\n');

    // Summary
    section(&mut report, "SUMMARY");
    let links = &result.links;
    report.push_str(&format!("Raw links:        {}\n", links.raw_links));
    report.push_str(&format!("Internal edges:   {}\n", links.internal_edges));
    report.push_str(&format!("Redirected links: {}\n", links.redirected));
    report.push_str(&format!("Broken links:     {}\n", links.broken));
    report.push_str(&format!("External links:   {}\n", links.external));
    report.push_str(&format!("Self links:       {}\n", links.self_links));
    report.push_str(&format!("Nofollow links:   {}\n", links.nofollow));
    report.push_str(&format!("Orphan pages:     {}\n", result.orphans().count()));
    report.push_str(&format!("Unreachable:      {}\n", result.unreachable().count()));
    if let Some(depth) = result.max_depth() {
        report.push_str(&format!("Max depth:        {}\n", depth));
    }
    report.push_str(&format!(
        "Equity:           {} iterations, {}\n",
        result.equity.iterations,
        if result.equity.converged {
            "converged"
        } else {
            "NOT converged"
        }
    ));
    report.push('\n');

    if !result.flags.is_empty() {
        report.push_str("Flags:\n");
        for flag in &result.flags {
            report.push_str(&format!("  [{}] {}\n", flag.as_str(), flag.description()));
        }
        report.push('\n');
    }

    if !result.pages.is_empty() {
        section(&mut report, "LINK EQUITY");
        report.push_str(&format!(
            "{:<48} {:>8} {:>6} {:>8} {:>8}\n",
            "PAGE", "EQUITY", "DEPTH", "INBOUND", "OUTBOUND"
        ));
        for page in result.top_pages(TOP_PAGES) {
            report.push_str(&format!(
                "{:<48} {:>8.1} {:>6} {:>8} {:>8}\n",
                truncate(&page.path, 48),
                page.equity,
                page.depth.to_string(),
                page.inbound_links,
                page.outbound_links
            ));
        }
        if result.pages.len() > TOP_PAGES {
            report.push_str(&format!("  ... and {} more\n", result.pages.len() - TOP_PAGES));
        }
        report.push('\n');
    }

    let orphans: Vec<_> = result.orphans().collect();
    if !orphans.is_empty() {
        section(&mut report, "ORPHAN PAGES");
        for page in orphans {
            report.push_str(&format!("  {}  (depth {})\n", page.path, page.depth));
        }
        report.push('\n');
    }

    if !result.broken_links.is_empty() {
        section(&mut report, "BROKEN LINKS");
        for record in &result.broken_links {
            let reason = record.reason.map(|r| r.as_str()).unwrap_or("broken");
            report.push_str(&format!(
                "  {} -> {}  [{}, x{}]\n",
                record.source, record.href, reason, record.count
            ));
        }
        report.push('\n');
    }

    if !result.keywords.is_empty() {
        section(&mut report, "KEYWORD CANNIBALIZATION");
        for (idx, verdict) in result.keywords.iter().enumerate() {
            report.push_str(&format!(
                "[{}] \"{}\"  impact {:.1}  -> {}\n",
                idx + 1,
                verdict.group.keyword,
                verdict.impact,
                verdict.recommendation.as_str().to_uppercase()
            ));
            for competitor in &verdict.group.competitors {
                let rank = competitor
                    .rank
                    .map(|r| format!("#{}", r))
                    .unwrap_or_else(|| "-".to_string());
                report.push_str(&format!(
                    "    {:<5} {:<44} {:>5.1}% traffic\n",
                    rank,
                    truncate(&competitor.path, 44),
                    competitor.traffic_share * 100.0
                ));
            }
            report.push_str(&wrap_text(&verdict.reason, 80, "    "));
            report.push_str(THIN_RULE);
        }
        report.push('\n');
    }

    if !result.rule_hits.is_empty() {
        section(&mut report, "REDIRECT RULE HITS");
        for (rule_id, hits) in &result.rule_hits {
            report.push_str(&format!("  {:<40} {:>8}\n", rule_id, hits));
        }
        report.push('\n');
    }

    // Footer
    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);
    report.push_str(&format!(
        "\nGenerated by Sitegraph {}\n\n",
        env!("CARGO_PKG_VERSION")
    ));

    report
}

pub fn generate_json_report(result: &AnalysisResult) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Sitegraph",
                "version": env!("CARGO_PKG_VERSION"),
                "format": "json"
            },
            "summary": {
                "total_pages": result.pages.len(),
                "orphans": result.orphans().count(),
                "unreachable": result.unreachable().count(),
                "max_depth": result.max_depth(),
                "keyword_groups": result.keywords.len(),
                "recommendations": result.recommendation_counts()
            },
            "analysis": result
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(result: &AnalysisResult) -> String {
    let mut report = String::new();

    report.push_str("# Sitegraph Link Analysis Report\n\n");
    report.push_str(&format!("- **Run:** `{}` (v{})\n", result.run_id, result.version));
    report.push_str(&format!(
        "- **Generated:** {}\n",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("- **Roots:** {}\n", result.roots.join(", ")));
    report.push_str(&format!("- **Pages:** {}\n", result.pages.len()));
    report.push_str(&format!(
        "- **Links:** {} raw, {} internal edges, {} broken, {} external\n\n",
        result.links.raw_links,
        result.links.internal_edges,
        result.links.broken,
        result.links.external
    ));

    if !result.flags.is_empty() {
        report.push_str("## Flags\n\n");
        for flag in &result.flags {
            report.push_str(&format!("- `{}`: {}\n", flag.as_str(), flag.description()));
        }
        report.push('\n');
    }

    if !result.pages.is_empty() {
        report.push_str("## Link Equity\n\n");
        report.push_str("| Page | Equity | Depth | Orphan | Inbound |\n");
        report.push_str("|------|-------:|------:|:------:|--------:|\n");
        for page in result.top_pages(TOP_PAGES) {
            report.push_str(&format!(
                "| `{}` | {:.1} | {} | {} | {} |\n",
                page.path,
                page.equity,
                page.depth,
                if page.orphan { "yes" } else { "" },
                page.inbound_links
            ));
        }
        report.push('\n');
    }

    if !result.broken_links.is_empty() {
        report.push_str("## Broken Links\n\n");
        for record in &result.broken_links {
            let reason = record.reason.map(|r| r.as_str()).unwrap_or("broken");
            report.push_str(&format!(
                "- `{}` → `{}` ({})\n",
                record.source, record.href, reason
            ));
        }
        report.push('\n');
    }

    if !result.keywords.is_empty() {
        report.push_str("## Keyword Cannibalization\n\n");
        report.push_str("| Keyword | Pages | Impact | Action | Reason |\n");
        report.push_str("|---------|------:|-------:|--------|--------|\n");
        for verdict in &result.keywords {
            report.push_str(&format!(
                "| {} | {} | {:.1} | **{}** | {} |\n",
                verdict.group.keyword,
                verdict.group.competitors.len(),
                verdict.impact,
                verdict.recommendation,
                verdict.reason.replace('|', "\\|")
            ));
        }
        report.push('\n');
    }

    report
}

pub fn generate_audit_report(audit: &RuleAudit) -> String {
    let mut report = String::new();

    section(&mut report, "REDIRECT RULE AUDIT");
    report.push_str(&format!("Rules checked: {}\n", audit.rules_checked));
    report.push_str(&format!("Findings:      {}\n\n", audit.findings.len()));

    if audit.is_clean() {
        report.push_str("  No chains, loops or shadowed rules found.\n");
        return report;
    }

    for finding in &audit.findings {
        let detail = match &finding.issue {
            AuditIssue::Chain { hops } => format!("chain of {} hops", hops),
            AuditIssue::Loop => "redirect loop".to_string(),
            AuditIssue::HopLimit => "exceeds hop limit".to_string(),
            AuditIssue::TemporaryInChain => "chain mixes temporary redirects".to_string(),
            AuditIssue::Shadowed { by } => format!("shadowed by rule {}", by),
        };
        report.push_str(&format!(
            "  [{}] {}: {}\n",
            finding.issue.as_str(),
            finding.rule_id,
            detail
        ));
        if finding.resolution.hop_count() > 0 {
            report.push_str(&format!(
                "        {}\n",
                finding.resolution.trace().join(" -> ")
            ));
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
