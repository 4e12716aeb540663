use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use sitegraph_core::config::AnalysisConfig;
use sitegraph_core::data::{Database, RunSummary};
use sitegraph_core::model::Snapshot;
use sitegraph_core::report::{ReportFormat, generate_audit_report, generate_report, save_report};
use sitegraph_core::result::AnalysisResult;
use sitegraph_core::{AnalysisSession, CancelToken};
use sitegraph_redirect::{RedirectRule, ResolutionStatus, ResolvedRedirect};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DATABASE_FILE: &str = "sitegraph.db";

/// A rule file is either a bare array of rules or an object with a `rules` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    List(Vec<RedirectRule>),
    Wrapped { rules: Vec<RedirectRule> },
}

/// Banner goes to stderr so piped report output stays clean.
pub fn print_banner() {
    eprintln!(
        "{} {}",
        "sitegraph".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    eprintln!("{}", "redirects, link graph and keyword overlap".bright_black());
    eprintln!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

// Loading helpers

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Invalid snapshot JSON in {}", path.display()))?;
    debug!(
        pages = snapshot.pages.len(),
        links = snapshot.links.len(),
        "Loaded snapshot"
    );
    Ok(snapshot)
}

pub fn load_rules(path: &Path) -> Result<Vec<RedirectRule>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file {}", path.display()))?;
    let file: RuleFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid rule JSON in {}", path.display()))?;
    let rules = match file {
        RuleFile::List(rules) => rules,
        RuleFile::Wrapped { rules } => rules,
    };
    debug!(rules = rules.len(), "Loaded redirect rules");
    Ok(rules)
}

/// Loads the config file when given, then applies root overrides.
pub fn load_config(path: Option<&PathBuf>, roots: &[String]) -> Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if !roots.is_empty() {
        config = config.with_roots(roots.to_vec());
    }
    config.validate()?;
    Ok(config)
}

/// Expands `~` in a database directory and appends the database file name.
pub fn resolve_db_path(dir: &str) -> PathBuf {
    let expanded = shellexpand::tilde(dir);
    Path::new(expanded.as_ref()).join(DATABASE_FILE)
}

pub fn parse_format(format: &str) -> Result<ReportFormat> {
    ReportFormat::from_str(format).ok_or_else(|| anyhow!("Unknown report format '{}'", format))
}

/// Creates the database directory and a fresh database, replacing an
/// existing one only when `overwrite` is set.
pub fn init_database(dir: &str, overwrite: bool) -> Result<PathBuf> {
    let db_path = resolve_db_path(dir);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if overwrite && Database::exists(&db_path) {
        Database::remove(&db_path)?;
        info!(path = %db_path.display(), "Removed existing database");
    }
    Database::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;
    Ok(db_path)
}

fn open_database(dir: &str) -> Result<Database> {
    let db_path = resolve_db_path(dir);
    if !Database::exists(&db_path) {
        bail!(
            "No database at {} (run `sitegraph init` first)",
            db_path.display()
        );
    }
    Ok(Database::new(&db_path)?)
}

/// Looks a run up by id; `latest` picks the newest run.
pub fn find_run(db: &Database, run_id: &str) -> Result<AnalysisResult> {
    let run = if run_id == "latest" {
        db.latest_run()?
    } else {
        db.get_run(run_id)?
    };
    run.ok_or_else(|| anyhow!("No recorded run '{}'", run_id))
}

fn emit<W: Write>(report: &str, output: Option<&PathBuf>, out: &mut W) -> Result<()> {
    match output {
        Some(path) => {
            save_report(report, path)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            eprintln!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => {
            out.write_all(report.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

pub fn format_resolution(resolved: &ResolvedRedirect) -> String {
    let mut out = String::new();
    let status = match resolved.status {
        ResolutionStatus::Resolved => resolved.status.as_str().green().bold(),
        ResolutionStatus::NoMatch => resolved.status.as_str().bright_black().bold(),
        _ => resolved.status.as_str().red().bold(),
    };
    out.push_str(&format!("{} {}\n", "Status:".blue(), status));
    out.push_str(&format!("{} {}\n", "Source:".blue(), resolved.source));
    for hop in &resolved.hops {
        out.push_str(&format!(
            "  {} {} {} [{} {}]\n",
            "→".blue(),
            hop.to.bright_white(),
            format!("({})", hop.kind.status_code()).cyan(),
            "rule".bright_black(),
            hop.rule_id.bright_black()
        ));
    }
    out.push_str(&format!(
        "{} {}\n",
        "Destination:".blue(),
        resolved.destination.bright_white().bold()
    ));
    out
}

pub fn format_history(runs: &[RunSummary]) -> String {
    if runs.is_empty() {
        return "No recorded runs.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<38} {:>4} {:<28} {:>6} {:>8}  {}\n",
        "RUN", "VER", "GENERATED", "PAGES", "KEYWORDS", "FLAGS"
    ));
    for run in runs {
        let flags = if run.flags.is_empty() {
            "-".to_string()
        } else {
            run.flags.join(",")
        };
        out.push_str(&format!(
            "{:<38} {:>4} {:<28} {:>6} {:>8}  {}\n",
            run.id, run.version, run.generated_at, run.page_count, run.keyword_groups, flags
        ));
    }
    out
}

// Subcommand handlers

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  SITEGRAPH INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/sitegraph/");
    let force = args.get_flag("force");
    let db_path = resolve_db_path(dir);

    println!(
        "{} Target: {}",
        "→".blue(),
        db_path.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();
        println!("{}", "Overwriting it discards the run history.".yellow());

        let response = print_prompt("Do you want to continue? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    println!("{} Creating database...", "→".blue());
    let db_path = init_database(dir, true)?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

/// Options for one `analyze` invocation
pub struct AnalyzeOptions {
    pub snapshot: PathBuf,
    /// Rule file; `None` uses the rules embedded in the snapshot
    pub rules: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub roots: Vec<String>,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    /// History database directory; `None` skips recording the run
    pub db_dir: Option<String>,
    pub show_progress: bool,
}

impl AnalyzeOptions {
    pub fn from_args(args: &ArgMatches) -> Result<Self> {
        let snapshot = args
            .get_one::<PathBuf>("snapshot")
            .ok_or_else(|| anyhow!("--snapshot is required"))?
            .clone();
        let roots = args
            .get_many::<String>("root")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let format = parse_format(
            args.get_one::<String>("format")
                .map(String::as_str)
                .unwrap_or("text"),
        )?;
        let db_dir = if args.get_flag("no-save") {
            None
        } else {
            Some(
                args.get_one::<String>("db")
                    .cloned()
                    .unwrap_or_else(|| "~/.config/sitegraph/".to_string()),
            )
        };

        Ok(Self {
            snapshot,
            rules: args.get_one::<PathBuf>("rules").cloned(),
            config: args.get_one::<PathBuf>("config").cloned(),
            roots,
            format,
            output: args.get_one::<PathBuf>("output").cloned(),
            db_dir,
            show_progress: true,
        })
    }
}

pub async fn handle_analyze(args: &ArgMatches) -> Result<()> {
    let options = AnalyzeOptions::from_args(args)?;
    run_analysis(&options, &mut io::stdout()).await?;
    Ok(())
}

/// Runs one analysis pass and writes the report to `out`, or to the output
/// file when one is set. Status lines go to stderr so `out` only ever holds
/// the report.
pub async fn run_analysis<W: Write>(
    options: &AnalyzeOptions,
    out: &mut W,
) -> Result<Arc<AnalysisResult>> {
    let mut snapshot = load_snapshot(&options.snapshot)?;
    let rules = match &options.rules {
        Some(path) => load_rules(path)?,
        None => std::mem::take(&mut snapshot.rules),
    };
    let config = load_config(options.config.as_ref(), &options.roots)?;

    eprintln!(
        "{} {} pages, {} links, {} redirect rules",
        "→".blue(),
        snapshot.pages.len().to_string().cyan(),
        snapshot.links.len().to_string().cyan(),
        rules.len().to_string().cyan()
    );

    let session = AnalysisSession::new(rules, config).context("Failed to start session")?;
    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let progress = options
        .show_progress
        .then(|| spinner("Analyzing link graph..."));
    let outcome = session.run(snapshot, &cancel).await;
    interrupt.abort();
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    let result = outcome.context("Analysis pass failed")?;
    eprintln!(
        "{} Analysis complete (run {})",
        "✓".green().bold(),
        result.run_id.bright_white()
    );
    for flag in &result.flags {
        eprintln!("{} {}", "⚠".yellow().bold(), flag.description().yellow());
    }

    if let Some(dir) = &options.db_dir {
        let db_path = resolve_db_path(dir);
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut db = Database::new(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        db.insert_run(&result)?;
        info!(run_id = %result.run_id, path = %db_path.display(), "Recorded run");
    }
    eprintln!();

    let report = generate_report(&result, options.format)?;
    emit(&report, options.output.as_ref(), out)?;
    Ok(result)
}

pub fn handle_resolve(args: &ArgMatches) -> Result<()> {
    let url = args
        .get_one::<String>("URL")
        .ok_or_else(|| anyhow!("URL is required"))?;
    let rules_path = args
        .get_one::<PathBuf>("rules")
        .ok_or_else(|| anyhow!("--rules is required"))?;
    let max_hops = args.get_one::<usize>("max-hops").copied().unwrap_or(5);

    let config = AnalysisConfig::default().with_max_hops(max_hops);
    let session = AnalysisSession::new(load_rules(rules_path)?, config)?;
    let resolved = session.test_redirect(url);

    print!("{}", format_resolution(&resolved));
    Ok(())
}

pub fn handle_audit(args: &ArgMatches) -> Result<()> {
    let rules_path = args
        .get_one::<PathBuf>("rules")
        .ok_or_else(|| anyhow!("--rules is required"))?;
    let max_hops = args.get_one::<usize>("max-hops").copied().unwrap_or(5);

    let config = AnalysisConfig::default().with_max_hops(max_hops);
    let session = AnalysisSession::new(load_rules(rules_path)?, config)?;
    let audit = session.audit();

    print!("{}", generate_audit_report(&audit));
    Ok(())
}

pub fn handle_history(args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or("~/.config/sitegraph/");
    let db = open_database(dir)?;

    print!("{}", format_history(&db.list_runs()?));
    Ok(())
}

pub fn handle_report(args: &ArgMatches) -> Result<()> {
    let run_id = args
        .get_one::<String>("RUN_ID")
        .ok_or_else(|| anyhow!("RUN_ID is required"))?;
    let dir = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or("~/.config/sitegraph/");
    let format = parse_format(
        args.get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text"),
    )?;

    let db = open_database(dir)?;
    let result = find_run(&db, run_id)?;
    let report = generate_report(&result, format)?;
    emit(&report, args.get_one::<PathBuf>("output"), &mut io::stdout())
}
