use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use indicatif::{ProgressBar, ProgressStyle};
use paperlens::analysis::ChatReply;
use paperlens::config::{find_config_file, load_config, load_from_env, LogFormat};
use paperlens::models::{AnalysisJob, Paper, PaperSource, SearchRequest, SortHint, UNTITLED};
use paperlens::{Config, ErrorCategory, PaperService};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// paperlens - Search arXiv, rank by citations, and analyze papers into your library
#[derive(Parser, Debug)]
#[command(name = "paperlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Search arXiv, rank by citations, and analyze papers into your library", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Library user key
    #[arg(long, short, global = true, default_value = "default")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

/// Result ordering
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Sort {
    /// Feed relevance order
    All,
    /// Newest submissions first
    Recent,
    /// Most cited first (fetches citation counts)
    Popular,
}

impl From<Sort> for SortHint {
    fn from(sort: Sort) -> Self {
        match sort {
            Sort::All => SortHint::All,
            Sort::Recent => SortHint::Recent,
            Sort::Popular => SortHint::Popular,
        }
    }
}

/// What to search for
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SearchTarget {
    /// Free-text query
    #[arg(long)]
    query: Option<String>,

    /// Category code, e.g. cs.AI
    #[arg(long, short)]
    category: Option<String>,
}

#[derive(Args, Debug)]
struct SearchOptions {
    #[command(flatten)]
    target: SearchTarget,

    /// Result ordering
    #[arg(long, short, value_enum, default_value_t = Sort::All)]
    sort: Sort,

    /// Maximum number of results
    #[arg(long, short, default_value_t = paperlens::models::DEFAULT_MAX_RESULTS)]
    max_results: usize,
}

impl SearchOptions {
    fn request(&self) -> Result<SearchRequest> {
        let request = match (&self.target.query, &self.target.category) {
            (Some(query), _) => SearchRequest::query(query),
            (None, Some(category)) => SearchRequest::category(category),
            (None, None) => anyhow::bail!("either --query or --category is required"),
        };
        Ok(request.sort(self.sort.into()).max_results(self.max_results))
    }
}

/// What to analyze
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct AnalyzeTarget {
    /// Analyze the first analyzable result of a free-text query
    #[arg(long)]
    query: Option<String>,

    /// Analyze the first analyzable result of a category listing
    #[arg(long, short)]
    category: Option<String>,

    /// Analyze the PDF at this URL
    #[arg(long)]
    pdf_url: Option<String>,

    /// Analyze a local PDF file
    #[arg(long)]
    upload: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the feed
    #[command(alias = "s")]
    Search {
        #[command(flatten)]
        options: SearchOptions,

        /// Also write the results to this file as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Analyze a paper and store the result in the library
    #[command(alias = "a")]
    Analyze {
        #[command(flatten)]
        target: AnalyzeTarget,

        /// Title for --pdf-url or --upload
        #[arg(long, short)]
        title: Option<String>,

        /// Result ordering for --query or --category
        #[arg(long, short, value_enum, default_value_t = Sort::All)]
        sort: Sort,
    },

    /// Check an analysis job once
    Status {
        /// Job id returned at submission
        job_id: String,
    },

    /// Ask a question about library papers
    Chat {
        /// The question
        message: String,

        /// Ground the answer in these papers (id, arXiv id, or title)
        #[arg(long = "context", short = 'c')]
        context: Vec<String>,
    },

    /// Manage the paper library
    #[command(alias = "lib")]
    Library {
        #[command(subcommand)]
        command: LibraryCommand,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum LibraryCommand {
    /// List saved papers
    #[command(alias = "ls")]
    List,

    /// Show one saved paper (by id, arXiv id, or title)
    Get { id: String },

    /// Remove a saved paper (by id, arXiv id, or title)
    #[command(alias = "rm")]
    Remove { id: String },

    /// Saved papers followed by search results not yet saved
    View {
        #[command(flatten)]
        options: SearchOptions,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a starter configuration file
    Init {
        /// Destination (default: the user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Caller mistakes exit with 2, everything else with 1
fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<paperlens::Error>().map(|e| e.category()) {
        Some(ErrorCategory::Caller) => 2,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Commands that need neither configuration nor logging
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "paperlens", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config {
            command: ConfigCommand::Init { path, force },
        } => return init_config(path.as_deref(), *force, cli.quiet),
        _ => {}
    }

    let config = resolve_config(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose, cli.quiet);

    if let Commands::Config {
        command: ConfigCommand::Show,
    } = &cli.command
    {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let service = PaperService::from_config(&config, cli.user.as_str())?;
    tracing::debug!(user = service.user(), feed = service.feed_name(), "Service ready");

    match cli.command {
        Commands::Search { options, save } => {
            let papers = service.search(options.request()?).await?;
            if let Some(path) = save {
                let json = serde_json::to_string_pretty(&papers)?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!("Saved {} papers to {}", papers.len(), path.display());
                }
            }
            output_papers(&papers, cli.output)?;
        }

        Commands::Analyze {
            target,
            title,
            sort,
        } => {
            // Reconcile with the persisted library so the result merges into it
            if let Err(e) = service.library_load().await {
                tracing::warn!(error = %e, "Continuing without the persisted library");
            }

            let cancel = CancellationToken::new();
            let ctrl_c = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                })
            };

            let bar = progress_bar(cli.quiet);
            let on_update = |job: &AnalysisJob| {
                bar.set_position(u64::from(job.progress));
                bar.set_message(format!("{} ({})", job.status, job.job_id));
            };

            let outcome = if let Some(path) = &target.upload {
                bar.set_message(format!("Uploading {}", path.display()));
                service
                    .analyze_upload(path, title.as_deref(), &cancel, on_update)
                    .await
            } else if let Some(url) = &target.pdf_url {
                let paper = pdf_url_paper(url, title.as_deref());
                bar.set_message(format!("Submitting {}", paper.title));
                service.analyze(&paper, &cancel, on_update).await
            } else {
                let request = match (&target.query, &target.category) {
                    (Some(query), _) => SearchRequest::query(query),
                    (None, Some(category)) => SearchRequest::category(category),
                    (None, None) => anyhow::bail!("nothing to analyze"),
                };
                match service.first_analyzable(request.sort(sort.into())).await {
                    Ok(paper) => {
                        bar.set_message(format!("Submitting {}", paper.title));
                        service.analyze(&paper, &cancel, on_update).await
                    }
                    Err(e) => Err(e),
                }
            };

            ctrl_c.abort();
            let paper = match outcome {
                Ok(paper) => {
                    bar.finish_with_message("Analysis complete");
                    paper
                }
                Err(e) => {
                    bar.abandon_with_message("Analysis did not complete");
                    return Err(e.into());
                }
            };
            output_papers(std::slice::from_ref(&paper), cli.output)?;
        }

        Commands::Status { job_id } => {
            let job = service.poll_status(&job_id).await?;
            output_job(&job, cli.output)?;
        }

        Commands::Library { command } => {
            service.library_load().await?;
            match command {
                LibraryCommand::List => {
                    output_papers(&service.library_list().await, cli.output)?;
                }
                LibraryCommand::Get { id } => match service.library_get(&id).await? {
                    Some(paper) => output_papers(std::slice::from_ref(&paper), cli.output)?,
                    None => anyhow::bail!("no paper matching '{}' in the library", id),
                },
                LibraryCommand::Remove { id } => {
                    let removed = service.library_remove(&id).await?;
                    if !cli.quiet {
                        if removed {
                            println!("Removed {}", id);
                        } else {
                            println!("{} was not in the library", id);
                        }
                    }
                }
                LibraryCommand::View { options } => {
                    let results = service.search(options.request()?).await?;
                    output_papers(&service.library_view(&results).await, cli.output)?;
                }
            }
        }

        Commands::Chat { message, context } => {
            service.library_load().await?;
            for key in &context {
                if !service.library_set_selected(key, true).await {
                    anyhow::bail!("no paper matching '{}' in the library", key);
                }
            }
            let reply = service.chat(&message).await?;
            output_chat(&reply, cli.output)?;
        }

        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let config = if let Some(config_path) = path {
        load_config(config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        load_config(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?
    } else {
        load_from_env()?
    };
    Ok(config)
}

fn init_tracing(config: &Config, verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("paperlens={}", level)));
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Plain => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn init_config(path: Option<&Path>, force: bool, quiet: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => dirs::config_dir()
            .context("no user config directory on this platform; pass a path")?
            .join("paperlens")
            .join("config.toml"),
    };

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    std::fs::write(&path, Config::default().to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    if !quiet {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

/// A paper for a bare PDF URL
fn pdf_url_paper(url: &str, title: Option<&str>) -> Paper {
    let mut paper = Paper::new(url, title.unwrap_or(UNTITLED), PaperSource::Upload);
    paper.pdf_url = Some(url.to_string());
    paper
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

fn effective_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn output_papers(papers: &[Paper], format: OutputFormat) -> Result<()> {
    match effective_format(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(papers)?);
        }
        OutputFormat::Plain => {
            for paper in papers {
                println!("{} - {} ({})", paper.title, paper.author_line(), paper.source);
                println!("  ID: {}", paper.id);
                if let Some(ref doi) = paper.doi {
                    println!("  DOI: {}", doi);
                }
                if let Some(ref pdf_url) = paper.pdf_url {
                    println!("  PDF: {}", pdf_url);
                }
                if paper.citation_count > 0 {
                    println!("  Citations: {}", paper.citation_count);
                }
                if paper.insights.is_some() {
                    println!("  Analyzed: yes");
                }
                println!();
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Authors", "Year", "Citations", "arXiv", "Source"]);

            for paper in papers {
                table.add_row(vec![
                    Cell::new(truncate(&paper.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(&paper.author_line(), 30)),
                    Cell::new(paper.year().unwrap_or_default()),
                    Cell::new(paper.citation_count),
                    Cell::new(paper.arxiv_id.as_deref().unwrap_or("-")),
                    Cell::new(paper.source.to_string()),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn output_job(job: &AnalysisJob, format: OutputFormat) -> Result<()> {
    match effective_format(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(job)?),
        OutputFormat::Plain => {
            println!("{} {} {}%", job.job_id, job.status, job.progress);
            if let Some(ref error) = job.error {
                println!("  Error: {}", error);
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            let mut table = comfy_table::Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Job", "Status", "Progress", "Error"]);
            table.add_row(vec![
                job.job_id.clone(),
                job.status.to_string(),
                format!("{}%", job.progress),
                job.error.clone().unwrap_or_default(),
            ]);
            println!("{table}");
        }
    }
    Ok(())
}

fn output_chat(reply: &ChatReply, format: OutputFormat) -> Result<()> {
    if effective_format(format) == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(reply)?);
        return Ok(());
    }

    println!("{}", reply.answer);
    if !reply.sources.is_empty() {
        println!("\nSources:");
        for source in &reply.sources {
            let paper = source.paper_title.as_deref().unwrap_or(&source.doc_id);
            match &source.section {
                Some(section) => println!("  - {} ({}, {})", paper, source.title, section),
                None => println!("  - {} ({})", paper, source.title),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["paperlens", "-vv", "-o", "json", "--user", "alice", "library", "list"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.user, "alice");
        assert!(!cli.quiet);
    }

    #[test]
    fn test_cli_search_defaults() {
        let cli = Cli::parse_from(["paperlens", "search", "--category", "cs.AI"]);
        match cli.command {
            Commands::Search { options, save } => {
                let request = options.request().unwrap();
                assert_eq!(request, SearchRequest::category("cs.AI"));
                assert!(save.is_none());
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_with_options() {
        let cli = Cli::parse_from([
            "paperlens",
            "search",
            "--query",
            "graph neural networks",
            "--sort",
            "popular",
            "--max-results",
            "25",
            "--save",
            "out.json",
        ]);
        match cli.command {
            Commands::Search { options, save } => {
                let request = options.request().unwrap();
                assert_eq!(request.sort, SortHint::Popular);
                assert_eq!(request.max_results, 25);
                assert_eq!(save, Some(PathBuf::from("out.json")));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["paperlens", "search"]).is_err());
        assert!(Cli::try_parse_from(["paperlens", "search", "--query", "x", "--category", "cs.AI"]).is_err());
        assert!(Cli::try_parse_from(["paperlens", "search", "--sort", "best", "--query", "x"]).is_err());
    }

    #[test]
    fn test_cli_analyze_targets() {
        let cli = Cli::parse_from(["paperlens", "analyze", "--upload", "paper.pdf", "--title", "Mine"]);
        match cli.command {
            Commands::Analyze { target, title, .. } => {
                assert_eq!(target.upload, Some(PathBuf::from("paper.pdf")));
                assert_eq!(title.as_deref(), Some("Mine"));
            }
            _ => panic!("Expected Analyze command"),
        }

        assert!(Cli::try_parse_from(["paperlens", "analyze"]).is_err());
        assert!(Cli::try_parse_from([
            "paperlens",
            "analyze",
            "--pdf-url",
            "https://x/p.pdf",
            "--upload",
            "p.pdf"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_library_and_config_commands() {
        let cli = Cli::parse_from(["paperlens", "lib", "rm", "2301.00001v2"]);
        assert!(matches!(
            cli.command,
            Commands::Library {
                command: LibraryCommand::Remove { ref id }
            } if id == "2301.00001v2"
        ));

        let cli = Cli::parse_from(["paperlens", "config", "init", "/tmp/p.toml", "--force"]);
        match cli.command {
            Commands::Config {
                command: ConfigCommand::Init { path, force },
            } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/p.toml")));
                assert!(force);
            }
            _ => panic!("Expected Config init"),
        }
    }

    #[test]
    fn test_exit_codes() {
        let caller: anyhow::Error = paperlens::Error::MissingPdf {
            title: "T".to_string(),
        }
        .into();
        assert_eq!(exit_code(&caller), 2);

        let boundary: anyhow::Error =
            paperlens::Error::SourceUnavailable("down".to_string()).into();
        assert_eq!(exit_code(&boundary), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_pdf_url_paper_is_analyzable() {
        let paper = pdf_url_paper("https://example.org/p.pdf", None);
        assert!(paper.is_analyzable());
        assert_eq!(paper.title, UNTITLED);
        assert_eq!(paper.id, "https://example.org/p.pdf");
    }

    #[test]
    fn test_init_config_writes_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("paperlens.toml");

        init_config(Some(&path), false, true).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[feed]"));

        assert!(init_config(Some(&path), false, true).is_err());
        init_config(Some(&path), true, true).unwrap();
    }

    #[test]
    fn test_chat_collects_context() {
        let cli = Cli::parse_from(["paperlens", "chat", "What is new?", "-c", "p1", "--context", "2301.1"]);
        match cli.command {
            Commands::Chat { message, context } => {
                assert_eq!(message, "What is new?");
                assert_eq!(context, ["p1", "2301.1"]);
            }
            other => panic!("expected chat, got {:?}", other),
        }
    }
}
