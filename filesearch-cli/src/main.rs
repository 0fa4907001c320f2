use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use filesearch::{
    config::CliOverrides, search, search_with_cancellation, CancellationToken, ContentLoader,
    FileRegistry, PathFilter, SearchError, SearchOutput, SearchQuery, SearchSettings,
};
use indicatif::ProgressBar;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_INCLUDE: &str = "(py|js|coffee|go|yaml|scss|css|html)$";
const DEFAULT_EXCLUDE: &str = "/(node_modules|build|coverage)/";

#[derive(Parser)]
#[command(author, version, about = "Concurrent file-content search", long_about = None)]
struct Cli {
    /// Query text to search for
    query: Option<String>,

    /// Root path of source to search
    #[arg(short = 'd', long = "src-root", default_value = ".")]
    src_root: PathBuf,

    /// Regex a file path must match to enter the registry
    #[arg(long, default_value = DEFAULT_INCLUDE)]
    include: String,

    /// Regex that keeps a file path out of the registry
    #[arg(long, default_value = DEFAULT_EXCLUDE)]
    exclude: String,

    /// Narrow this query to paths matching a regex
    #[arg(long = "path-include")]
    path_include: Option<String>,

    /// Treat the query as a regular expression
    #[arg(short = 'r', long)]
    regex: bool,

    /// Number of search workers
    #[arg(short = 'j', long = "worker-count")]
    worker_count: Option<NonZeroUsize>,

    /// How much buffering between workers and feeder
    #[arg(long)]
    buffering: Option<NonZeroUsize>,

    /// Loads all file contents into memory to speed up searches
    #[arg(long = "precache-all-files")]
    precache_all_files: bool,

    /// Run a search in a loop for perf testing
    #[arg(long = "perf-test")]
    perf_test: bool,

    /// Abort the search after this long (e.g. 500ms, 10s)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Output format (text|json)
    #[arg(long, default_value = "text")]
    format: String,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long, default_value = "failfast")]
    encoding: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = SearchSettings::load_from(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(CliOverrides {
            worker_count: cli.worker_count,
            buffering: cli.buffering,
            encoding: Some(cli.encoding.parse()?),
            log_level: cli.log_level.clone(),
        });

    init_tracing(&settings.log_level);

    let startup_start = Instant::now();
    info!("Building file list...");
    let filter = PathFilter::compile(Some(&cli.include), Some(&cli.exclude))?;
    let registry = FileRegistry::build(&cli.src_root, &filter)
        .with_context(|| format!("failed to index {}", cli.src_root.display()))?;
    let loader = ContentLoader::new(settings.encoding);

    if cli.precache_all_files {
        let bar = ProgressBar::new_spinner().with_message("Caching file contents...");
        bar.enable_steady_tick(Duration::from_millis(100));
        let report = registry.prewarm(&loader);
        bar.finish_and_clear();
        if !report.failures.is_empty() {
            eprintln!(
                "{} {} files could not be cached",
                "warning:".yellow().bold(),
                report.failures.len()
            );
        }
    }

    info!(
        "Ready: {} files indexed (startup took {})",
        registry.len(),
        humantime::format_duration(startup_start.elapsed())
    );

    if cli.perf_test {
        return run_perf_test(&registry, &loader, &settings);
    }

    let Some(query_text) = cli.query else {
        bail!("a query is required unless --perf-test is set");
    };
    let mut query = SearchQuery::new(query_text)?.regex(cli.regex);
    if let Some(pattern) = cli.path_include {
        query = query.with_path_include(pattern);
    }

    let token = CancellationToken::new();
    if let Some(timeout) = cli.timeout {
        let canceller = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            canceller.cancel();
        });
    }

    let search_start = Instant::now();
    match search_with_cancellation(&registry, &loader, &query, &settings, &token) {
        Ok(output) => {
            render(&output, &cli.format)?;
            info!(
                "Search took {}",
                humantime::format_duration(search_start.elapsed())
            );
            Ok(())
        }
        Err(SearchError::Cancelled {
            completed,
            dispatched,
            partial,
        }) => {
            render(&partial, &cli.format)?;
            eprintln!(
                "{} search cancelled after {completed} of {dispatched} files; results are partial",
                "warning:".yellow().bold()
            );
            std::process::exit(2);
        }
        Err(err) => Err(err.into()),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn render(output: &SearchOutput, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
        "text" => render_text(output),
        other => bail!("unknown format '{other}' (expected text|json)"),
    }
    Ok(())
}

fn render_text(output: &SearchOutput) {
    for file_result in &output.file_results {
        println!("{}", file_result.path.display().to_string().green().bold());
        for m in &file_result.matches {
            let line = &m.line_content;
            let before = &line[..m.start];
            let hit = &line[m.start..m.end];
            let after = &line[m.end..];
            println!(
                "  {}: {}{}{}",
                m.line_number.to_string().cyan(),
                before,
                hit.red().bold(),
                after
            );
        }
    }
    for diagnostic in &output.diagnostics {
        eprintln!(
            "{} {}: {}",
            "warning:".yellow().bold(),
            diagnostic.path.display(),
            diagnostic.message
        );
    }
    println!(
        "{} matches in {} of {} files",
        output.total_matches, output.files_with_matches, output.files_searched
    );
}

fn run_perf_test(
    registry: &FileRegistry,
    loader: &ContentLoader,
    settings: &SearchSettings,
) -> Result<()> {
    let query = SearchQuery::new("PdfLoader")?.with_path_include(DEFAULT_INCLUDE);
    loop {
        let start = Instant::now();
        let output = search(registry, loader, &query, settings)?;
        println!(
            "{} {}",
            output.files_with_matches,
            humantime::format_duration(start.elapsed())
        );
    }
}
