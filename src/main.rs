//! parallel-search command line entry point
//!
//! Runs one query through the tiered executor and prints the merged result
//! set as JSON.

use anyhow::{anyhow, bail, Result};
use parallel_search::{
    config,
    network::HttpClient,
    search::{ParallelSearchExecutor, SearchOptions},
    tools::ToolLoader,
    ResultKind,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    budget_ms: Option<u64>,
    min_results: Option<usize>,
    max_results: Option<usize>,
    kinds: Vec<ResultKind>,
    recency_days: Option<u64>,
    exhaustive: bool,
    stats: bool,
    query: Vec<String>,
}

enum Command {
    Search(Args),
    Help,
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(std::env::args().skip(1))? {
        Command::Search(args) => args,
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Version => {
            println!("parallel-search {}", parallel_search::VERSION);
            return Ok(());
        }
    };

    info!("Starting parallel-search v{}", parallel_search::VERSION);

    let settings = config::load(args.config.as_deref())?;
    let client = HttpClient::with_settings(&settings.outgoing)?;
    let registry = ToolLoader::load(&settings, client)?;
    let executor = ParallelSearchExecutor::from_settings(&settings, registry);

    let mut options = SearchOptions::from(&settings.executor);
    if let Some(budget) = args.budget_ms {
        options = options.with_budget(Duration::from_millis(budget));
    }
    if let Some(min) = args.min_results {
        options = options.with_min_results(min);
    }
    if let Some(max) = args.max_results {
        options = options.with_max_results(max);
    }
    if !args.kinds.is_empty() {
        options = options.with_kinds(args.kinds.iter().copied());
    }
    if let Some(days) = args.recency_days {
        options = options.with_recency_bias(recency_half_life(days)?);
    }
    if args.exhaustive {
        options = options.exhaustive();
    }

    let query = args.query.join(" ");
    let merged = executor.execute(&query, &options).await?;
    println!("{}", serde_json::to_string_pretty(&merged)?);

    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&executor.tool_stats())?);
    }

    Ok(())
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Command> {
    let mut args = Args::default();

    while let Some(arg) = raw.next() {
        let mut value = |name: &str| raw.next().ok_or_else(|| anyhow!("{} requires a value", name));

        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            "-c" | "--config" => args.config = Some(PathBuf::from(value(&arg)?)),
            "--budget-ms" => args.budget_ms = Some(value(&arg)?.parse()?),
            "--min-results" => args.min_results = Some(value(&arg)?.parse()?),
            "--max-results" => args.max_results = Some(value(&arg)?.parse()?),
            "--recency-days" => args.recency_days = Some(value(&arg)?.parse()?),
            "--kind" => args.kinds.push(parse_kind(&value(&arg)?)?),
            "--exhaustive" => args.exhaustive = true,
            "--stats" => args.stats = true,
            flag if flag.starts_with("--") => bail!("unknown option: {}", flag),
            _ => args.query.push(arg.clone()),
        }
    }

    if args.query.is_empty() {
        bail!("missing query (see --help)");
    }
    Ok(Command::Search(args))
}

fn recency_half_life(days: u64) -> Result<Duration> {
    days.checked_mul(86_400)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow!("--recency-days {} is out of range", days))
}

fn parse_kind(raw: &str) -> Result<ResultKind> {
    match raw.to_ascii_lowercase().as_str() {
        "text" => Ok(ResultKind::Text),
        "image" | "images" => Ok(ResultKind::Image),
        "video" | "videos" => Ok(ResultKind::Video),
        other => bail!("unknown result kind: {}", other),
    }
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
parallel-search v{}
Tiered, deadline-bounded search across several providers

USAGE:
    parallel-search [OPTIONS] <QUERY>...

OPTIONS:
    -c, --config <FILE>      Path to configuration file
        --budget-ms <MS>     Overall latency budget
        --min-results <N>    Skip lower tiers once N results are in
        --max-results <N>    Cap on returned results
        --kind <KIND>        Requested result kind (text, image, video); repeatable
        --recency-days <D>   Halve scores every D days of result age
        --exhaustive         Always query medium and low priority tools
        --stats              Print per-tool statistics to stderr
    -h, --help               Print help information
    -V, --version            Print version information

ENVIRONMENT VARIABLES:
    PSEARCH_SETTINGS_PATH    Path to settings.yml
    PSEARCH_BUDGET_MS        Default budget in milliseconds
    PSEARCH_MIN_RESULTS      Default sufficiency threshold
    PSEARCH_MAX_CONCURRENCY  Cap on concurrent provider calls
    SERPER_API_KEY           API key for the serper tools
    RUST_LOG                 Log filter (default: info)
"#,
        parallel_search::VERSION
    );
}
