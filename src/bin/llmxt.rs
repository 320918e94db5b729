use std::process::ExitCode;

use clap::Parser;
use llmxt::composer;
use llmxt::crawler::{CrawlEngine, RateLimitedFetcher, RobotsChecker};
use llmxt::models::CrawlConfig;
use llmxt::ranker;
use tokio_util::sync::CancellationToken;

/// A synchronous, single-process run of the crawl -> rank -> compose
/// pipeline, driving the same library code as the job runtime.
#[derive(Debug, Parser)]
#[command(name = "llmxt", version, about = "Generate llm.txt from a documentation site")]
struct Cli {
    /// Seed URL to crawl.
    #[arg(long)]
    url: String,

    /// Output path for the budgeted llm.txt.
    #[arg(long, default_value = "llm.txt")]
    output: String,

    /// Also write an unabridged `<output>.full.txt`.
    #[arg(long)]
    full: bool,

    #[arg(long, default_value_t = 150)]
    max_pages: u32,

    #[arg(long, default_value_t = 5)]
    max_depth: u32,

    /// Byte budget, in KB, for the composed llm.txt.
    #[arg(long, default_value_t = 200)]
    max_kb: u32,

    #[arg(long)]
    no_robots: bool,

    /// Per-request delay in seconds.
    #[arg(long, default_value_t = 1.0)]
    delay: f64,

    /// Maximum fetch rate, in requests per second per domain.
    #[arg(long, default_value_t = 2)]
    max_concurrent_fetches: u32,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), String> {
    let respect_robots = !cli.no_robots;
    let crawl_config = CrawlConfig {
        max_pages: cli.max_pages,
        max_depth: cli.max_depth,
        request_delay_seconds: cli.delay,
        user_agent: "llm-txt-generator/0.1.0".to_string(),
        respect_robots,
        follow_redirects: true,
        timeout_seconds: 30,
        language: "en".to_string(),
    };

    let robots = if respect_robots {
        let domain = url::Url::parse(&cli.url)
            .map_err(|e| format!("invalid seed URL: {e}"))?
            .host_str()
            .map(|h| h.to_string());
        match domain {
            Some(domain) => RobotsChecker::new(&domain).await.ok(),
            None => None,
        }
    } else {
        None
    };

    let fetcher = RateLimitedFetcher::new(
        cli.max_concurrent_fetches,
        crawl_config.timeout_seconds,
        &crawl_config.user_agent,
    );
    let engine = CrawlEngine::new(fetcher, robots, crawl_config);
    let cancel = CancellationToken::new();
    let verbose = cli.verbose;

    let result = engine
        .crawl(&cli.url, &cancel, |progress| {
            if verbose {
                let status = progress
                    .status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                eprintln!("depth={} status={} {}", progress.depth, status, progress.url);
            }
        })
        .await
        .map_err(|e| e.to_string())?;

    if result.pages.is_empty() {
        return Err("No pages could be crawled".to_string());
    }

    let ranked = ranker::rank(result.pages.clone());
    let llm_txt = composer::compose_llm_txt(&ranked, cli.max_kb, None).await;

    std::fs::write(&cli.output, &llm_txt).map_err(|e| format!("failed to write {}: {e}", cli.output))?;

    if cli.full {
        let llms_full_txt = composer::compose_llms_full_txt(&ranked);
        let full_path = format!("{}.full.txt", cli.output);
        std::fs::write(&full_path, &llms_full_txt)
            .map_err(|e| format!("failed to write {full_path}: {e}"))?;
    }

    println!(
        "Crawled {} pages ({} failed), wrote {} ({:.1} KB)",
        result.pages.len(),
        result.failed_urls.len(),
        cli.output,
        llm_txt.len() as f64 / 1024.0
    );

    Ok(())
}
