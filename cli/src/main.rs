use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use jobcrawler::{
    fetch::{BrowserFetcher, BrowserOptions, HttpFetcher, PageFetcher},
    headhunter::{
        extract, HeadHunterOptions, HeadHunterSpider, HhRequest, JobRecord, LocationTable,
        ScrapeError,
    },
    Crawler, CrawlerOptions, DatasetSink, Spider, UserAgents,
};
use tokio::signal;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Renderer {
    /// Render result pages in headless Chromium
    Browser,
    /// Fetch result pages with plain HTTP requests
    Http,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Crawl HeadHunter job listings into a JSON dataset", long_about = None)]
struct Cli {
    /// Country of the HeadHunter site
    #[arg(long, default_value = "russia")]
    country: String,

    /// City subdomain of the HeadHunter site
    #[arg(long, default_value = "spb")]
    city: String,

    /// File the dataset is written to
    #[arg(short, long, default_value = "dataset.json")]
    output: PathBuf,

    /// Maximum number of job listings to scrape, 0 for no limit
    #[arg(short, long, default_value_t = 1000)]
    limit: usize,

    /// Pause before each job listing is fetched, in milliseconds
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,

    /// Number of pages fetched concurrently
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// How search result pages are fetched
    #[arg(long, value_enum, default_value_t = Renderer::Browser)]
    renderer: Renderer,

    /// Chromium binary, auto detected if not given
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// How long the browser waits for listings to appear, in milliseconds
    #[arg(long, default_value_t = 5000)]
    browser_wait_ms: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Use this user agent instead of a random one per request
    #[arg(long)]
    user_agent: Option<String>,

    /// JSON file with the countries and cities to use instead of the built-in ones
    #[arg(long)]
    locations: Option<PathBuf>,

    /// Write the state of every crawled page to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .context("telemetry: Creating EnvFilter")?,
        )
        .init();

    let cli = Cli::parse();
    parse_job_listings(cli).await
}

async fn parse_job_listings(cli: Cli) -> anyhow::Result<()> {
    let locations = match &cli.locations {
        Some(path) => LocationTable::from_path(path)
            .with_context(|| format!("failed to load locations from '{}'", path.display()))?,
        None => LocationTable::default(),
    };
    let url = locations.url_from_location(&cli.country, &cli.city)?;
    tracing::info!(
        "Scraping job listings for {}, {} from: {}",
        cli.city,
        cli.country,
        url
    );

    let timeout = Duration::from_secs(cli.timeout_secs);
    let user_agents = match &cli.user_agent {
        Some(user_agent) => UserAgents::fixed(user_agent.clone()),
        None => UserAgents::default(),
    };
    let pages: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(user_agents.clone(), timeout)?);
    let search_pages: Arc<dyn PageFetcher> = match cli.renderer {
        Renderer::Http => pages.clone(),
        Renderer::Browser => Arc::new(
            BrowserFetcher::launch(BrowserOptions {
                chrome_executable: cli.chrome.clone(),
                user_agent: Some(user_agents.random().to_string()),
                wait: Duration::from_millis(cli.browser_wait_ms),
                wait_for_selector: Some(extract::LISTING_LINK_CSS.to_string()),
                timeout,
            })
            .await
            .context("failed to start the browser")?,
        ),
    };

    let dataset = DatasetSink::<JobRecord>::default();
    let spider: Arc<dyn Spider<Request = HhRequest, Item = JobRecord, Error = ScrapeError>> =
        Arc::new(HeadHunterSpider::new(
            url,
            pages,
            search_pages.clone(),
            dataset.clone(),
            HeadHunterOptions {
                limit: (cli.limit > 0).then_some(cli.limit),
                delay: Duration::from_millis(cli.delay_ms),
            },
        ));

    let crawler = Crawler::new(
        cli.report.clone(),
        CrawlerOptions {
            delay: Duration::ZERO,
            crawling_concurrency: cli.concurrency,
            processing_concurrency: 1,
        },
    );
    let summary = crawler.run(spider, signal::ctrl_c()).await;

    if let Err(err) = search_pages.shutdown().await {
        tracing::warn!("failed to shut down the browser: {}", err);
    }

    dataset
        .write_json(&cli.output)
        .await
        .with_context(|| format!("failed to write dataset to '{}'", cli.output.display()))?;

    let records = dataset.len().await;
    tracing::info!(
        records,
        scrape_errors = summary.num_scrape_errors,
        "Job listings scraped successfully!"
    );
    Ok(())
}
