use std::{
    collections::HashMap,
    future,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jobcrawler::{
    fetch::{FetchError, PageFetcher},
    headhunter::{HeadHunterOptions, HeadHunterSpider, JobRecord},
    Crawler, CrawlerOptions, DatasetSink,
};
use tokio::sync::{Mutex, Notify};
use url::Url;

const ROOT: &str = "https://spb.hh.ru/";
const PAGE_QUERY: &str = "disableBrowserCache=true&hhtmFrom=vacancy_search_list";

/// Serves canned pages and records what was asked for.
#[derive(Default)]
struct StaticFetcher {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    fn with(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().await.push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

fn category_index() -> String {
    r#"<ul class="multiple-column-list">
        <li class="multiple-column-list-item"><a class="bloko-link" href="/catalog/it">IT</a></li>
        <li class="multiple-column-list-item"><a class="bloko-link" href="/catalog/sales">Sales</a></li>
    </ul>"#
        .to_string()
}

fn pager(last: usize) -> String {
    (1..=last)
        .map(|page| format!(r#"<a class="bloko-button" data-qa="pager-page">{page}</a>"#))
        .collect()
}

fn search_page(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| {
            format!(
                r#"<a class="serp-item__title" data-qa="serp-item__title" href="https://spb.hh.ru/vacancy/{id}?from=serp">Job {id}</a>"#
            )
        })
        .collect()
}

fn listing(title: &str, company: &str) -> String {
    format!(
        r#"<div class="vacancy-title"><h1 class="bloko-header-section-1">{title}</h1></div>
        <span class="bloko-header-section-2 bloko-header-section-2_lite" data-qa="bloko-header-2">{company}</span>
        <span data-qa="vacancy-experience">1–3 years</span>
        <div class="bloko-tag bloko-tag_inline">SQL</div>"#
    )
}

fn page(category: &str, page: usize) -> String {
    format!("https://spb.hh.ru/catalog/{category}?page={page}&{PAGE_QUERY}")
}

fn listing_url(id: &str) -> String {
    format!("https://spb.hh.ru/vacancy/{id}?from=serp")
}

/// Two categories: `it` with two result pages, `sales` without a pager.
/// Listing 33333333 is missing and fails to fetch.
fn site() -> StaticFetcher {
    StaticFetcher::default()
        .with(ROOT, category_index())
        .with("https://spb.hh.ru/catalog/it", pager(2))
        .with("https://spb.hh.ru/catalog/sales", "<html>no pager</html>")
        .with(listing_url("11111111"), listing("Rust developer", "Ferris"))
        .with(listing_url("22222222"), listing("Go developer", "Gopher"))
        .with(listing_url("44444444"), listing("Account manager", "Acme"))
}

fn search_pages() -> StaticFetcher {
    StaticFetcher::default()
        .with(page("it", 0), search_page(&["11111111", "22222222"]))
        .with(page("it", 1), search_page(&["33333333"]))
        .with(page("sales", 0), search_page(&["44444444"]))
}

fn sequential() -> CrawlerOptions {
    CrawlerOptions {
        delay: Duration::ZERO,
        crawling_concurrency: 1,
        processing_concurrency: 1,
    }
}

async fn crawl(options: HeadHunterOptions) -> (Vec<JobRecord>, Arc<StaticFetcher>) {
    let (records, pages, _) = crawl_site(site(), search_pages(), options).await;
    (records, pages)
}

async fn crawl_site(
    pages: StaticFetcher,
    search_pages: StaticFetcher,
    options: HeadHunterOptions,
) -> (Vec<JobRecord>, Arc<StaticFetcher>, Arc<StaticFetcher>) {
    let dataset = DatasetSink::default();
    let pages = Arc::new(pages);
    let search_pages = Arc::new(search_pages);
    let spider = Arc::new(HeadHunterSpider::new(
        Url::parse(ROOT).unwrap(),
        pages.clone(),
        search_pages.clone(),
        dataset.clone(),
        options,
    ));

    Crawler::new(None, sequential())
        .run(spider, future::pending::<std::io::Result<()>>())
        .await;

    (dataset.snapshot().await.data, pages, search_pages)
}

#[tokio::test]
async fn crawls_every_category_page_and_listing() {
    let (records, _) = crawl(HeadHunterOptions::default()).await;

    let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
    assert_eq!(ids, vec!["11111111", "22222222", "44444444"]);

    assert_eq!(
        records[0],
        JobRecord {
            id: Some("11111111".into()),
            job_title: Some("Rust developer".into()),
            company_name: Some("Ferris".into()),
            location: None,
            required_experience: Some("1–3 years".into()),
            job_market: "IT".into(),
            description: None,
            required_skills: Some("Sql".into()),
        }
    );
    assert_eq!(records[2].job_market, "Sales");
}

#[tokio::test]
async fn limit_stops_the_crawl() {
    let (records, pages) = crawl(HeadHunterOptions {
        limit: Some(2),
        ..HeadHunterOptions::default()
    }).await;

    let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
    assert_eq!(ids, vec!["11111111", "22222222"]);

    let requested = pages.requested.lock().await;
    assert!(!requested.contains(&listing_url("44444444")));
}

#[tokio::test]
async fn failed_listings_count_towards_the_limit() {
    // 11111111, 22222222 and the missing 33333333 use up the limit before the sales listing
    let (records, _) = crawl(HeadHunterOptions {
        limit: Some(3),
        ..HeadHunterOptions::default()
    }).await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.job_market == "IT"));
}

#[tokio::test]
async fn unreachable_site_gives_an_empty_dataset() {
    let dataset = DatasetSink::<JobRecord>::default();
    let spider = Arc::new(HeadHunterSpider::new(
        Url::parse(ROOT).unwrap(),
        Arc::new(StaticFetcher::default()),
        Arc::new(StaticFetcher::default()),
        dataset.clone(),
        HeadHunterOptions::default(),
    ));

    let summary = Crawler::new(None, sequential())
        .run(spider, future::pending::<std::io::Result<()>>())
        .await;

    assert_eq!(summary.num_scrapings, 1);
    assert_eq!(summary.num_scrape_errors, 1);
    assert!(dataset.is_empty().await);
}

#[tokio::test]
async fn limit_skips_result_pages_it_no_longer_needs() {
    let categories: String = (0..5)
        .map(|n| {
            format!(
                r#"<li class="multiple-column-list-item"><a class="bloko-link" href="/catalog/c{n}">Category {n}</a></li>"#
            )
        })
        .collect();
    let mut pages = StaticFetcher::default().with(
        ROOT,
        format!(r#"<ul class="multiple-column-list">{categories}</ul>"#),
    );
    let mut search = StaticFetcher::default();
    for n in 0..5 {
        pages = pages.with(format!("https://spb.hh.ru/catalog/c{n}"), pager(10));
        for p in 0..10 {
            let id = format!("{n}{p}000000");
            pages = pages.with(listing_url(&id), listing("Job", "Acme"));
            search = search.with(page(&format!("c{n}"), p), search_page(&[&id]));
        }
    }

    let (records, pages, search) = crawl_site(
        pages,
        search,
        HeadHunterOptions {
            limit: Some(1),
            ..HeadHunterOptions::default()
        },
    )
    .await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_deref(), Some("00000000"));
    assert_eq!(search.requested.lock().await.len(), 1);
    // the category index and the first category's pager, then the listing
    assert_eq!(pages.requested.lock().await.len(), 3);
}

#[tokio::test]
async fn every_listing_link_gives_a_record() {
    // both categories point at the same catalog, whose two pages link the same vacancy
    let pages = StaticFetcher::default()
        .with(
            ROOT,
            r#"<ul class="multiple-column-list">
                <li class="multiple-column-list-item"><a class="bloko-link" href="/catalog/it">IT</a></li>
                <li class="multiple-column-list-item"><a class="bloko-link" href="/catalog/it">Software</a></li>
            </ul>"#,
        )
        .with("https://spb.hh.ru/catalog/it", pager(2))
        .with(listing_url("11111111"), listing("Rust developer", "Ferris"));
    let search = StaticFetcher::default()
        .with(page("it", 0), search_page(&["11111111"]))
        .with(page("it", 1), search_page(&["11111111"]));

    let (records, _, search) = crawl_site(pages, search, HeadHunterOptions::default()).await;

    let markets: Vec<_> = records.iter().map(|r| r.job_market.as_str()).collect();
    assert_eq!(markets, vec!["IT", "IT", "Software", "Software"]);
    assert!(records.iter().all(|r| r.id.as_deref() == Some("11111111")));
    assert_eq!(search.requested.lock().await.len(), 4);
}

#[tokio::test]
async fn delay_applies_to_listings_only() {
    let delay = Duration::from_millis(200);
    let started = Instant::now();

    let (records, _) = crawl(HeadHunterOptions {
        limit: None,
        delay,
    })
    .await;

    // four listings are attempted, six other pages are fetched without pause
    let elapsed = started.elapsed();
    assert_eq!(records.len(), 3);
    assert!(elapsed >= delay * 4, "{elapsed:?}");
    assert!(elapsed < delay * 9, "{elapsed:?}");
}

/// Serves `site()` and fires `fired` once `trigger` has been fetched.
struct TriggerFetcher {
    pages: StaticFetcher,
    trigger: String,
    fired: Arc<Notify>,
}

#[async_trait]
impl PageFetcher for TriggerFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let html = self.pages.fetch(url).await;
        if url == self.trigger {
            self.fired.notify_one();
            // let the crawler see the shutdown before this listing is done
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        html
    }
}

#[tokio::test]
async fn shutdown_keeps_the_records_scraped_so_far() {
    let fired = Arc::new(Notify::new());
    let dataset = DatasetSink::<JobRecord>::default();
    let spider = Arc::new(HeadHunterSpider::new(
        Url::parse(ROOT).unwrap(),
        Arc::new(TriggerFetcher {
            pages: site(),
            trigger: listing_url("22222222"),
            fired: fired.clone(),
        }),
        Arc::new(search_pages()),
        dataset.clone(),
        HeadHunterOptions::default(),
    ));
    let shutdown = async move {
        fired.notified().await;
        Ok::<(), std::io::Error>(())
    };

    let summary = Crawler::new(None, sequential()).run(spider, shutdown).await;

    let ids: Vec<_> = dataset
        .snapshot()
        .await
        .data
        .into_iter()
        .filter_map(|record| record.id)
        .collect();
    assert_eq!(ids, vec!["11111111", "22222222"]);
    assert!(summary.num_skipped > 0);
}
