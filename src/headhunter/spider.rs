use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use url::Url;

use super::{extract, JobRecord};
use crate::{
    fetch::{FetchError, PageFetcher},
    CrawlRequest, DatasetSink, Spider,
};

/// Every this many attempted listings a progress line is logged.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// What a request points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    CategoryIndex,
    Category { name: String },
    SearchPage { category: String, page: usize, total: usize },
    /// `position` is the link's index on result page `page`.
    Listing {
        category: String,
        page: usize,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HhRequest {
    pub url: Url,
    pub target: Target,
}

impl CrawlRequest for HhRequest {
    /// Unique per link followed, so a listing linked twice is scraped twice.
    fn key(&self) -> String {
        match &self.target {
            Target::CategoryIndex => self.url.to_string(),
            Target::Category { name } => format!("{} [{}]", self.url, name),
            Target::SearchPage { category, .. } => format!("{} [{}]", self.url, category),
            Target::Listing {
                category,
                page,
                position,
            } => format!("{} [{} p{} #{}]", self.url, category, page, position),
        }
    }

    fn depth(&self) -> usize {
        match self.target {
            Target::CategoryIndex => 0,
            Target::Category { .. } => 1,
            Target::SearchPage { .. } => 2,
            Target::Listing { .. } => 3,
        }
    }
}

impl fmt::Display for HhRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.target, self.url)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadHunterOptions {
    /// Maximum number of listings to attempt, `None` for no limit.
    pub limit: Option<usize>,
    /// Pause before each listing is fetched.
    pub delay: Duration,
}

/// Walks category index → categories → result pages → listings of one HeadHunter site.
pub struct HeadHunterSpider {
    root: Url,
    pages: Arc<dyn PageFetcher>,
    search_pages: Arc<dyn PageFetcher>,
    dataset: DatasetSink<JobRecord>,
    limit: Option<usize>,
    delay: Duration,
    attempted: AtomicUsize,
}

impl HeadHunterSpider {
    /// `pages` fetches the category index, categories and listings, `search_pages` the
    /// result pages.
    pub fn new(
        root: Url,
        pages: Arc<dyn PageFetcher>,
        search_pages: Arc<dyn PageFetcher>,
        dataset: DatasetSink<JobRecord>,
        HeadHunterOptions { limit, delay }: HeadHunterOptions,
    ) -> Self {
        Self {
            root,
            pages,
            search_pages,
            dataset,
            limit,
            delay,
            attempted: AtomicUsize::new(0),
        }
    }

    /// Number of listings attempted so far, failed ones included.
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.attempted() >= limit)
    }

    async fn scrape_category_index(&self, url: Url) -> Result<Vec<HhRequest>, ScrapeError> {
        let html = self.pages.fetch(url.as_str()).await?;
        let categories = extract::parse_categories(&url, &html);
        tracing::info!("found {} categories", categories.len());
        Ok(categories
            .into_iter()
            .map(|category| HhRequest {
                url: category.url,
                target: Target::Category {
                    name: category.name,
                },
            })
            .collect())
    }

    async fn scrape_category(&self, url: Url, name: String) -> Result<Vec<HhRequest>, ScrapeError> {
        tracing::info!("Scraping job listings for category '{}'", name);
        let total = match self.pages.fetch(url.as_str()).await {
            Ok(html) => extract::max_page(&html),
            Err(err) => {
                tracing::warn!(url = %url, "failed to read pager, assuming one page: {}", err);
                1
            }
        };
        tracing::info!("Total pages in category: {}", total);

        (0..total)
            .map(|page| -> Result<HhRequest, ScrapeError> {
                Ok(HhRequest {
                    url: Url::parse(&extract::page_url(url.as_str(), page))?,
                    target: Target::SearchPage {
                        category: name.clone(),
                        page,
                        total,
                    },
                })
            })
            .collect()
    }

    async fn scrape_search_page(
        &self,
        url: Url,
        category: String,
        page: usize,
        total: usize,
    ) -> Result<Vec<HhRequest>, ScrapeError> {
        tracing::info!(
            category,
            "Scraping job listings on page {} of {}",
            page + 1,
            total
        );
        let html = self.search_pages.fetch(url.as_str()).await?;
        let links = extract::listing_links(&url, &html);
        tracing::debug!(category, page, "found {} listings", links.len());
        Ok(links
            .into_iter()
            .enumerate()
            .map(|(position, url)| HhRequest {
                url,
                target: Target::Listing {
                    category: category.clone(),
                    page,
                    position,
                },
            })
            .collect())
    }

    async fn scrape_listing(
        &self,
        url: Url,
        category: String,
    ) -> Result<Option<JobRecord>, ScrapeError> {
        let attempt = self.attempted.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.limit {
            if attempt >= limit {
                return Ok(None);
            }
            if attempt + 1 == limit {
                tracing::info!("reached the limit of {} job listings", limit);
            }
        }
        if logs_progress(attempt) {
            tracing::info!("Job listing {} scraped", attempt + 1);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let html = self.pages.fetch(url.as_str()).await?;
        Ok(Some(extract::parse_listing(url.as_str(), &html, &category)))
    }
}

/// Whether the listing at 0-based `attempt` gets a progress line: 1st, 51st, 101st...
fn logs_progress(attempt: usize) -> bool {
    attempt % PROGRESS_EVERY == 0
}

#[async_trait]
impl Spider for HeadHunterSpider {
    type Request = HhRequest;
    type Item = JobRecord;
    type Error = ScrapeError;

    fn name(&self) -> String {
        format!("headhunter ({})", self.root.host_str().unwrap_or_default())
    }

    fn start_requests(&self) -> Vec<HhRequest> {
        vec![HhRequest {
            url: self.root.clone(),
            target: Target::CategoryIndex,
        }]
    }

    async fn scrape(
        &self,
        request: HhRequest,
    ) -> Result<(Vec<JobRecord>, Vec<HhRequest>), ScrapeError> {
        if self.limit_reached() {
            tracing::trace!("limit reached, skipping {}", request);
            return Ok((Vec::new(), Vec::new()));
        }

        let HhRequest { url, target } = request;
        match target {
            Target::CategoryIndex => Ok((Vec::new(), self.scrape_category_index(url).await?)),
            Target::Category { name } => Ok((Vec::new(), self.scrape_category(url, name).await?)),
            Target::SearchPage {
                category,
                page,
                total,
            } => Ok((
                Vec::new(),
                self.scrape_search_page(url, category, page, total).await?,
            )),
            Target::Listing { category, .. } => {
                let records = self.scrape_listing(url, category).await?;
                Ok((records.into_iter().collect(), Vec::new()))
            }
        }
    }

    async fn process(&self, key: String, item: JobRecord) -> Result<String, ScrapeError> {
        tracing::trace!(key, "collecting record");
        let id = item.id.clone().unwrap_or_default();
        self.dataset.push(item).await;
        Ok(id)
    }
}
