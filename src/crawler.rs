use crate::{CrawlRequest, Spider};
use futures::stream::StreamExt;
use std::error::Error as StdError;
use std::{
    future::Future,
    io,
    path::PathBuf,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{sleep, Instant},
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

mod frontier;
mod state;
mod statistics;

use frontier::Frontier;
use state::SharedProcessingState;
pub use state::{CrawledState, StateOutcome};
pub use statistics::{CrawlSummary, Statistics};

pub struct Crawler {
    delay: Duration,
    crawling_concurrency: usize,
    processing_concurrency: usize,
    report_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub delay: Duration,
    pub crawling_concurrency: usize,
    pub processing_concurrency: usize,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            crawling_concurrency: 1,
            processing_concurrency: 1,
        }
    }
}

impl Crawler {
    pub fn new(
        report_path: Option<PathBuf>,
        CrawlerOptions {
            delay,
            crawling_concurrency,
            processing_concurrency,
        }: CrawlerOptions,
    ) -> Self {
        Self {
            delay,
            crawling_concurrency: crawling_concurrency.max(1),
            processing_concurrency: processing_concurrency.max(1),
            report_path,
        }
    }

    /// Runs `spider` until no request is left in flight or `shutdown` resolves.
    ///
    /// On shutdown, queued requests are skipped but items already scraped are still processed.
    pub async fn run<R, T, E, S>(
        &self,
        spider: Arc<dyn Spider<Request = R, Item = T, Error = E>>,
        shutdown: S,
    ) -> CrawlSummary
    where
        R: CrawlRequest,
        T: Send + 'static,
        E: StdError + Send + 'static,
        S: Future<Output = io::Result<()>> + Send + 'static,
    {
        tracing::info!("running spider '{}'", spider.name());
        let starting_time = Instant::now();
        let requests = state::new_shared_state();
        let statistics = Statistics::default();
        let processing_queue_capacity = self.processing_concurrency * 10;

        // the control loop hands out at most one request per scraper
        let (requests_tx, requests_rx) = mpsc::channel::<R>(self.crawling_concurrency);
        let (items_tx, items_rx) = mpsc::channel::<(String, T)>(processing_queue_capacity);
        let (new_requests_tx, mut new_requests_rx) =
            mpsc::channel::<(String, Vec<R>)>(self.crawling_concurrency);
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        self.launch_processors(
            &tracker,
            statistics.clone(),
            requests.clone(),
            spider.clone(),
            items_rx,
        );

        self.launch_scrapers(
            &tracker,
            statistics.clone(),
            requests.clone(),
            spider.clone(),
            requests_rx,
            new_requests_tx,
            items_tx,
            token.clone(),
        );

        let listener_token = token.clone();
        tracker.spawn(async move {
            tokio::select! {
                result = shutdown => match result {
                    Ok(()) => {
                        tracing::warn!("crawler: shutdown requested");
                        listener_token.cancel();
                    }
                    Err(error) => tracing::error!("Failed to listen for event: {:?}", error),
                },
                _ = listener_token.cancelled() => {}
            }
        });
        tracker.close();

        let mut frontier = Frontier::default();
        for request in spider.start_requests() {
            let key = request.key();
            tracing::info!(start_request = key);
            if mark_queued(&requests, &key).await {
                frontier.push(request);
            }
        }

        // every dispatched request answers exactly once on `new_requests_rx`
        let mut in_flight = 0usize;
        'crawl: loop {
            while in_flight < self.crawling_concurrency && !token.is_cancelled() {
                let Some(request) = frontier.pop() else {
                    break;
                };
                tracing::debug!("dispatching: {}", request.key());
                if requests_tx.send(request).await.is_err() {
                    tracing::error!("crawler: scrapers stopped early");
                    break 'crawl;
                }
                in_flight += 1;
            }
            if in_flight == 0 {
                break;
            }

            let received = tokio::select! {
                _ = token.cancelled() => {
                    tracing::warn!(
                        in_flight,
                        queued = frontier.len(),
                        "crawler: cancelled with requests left"
                    );
                    break;
                }
                received = new_requests_rx.recv() => received,
            };
            let Some((key, new_requests)) = received else {
                break;
            };
            in_flight -= 1;
            tracing::trace!(key, new_requests = new_requests.len(), "crawler: scraped");

            for request in new_requests {
                if mark_queued(&requests, &request.key()).await {
                    frontier.push(request);
                }
            }
        }

        tracing::info!("crawler: control loop exited");

        while let Some(request) = frontier.pop() {
            statistics.num_skipped.fetch_add(1, Ordering::SeqCst);
            let key = request.key();
            tracing::debug!("skipping: {}", key);
            if let Some(state) = requests.write().await.get_mut(&key) {
                state.scrape_skipped();
            }
        }

        // close the request stream so the scrapers, and after them the processors, finish
        drop(requests_tx);
        drop(new_requests_rx);
        token.cancel();
        tracker.wait().await;

        state::write_report(self.report_path.as_deref(), requests).await;

        statistics.write_to_log(starting_time.elapsed());
        statistics.summary()
    }

    fn launch_processors<R, T, E>(
        &self,
        tracker: &TaskTracker,
        statistics: Statistics,
        requests: SharedProcessingState,
        spider: Arc<dyn Spider<Request = R, Item = T, Error = E>>,
        items: mpsc::Receiver<(String, T)>,
    ) where
        R: CrawlRequest,
        T: Send + 'static,
        E: StdError + Send + 'static,
    {
        let concurrency = self.processing_concurrency;
        tracker.spawn(async move {
            tokio_stream::wrappers::ReceiverStream::new(items)
                .for_each_concurrent(concurrency, |(key, item)| async {
                    statistics.num_processings.fetch_add(1, Ordering::SeqCst);
                    match spider.process(key.clone(), item).await {
                        Err(err) => {
                            statistics.num_process_errors.fetch_add(1, Ordering::SeqCst);
                            tracing::error!(request = key, "Processing error: {}", err);
                            requests
                                .write()
                                .await
                                .entry(key)
                                .and_modify(|state| state.process_error(err.to_string()))
                                .or_insert_with(|| {
                                    CrawledState::queued_and_process_error(err.to_string())
                                });
                        }
                        Ok(output) => {
                            requests
                                .write()
                                .await
                                .entry(key)
                                .and_modify(|state| state.processed_ok(&output))
                                .or_insert_with(|| CrawledState::queued_and_processed_ok(&output));
                        }
                    }
                })
                .await;
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn launch_scrapers<R, T, E>(
        &self,
        tracker: &TaskTracker,
        statistics: Statistics,
        requests: SharedProcessingState,
        spider: Arc<dyn Spider<Request = R, Item = T, Error = E>>,
        requests_to_visit: mpsc::Receiver<R>,
        new_requests_tx: mpsc::Sender<(String, Vec<R>)>,
        items_tx: mpsc::Sender<(String, T)>,
        token: CancellationToken,
    ) where
        R: CrawlRequest,
        T: Send + 'static,
        E: StdError + Send + 'static,
    {
        let concurrency = self.crawling_concurrency;
        let delay = self.delay;
        tracker.spawn(async move {
            tokio_stream::wrappers::ReceiverStream::new(requests_to_visit)
                .for_each_concurrent(concurrency, |request| async {
                    let key = request.key();
                    if token.is_cancelled() {
                        statistics.num_skipped.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!("skipping: {}", key);
                        if let Some(state) = requests.write().await.get_mut(&key) {
                            state.scrape_skipped();
                        }
                        let _ = new_requests_tx.send((key, Vec::new())).await;
                        return;
                    }

                    statistics.num_scrapings.fetch_add(1, Ordering::SeqCst);
                    let new_requests = match spider.scrape(request).await {
                        Err(err) => {
                            statistics.num_scrape_errors.fetch_add(1, Ordering::SeqCst);
                            tracing::error!(request = key, "Scraping error: {}", err);
                            requests
                                .write()
                                .await
                                .entry(key.clone())
                                .and_modify(|state| state.scrape_error(err.to_string()))
                                .or_insert_with(|| {
                                    CrawledState::queued_and_scrape_error(err.to_string())
                                });
                            Vec::new()
                        }
                        Ok((items, new_requests)) => {
                            requests
                                .write()
                                .await
                                .entry(key.clone())
                                .and_modify(|state| state.scraped_ok())
                                .or_insert_with(CrawledState::queued_and_scraped_ok);
                            for item in items {
                                let _ = items_tx.send((key.clone(), item)).await;
                            }
                            new_requests
                        }
                    };

                    let _ = new_requests_tx.send((key, new_requests)).await;
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                })
                .await;

            drop(items_tx);
        });
    }
}

/// Records `key` as queued, `false` if it was already seen in this run.
async fn mark_queued(requests: &SharedProcessingState, key: &str) -> bool {
    let mut requests = requests.write().await;
    if requests.contains_key(key) {
        tracing::trace!("already queued: {}", key);
        return false;
    }
    requests.insert(key.to_string(), CrawledState::queued());
    true
}
