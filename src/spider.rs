use std::error::Error as StdError;

use async_trait::async_trait;

/// A unit of work handed to a [`Spider`].
///
/// The key identifies the request in the crawl state, a key is only queued once per run.
pub trait CrawlRequest: Clone + Send + Sync + 'static {
    fn key(&self) -> String;

    /// Deeper requests are scraped before shallower ones, so a crawl goes depth first.
    /// Requests of equal depth are scraped in the order they were found.
    fn depth(&self) -> usize {
        0
    }
}

impl CrawlRequest for String {
    fn key(&self) -> String {
        self.clone()
    }
}

#[async_trait]
pub trait Spider: Send + Sync {
    type Request: CrawlRequest;
    type Item: Send + 'static;
    type Error: StdError + Send + 'static;

    fn name(&self) -> String;
    fn start_requests(&self) -> Vec<Self::Request>;
    async fn scrape(
        &self,
        request: Self::Request,
    ) -> Result<(Vec<Self::Item>, Vec<Self::Request>), Self::Error>;
    async fn process(&self, key: String, item: Self::Item) -> Result<String, Self::Error>;
}
