use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;

use super::{FetchError, PageFetcher};
use crate::UserAgents;

/// Fetches pages with a plain GET request, using a random user agent each time.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agents: UserAgents,
}

impl HttpFetcher {
    pub fn new(user_agents: UserAgents, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agents,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agents.random())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}
