use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CrawledState {
    queued: DateTime<Utc>,
    scraped_at: Option<DateTime<Utc>>,
    scrape_result: Option<StateOutcome>,
    processed_at: Option<DateTime<Utc>>,
    process_result: Option<StateOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "status", content = "outcome")]
pub enum StateOutcome {
    Ok(String),
    Error(String),
    Skipped,
}

impl Default for CrawledState {
    fn default() -> Self {
        Self {
            queued: Utc::now(),
            scraped_at: None,
            scrape_result: None,
            processed_at: None,
            process_result: None,
        }
    }
}

impl CrawledState {
    pub fn queued() -> CrawledState {
        Self::default()
    }
    pub fn queued_and_scraped_ok() -> CrawledState {
        let mut state = CrawledState::default();
        state.scraped_ok();
        state
    }
    pub fn queued_and_scrape_error(error: String) -> CrawledState {
        let mut state = CrawledState::default();
        state.scrape_error(error);
        state
    }
    pub fn queued_and_processed_ok<S: Into<String>>(output: S) -> CrawledState {
        let mut state = CrawledState::default();
        state.processed_ok(output.into());
        state
    }
    pub fn queued_and_process_error(error: String) -> CrawledState {
        let mut state = CrawledState::default();
        state.process_error(error);
        state
    }
    pub fn processed_ok<S: Into<String>>(&mut self, output: S) {
        self.processed_at = Some(Utc::now());
        self.process_result = Some(StateOutcome::Ok(output.into()));
    }
    pub fn scraped_ok(&mut self) {
        self.scraped_at = Some(Utc::now());
        self.scrape_result = Some(StateOutcome::Ok("".into()))
    }
    pub fn scrape_skipped(&mut self) {
        self.scraped_at = Some(Utc::now());
        self.scrape_result = Some(StateOutcome::Skipped)
    }
    pub fn process_error<S: Into<String>>(&mut self, error: S) {
        self.processed_at = Some(Utc::now());
        self.process_result = Some(StateOutcome::Error(error.into()));
    }
    pub fn scrape_error<S: Into<String>>(&mut self, error: S) {
        self.scraped_at = Some(Utc::now());
        self.scrape_result = Some(StateOutcome::Error(error.into()))
    }
    pub fn scrape_result(&self) -> Option<&StateOutcome> {
        self.scrape_result.as_ref()
    }
    pub fn process_result(&self) -> Option<&StateOutcome> {
        self.process_result.as_ref()
    }
}

pub(crate) type ProcessingState = BTreeMap<String, CrawledState>;
pub(crate) type SharedProcessingState = Arc<RwLock<ProcessingState>>;

pub(crate) fn new_shared_state() -> SharedProcessingState {
    Arc::new(RwLock::new(ProcessingState::new()))
}

/// Writes the state of every request seen during the run as a crawl report.
///
/// The report is a diagnostic only, it is never read back.
pub(crate) async fn write_report(report_path: Option<&Path>, requests: SharedProcessingState) {
    let Some(report_path) = report_path else {
        tracing::debug!("crawler: no report path given, skipping report");
        return;
    };
    let json = serde_json::json!({ "requests": &*requests.read().await });
    match serde_json::to_string(&json) {
        Ok(json_string) => {
            tracing::info!("crawler: writing report to '{}'", report_path.display());
            match write_file(report_path, json_string.as_bytes()) {
                Ok(()) => {
                    tracing::info!("crawler: wrote report to '{}'", report_path.display())
                }
                Err(err) => {
                    tracing::error!(
                        "failed to write '{}', error '{:?}'",
                        report_path.display(),
                        err
                    );
                }
            }
        }
        Err(err) => {
            tracing::error!("failed to serialize report, error '{:?}'", err);
        }
    }
}

fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.flush()
}
