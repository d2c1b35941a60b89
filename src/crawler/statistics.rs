use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct Statistics {
    pub num_scrapings: Arc<AtomicUsize>,
    pub num_scrape_errors: Arc<AtomicUsize>,
    pub num_skipped: Arc<AtomicUsize>,
    pub num_processings: Arc<AtomicUsize>,
    pub num_process_errors: Arc<AtomicUsize>,
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlSummary {
    pub num_scrapings: usize,
    pub num_scrape_errors: usize,
    pub num_skipped: usize,
    pub num_processings: usize,
    pub num_process_errors: usize,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            num_scrapings: Arc::new(AtomicUsize::new(0)),
            num_scrape_errors: Arc::new(AtomicUsize::new(0)),
            num_skipped: Arc::new(AtomicUsize::new(0)),
            num_processings: Arc::new(AtomicUsize::new(0)),
            num_process_errors: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Statistics {
    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            num_scrapings: self.num_scrapings.load(Ordering::Relaxed),
            num_scrape_errors: self.num_scrape_errors.load(Ordering::Relaxed),
            num_skipped: self.num_skipped.load(Ordering::Relaxed),
            num_processings: self.num_processings.load(Ordering::Relaxed),
            num_process_errors: self.num_process_errors.load(Ordering::Relaxed),
        }
    }

    pub fn write_to_log(&self, running_time: Duration) {
        let summary = self.summary();
        tracing::info!(
            num_processings = summary.num_processings,
            num_process_errors = summary.num_process_errors,
            num_scrapings = summary.num_scrapings,
            num_scrape_errors = summary.num_scrape_errors,
            num_skipped = summary.num_skipped,
            running_time = ?running_time,
            "statistics"
        );
    }
}
