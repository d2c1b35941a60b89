use std::{cmp::Ordering, collections::BinaryHeap};

use crate::CrawlRequest;

/// Requests waiting to be scraped.
///
/// The deepest request goes first, requests of equal depth leave in the order they came in.
pub struct Frontier<R> {
    queue: BinaryHeap<Queued<R>>,
    pushed: u64,
}

struct Queued<R> {
    depth: usize,
    seq: u64,
    request: R,
}

impl<R> PartialEq for Queued<R> {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.seq == other.seq
    }
}

impl<R> Eq for Queued<R> {}

impl<R> PartialOrd for Queued<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for Queued<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<R> Default for Frontier<R> {
    fn default() -> Self {
        Self {
            queue: BinaryHeap::new(),
            pushed: 0,
        }
    }
}

impl<R: CrawlRequest> Frontier<R> {
    pub fn push(&mut self, request: R) {
        self.queue.push(Queued {
            depth: request.depth(),
            seq: self.pushed,
            request,
        });
        self.pushed += 1;
    }

    pub fn pop(&mut self) -> Option<R> {
        self.queue.pop().map(|queued| queued.request)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
