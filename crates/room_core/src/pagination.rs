//! Older-history pagination: an in-flight guard plus end-of-history
//! detection over a fixed page size.

/// Observable phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPhase {
    Idle,
    Fetching,
    /// Terminal for this mount; a fresh mount is required to re-probe.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct PaginationEngine {
    page_size: usize,
    end: bool,
    loading_more: bool,
}

impl PaginationEngine {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            end: false,
            loading_more: false,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn end(&self) -> bool {
        self.end
    }

    pub fn loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn phase(&self) -> PaginationPhase {
        if self.end {
            PaginationPhase::Exhausted
        } else if self.loading_more {
            PaginationPhase::Fetching
        } else {
            PaginationPhase::Idle
        }
    }

    /// Claim the in-flight slot. Returns false while a fetch is outstanding
    /// or once history is exhausted; at most one fetch runs at a time.
    pub fn try_begin(&mut self) -> bool {
        if self.loading_more || self.end {
            return false;
        }
        self.loading_more = true;
        true
    }

    /// Record a settled fetch; a page shorter than the page size exhausts
    /// the history.
    pub fn complete(&mut self, fetched: usize) {
        self.loading_more = false;
        if fetched < self.page_size {
            self.end = true;
        }
    }

    /// A failed fetch resets to idle; the user retries by scrolling again.
    pub fn fail(&mut self) {
        self.loading_more = false;
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
