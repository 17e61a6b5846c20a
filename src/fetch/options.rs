//! Structured fetch configuration and its command variants.
//!
//! The force and retry commands do not patch serialized config text; they
//! derive a new [`FetchOptions`] value from the base one, so each variant is
//! independently testable.

/// Options passed to the fetch engine for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Refuse albums longer than this many pages.
    pub max_pages: u32,
    /// Per-item download retries before the engine gives up on an item.
    pub retry_count: u32,
    /// Parallel download workers inside the engine.
    pub concurrency: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_pages: 100,
            retry_count: 5,
            concurrency: 30,
        }
    }
}

impl FetchOptions {
    /// Variant for the force command: same network settings, raised page cap.
    pub fn forced(&self, max_pages: u32) -> Self {
        Self {
            max_pages,
            ..self.clone()
        }
    }

    /// Variant for the retry command: doubled retries, halved concurrency.
    /// Slower, but much more tolerant of a flaky upstream.
    pub fn patient(&self) -> Self {
        Self {
            max_pages: self.max_pages,
            retry_count: self.retry_count.saturating_mul(2),
            concurrency: (self.concurrency / 2).max(1),
        }
    }
}
