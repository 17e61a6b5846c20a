//! In-flight job tracking — duplicate-request rejection and status reporting.
//!
//! One [`JobTracker`] instance lives for the whole process and is shared by
//! every command handler.  Admission is a test-and-insert: a second request
//! for an identifier that is still in flight is rejected.  Release is
//! guaranteed on every handler exit path (including panics) because
//! [`try_admit`](JobTracker::try_admit) hands out an RAII [`JobGuard`] that
//! removes the entry on drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

// ── Job state ────────────────────────────────────────────────────────────────

/// Lifecycle of one tracked transfer job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Admitted, engine not yet dispatched.
    Pending,
    /// Engine call dispatched to the blocking pool.
    InFlight,
    /// Fetch finished with deliverable output; delivery may still be running.
    Completed,
    /// Fetch finished with nothing to deliver.
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::InFlight => "in flight",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

// ── Tracker ──────────────────────────────────────────────────────────────────

/// Process-wide set of in-flight job identifiers with their lifecycle state.
#[derive(Default)]
pub struct JobTracker {
    jobs: Mutex<HashMap<String, JobState>>,
}

impl JobTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Admit `id` if no job for it is in flight.
    ///
    /// Returns `None` when a job with the same identifier is already tracked;
    /// otherwise inserts the id as [`JobState::Pending`] and returns a guard
    /// whose drop releases the entry.
    pub fn try_admit(self: &Arc<Self>, id: &str) -> Option<JobGuard> {
        let mut jobs = self.lock();
        if jobs.contains_key(id) {
            return None;
        }
        jobs.insert(id.to_string(), JobState::Pending);
        Some(JobGuard {
            tracker: Arc::clone(self),
            id: id.to_string(),
        })
    }

    /// Remove `id` from the tracked set.  Idempotent.
    pub fn release(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Record a lifecycle transition for a tracked job.  No-op for ids that
    /// are not tracked (already released).
    pub fn set_state(&self, id: &str, state: JobState) {
        if let Some(entry) = self.lock().get_mut(id) {
            *entry = state;
        }
    }

    /// Current jobs and their states, in no particular order.
    pub fn snapshot(&self) -> Vec<(String, JobState)> {
        self.lock()
            .iter()
            .map(|(id, state)| (id.clone(), *state))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JobState>> {
        // A panic while holding the lock leaves the map intact, so the
        // poisoned value is still usable.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Guard ────────────────────────────────────────────────────────────────────

/// Scoped membership of one identifier in the tracker.
///
/// Dropping the guard releases the identifier, so a handler cannot leak an
/// in-flight entry no matter how it exits.
pub struct JobGuard {
    tracker: Arc<JobTracker>,
    id: String,
}

impl JobGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_state(&self, state: JobState) {
        self.tracker.set_state(&self.id, state);
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.id);
    }
}
