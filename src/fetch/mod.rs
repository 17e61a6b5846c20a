//! Download orchestration — bridges the blocking fetch engine into the async
//! front end.
//!
//! # Outcome classification
//!
//! The engine either succeeds, fails partially (some items could not be
//! downloaded but an output may still exist), or fails outright.  [`run`]
//! folds every result — including a panicking engine — into a
//! [`FetchOutcome`], so callers never see an error escape this module.
//!
//! # No retries here
//!
//! The orchestrator never retries.  The retry and force commands construct
//! alternate [`FetchOptions`] and go through the same path.

mod command;
mod options;

pub use command::CommandEngine;
pub use options::FetchOptions;

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

/// Token an engine emits once per item it gave up on.  Used to recover a
/// failure count from the error detail when the engine reports no structured
/// count.
pub const FAILURE_MARKER: &str = "RetryExhausted";

// ── Engine boundary ──────────────────────────────────────────────────────────

/// Errors reported by a fetch engine.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Some items failed, but an output file may still have been produced.
    /// `failed` is the engine's own count when it can provide one.
    #[error("partial fetch failure: {detail}")]
    Partial {
        failed: Option<usize>,
        detail: String,
    },

    /// Anything else: launch problems, hard refusals, conversion errors.
    #[error("{0}")]
    Engine(String),
}

/// A fetch-and-convert engine.
///
/// [`fetch`](FetchEngine::fetch) blocks for the whole download, so callers
/// must keep it off the async runtime (see [`run`]).  On success the engine
/// has written the document to the path the caller derives from `id`.
pub trait FetchEngine: Send + Sync + 'static {
    fn fetch(&self, id: &str, options: &FetchOptions) -> Result<(), FetchError>;
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Classified result of one fetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Engine finished without reported error.
    Completed,
    /// Recoverable-partial failure: `failed` items lost, output may exist.
    Partial { failed: usize, detail: String },
    /// Nothing usable was produced.
    Failed { detail: String },
}

/// Run one fetch on the blocking pool and classify its outcome.
///
/// Whether any output is actually deliverable is decided by the caller
/// checking for the expected file — a Partial outcome alone says nothing
/// about the document's existence.
pub async fn run(engine: Arc<dyn FetchEngine>, id: String, options: FetchOptions) -> FetchOutcome {
    let result = tokio::task::spawn_blocking(move || engine.fetch(&id, &options)).await;

    match result {
        Ok(Ok(())) => FetchOutcome::Completed,
        Ok(Err(FetchError::Partial { failed, detail })) => {
            let failed = failed.unwrap_or_else(|| count_failure_markers(&detail));
            FetchOutcome::Partial { failed, detail }
        }
        Ok(Err(e)) => FetchOutcome::Failed {
            detail: e.to_string(),
        },
        Err(e) => {
            warn!("fetch task did not complete: {e}");
            FetchOutcome::Failed {
                detail: format!("fetch task aborted: {e}"),
            }
        }
    }
}

fn count_failure_markers(detail: &str) -> usize {
    detail.matches(FAILURE_MARKER).count()
}
