//! External fetch-engine adapter — invokes the configured converter command.
//!
//! The engine is a black box: it takes an identifier plus structured flags,
//! and writes the finished document (or intermediate artifacts) under the
//! output directory.  This adapter only translates its exit status and
//! stderr into [`FetchError`] values.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{FetchEngine, FetchError, FetchOptions};

/// Exit status the engine uses for "finished, but some items failed"
/// (sysexits EX_TEMPFAIL).
const EXIT_PARTIAL: i32 = 75;

/// Longest stderr tail preserved in error details.
const STDERR_TAIL: usize = 600;

/// Runs an external fetch-and-convert program once per job.
pub struct CommandEngine {
    program: PathBuf,
    out_dir: PathBuf,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            out_dir: out_dir.into(),
        }
    }

    fn command(&self, id: &str, options: &FetchOptions) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--out")
            .arg(&self.out_dir)
            .arg("--max-pages")
            .arg(options.max_pages.to_string())
            .arg("--retries")
            .arg(options.retry_count.to_string())
            .arg("--workers")
            .arg(options.concurrency.to_string())
            .arg(id);
        cmd
    }
}

impl FetchEngine for CommandEngine {
    fn fetch(&self, id: &str, options: &FetchOptions) -> Result<(), FetchError> {
        debug!(%id, program = %self.program.display(), "launching fetch engine");

        let output = self.command(id, options).output().map_err(|e| {
            FetchError::Engine(format!("cannot launch {}: {e}", self.program.display()))
        })?;

        if output.status.success() {
            return Ok(());
        }

        let detail = stderr_tail(&output.stderr);
        match output.status.code() {
            // No structured count on this channel; the orchestrator recovers
            // one from per-item markers in the detail.
            Some(EXIT_PARTIAL) => Err(FetchError::Partial {
                failed: None,
                detail,
            }),
            Some(code) => Err(FetchError::Engine(format!(
                "engine exited with status {code}: {detail}"
            ))),
            None => Err(FetchError::Engine(format!(
                "engine terminated by signal: {detail}"
            ))),
        }
    }
}

fn stderr_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - STDERR_TAIL).collect()
    }
}
