//! Sequenced delivery — single-message sends with transparent chunked
//! fallback.
//!
//! One [`deliver`] call owns the whole outbound sequence for one file.  The
//! sequence is strictly ordered: each message is sent only after the previous
//! one completed, and a failed container send aborts the remainder rather
//! than leaving holes in the part numbering.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use super::channel::{Attachment, DeliveryChannel, SendError};
use super::packager::{ChunkContainer, PackageError};
use super::{DeliveryConfig, classifier, packager};

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The produced file disappeared or cannot be read.
    #[error("cannot read source file: {0}")]
    Source(#[from] std::io::Error),

    #[error("packaging failed: {0}")]
    Package(String),

    /// A send failed mid-sequence.  `sent` counts the container messages that
    /// had already gone out.
    #[error("transport failed after {sent} of {total} parts: {reason}")]
    Transport {
        sent: usize,
        total: usize,
        reason: String,
    },
}

impl From<PackageError> for DeliveryError {
    fn from(e: PackageError) -> Self {
        DeliveryError::Package(e.to_string())
    }
}

/// How a file ended up being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sent in one message.
    Direct,
    /// Sent as announcement + `parts` containers + instructions.
    Chunked { parts: usize },
}

/// Deliver the file at `path` over `channel` as `filename`.
///
/// Files within the ceiling go out as one attachment message.  If the
/// platform still rejects that send as too large (its own limit can sit
/// below the configured ceiling), delivery falls back to the chunked path
/// instead of failing.  Files over the ceiling go straight to chunked
/// delivery.
pub async fn deliver(
    channel: &dyn DeliveryChannel,
    path: &Path,
    filename: &str,
    config: &DeliveryConfig,
) -> Result<DeliveryOutcome, DeliveryError> {
    let size = tokio::fs::metadata(path).await?.len();

    if classifier::fits_direct(size, config.ceiling) {
        match channel
            .send_attachment(Attachment::from_file(path, filename))
            .await
        {
            Ok(()) => {
                info!(%filename, size, "file sent directly");
                return Ok(DeliveryOutcome::Direct);
            }
            Err(SendError::PayloadTooLarge) => {
                warn!(%filename, size, "platform rejected direct send, switching to chunked delivery");
            }
            Err(e) => {
                return Err(DeliveryError::Transport {
                    sent: 0,
                    total: 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    deliver_chunked(channel, path, filename, size, config).await
}

async fn deliver_chunked(
    channel: &dyn DeliveryChannel,
    path: &Path,
    filename: &str,
    size: u64,
    config: &DeliveryConfig,
) -> Result<DeliveryOutcome, DeliveryError> {
    // Packaging reads the whole file; keep that off the async runtime.
    let containers = {
        let path = path.to_path_buf();
        let name = filename.to_string();
        let ceiling = config.ceiling;
        tokio::task::spawn_blocking(move || packager::pack(&path, &name, ceiling))
            .await
            .map_err(|e| DeliveryError::Package(format!("packaging task aborted: {e}")))??
    };

    let total = containers.len();
    info!(%filename, size, parts = total, "starting chunked delivery");

    channel
        .send_text(&announcement(filename, size, total))
        .await
        .map_err(|e| DeliveryError::Transport {
            sent: 0,
            total,
            reason: e.to_string(),
        })?;

    for container in containers {
        let ChunkContainer {
            seq,
            filename: part_name,
            data,
        } = container;

        let attachment =
            Attachment::from_bytes(data, part_name).with_caption(format!("part {seq}/{total}"));
        if let Err(e) = channel.send_attachment(attachment).await {
            return Err(DeliveryError::Transport {
                sent: seq - 1,
                total,
                reason: e.to_string(),
            });
        }

        tokio::time::sleep(config.pacing).await;
    }

    channel
        .send_text(&instructions(filename, total))
        .await
        .map_err(|e| DeliveryError::Transport {
            sent: total,
            total,
            reason: e.to_string(),
        })?;

    Ok(DeliveryOutcome::Chunked { parts: total })
}

fn announcement(filename: &str, size: u64, parts: usize) -> String {
    format!(
        "📦 {filename} is {} KiB, over the attachment limit. Sending it as {parts} compressed parts.",
        size / 1024
    )
}

fn instructions(filename: &str, parts: usize) -> String {
    format!(
        "🔧 To reassemble: unzip every part archive, then concatenate the \
         extracted pieces in ascending order.\n\
         Unix:    cat {filename}.part{{1..{parts}}} > {filename}\n\
         Windows: copy /b {filename}.part1+...+{filename}.part{parts} {filename}"
    )
}
