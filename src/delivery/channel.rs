//! Delivery channel abstraction — the only platform capability the core needs.
//!
//! Channels send text messages (returning an editable handle), send messages
//! carrying one attachment, and edit previously sent text.  The concrete
//! Telegram adapter lives in `bot::telegram`; tests use recording mocks.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors a channel can report.
#[derive(Debug, Error)]
pub enum SendError {
    /// The platform rejected the attachment as exceeding its own hard limit.
    /// Distinguished so the driver can fall back to chunked delivery.
    #[error("attachment exceeds the platform limit")]
    PayloadTooLarge,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Handle to a previously sent status message, usable with
/// [`DeliveryChannel::edit_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusHandle(pub i32);

/// One outbound attachment: a filename plus an on-disk file or in-memory
/// bytes, with an optional caption shown next to it.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub body: AttachmentBody,
    pub caption: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AttachmentBody {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl Attachment {
    pub fn from_file(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: AttachmentBody::File(path.into()),
            caption: None,
        }
    }

    pub fn from_bytes(data: Vec<u8>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: AttachmentBody::Bytes(data),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Outbound capability handed to the delivery driver and command handlers.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send a plain text message.  The handle allows later edits.
    async fn send_text(&self, text: &str) -> Result<StatusHandle, SendError>;

    /// Send a message carrying one attachment.
    async fn send_attachment(&self, attachment: Attachment) -> Result<(), SendError>;

    /// Replace the text of a previously sent message.
    async fn edit_text(&self, handle: StatusHandle, text: &str) -> Result<(), SendError>;
}
