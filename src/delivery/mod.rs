//! Large-file delivery core.
//!
//! # Architecture
//!
//! The chat platform caps single-message attachments at a hard ceiling.
//! Everything in this module exists to make that cap invisible to the user:
//!
//! - [`classifier`] decides whether a file fits in one message.
//! - [`packager`] splits an oversized file into ordered chunks and wraps each
//!   one in a self-contained ZIP container that itself stays under the
//!   ceiling.
//! - [`driver`] sequences the outbound messages: a direct send for small
//!   files, or announcement + one message per container + reassembly
//!   instructions, with pacing between container sends.
//!
//! The platform itself is reached only through the [`channel::DeliveryChannel`]
//! trait, so the whole core runs against recording mocks in tests.

pub mod channel;
pub mod classifier;
pub mod driver;
pub mod packager;

pub use channel::{Attachment, DeliveryChannel, SendError, StatusHandle};
pub use driver::{DeliveryError, DeliveryOutcome, deliver};

use std::time::Duration;

/// Transfer limits and pacing for one delivery channel.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Largest attachment the platform accepts in a single message, in bytes.
    pub ceiling: u64,
    /// Cooperative delay after each container send.  Headroom under the
    /// platform's burst rate limit, not a correctness requirement.
    pub pacing: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            // Smallest attachment ceiling among the chat surfaces we target.
            ceiling: 8 * 1024 * 1024,
            pacing: Duration::from_secs(1),
        }
    }
}
