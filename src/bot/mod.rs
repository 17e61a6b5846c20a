//! Bot front end — command surface, shared state, and the Telegram
//! dispatcher run-loop.
//!
//! The dispatcher is the process's main loop: it parses incoming commands,
//! wraps the originating chat in a [`TelegramDelivery`] channel, and hands
//! off to [`handler::dispatch`].  Handlers for different jobs interleave at
//! await points; the blocking engine work never runs on the dispatcher's
//! threads (see `fetch::run`).

pub mod handler;
pub mod telegram;

use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::fetch::FetchEngine;
use crate::jobs::JobTracker;
use telegram::TelegramDelivery;

// ── State ────────────────────────────────────────────────────────────────────

/// Shared state injected into every command handler invocation.
pub struct AppState {
    pub config: Config,
    pub tracker: Arc<JobTracker>,
    pub engine: Arc<dyn FetchEngine>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<dyn FetchEngine>) -> Arc<Self> {
        Arc::new(Self {
            config,
            tracker: JobTracker::new(),
            engine,
            started_at: Utc::now(),
        })
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

/// The user-facing command surface.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "Document ferry commands:")]
pub enum Command {
    #[command(description = "fetch a document by numeric id")]
    Get(String),
    #[command(description = "fetch a random document")]
    Random,
    #[command(description = "fetch with a raised page cap")]
    Force(String),
    #[command(description = "re-fetch with more retries and lower concurrency")]
    Retry(String),
    #[command(description = "show in-flight jobs")]
    Status,
    #[command(description = "check directories and engine configuration")]
    Diagnose,
    #[command(description = "show this help")]
    Help,
}

// ── Run-loop ─────────────────────────────────────────────────────────────────

/// Start the Telegram dispatcher and run until `shutdown` is cancelled.
///
/// The bot token comes from the `TELEGRAM_BOT_TOKEN` env var, never from
/// config files.
pub async fn run(state: Arc<AppState>, shutdown: CancellationToken) -> Result<(), AppError> {
    let token = env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| AppError::Config("TELEGRAM_BOT_TOKEN not set".into()))?;

    info!(bot_name = %state.config.bot_name, "telegram dispatcher starting");
    let bot = Bot::new(token);

    let dispatch_state = state.clone();
    let tree = Update::filter_message().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, command: Command| {
            let state = dispatch_state.clone();
            async move {
                debug!(
                    chat = %msg.chat.id,
                    from = ?msg.from.as_ref().and_then(|u| u.username.as_ref()),
                    "command received"
                );
                let channel = TelegramDelivery::new(bot, msg.chat.id);
                handler::dispatch(state, &channel, command).await;
                respond(())
            }
        },
    );

    let mut dispatcher = Dispatcher::builder(bot, tree).build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!("shutdown signal received, closing telegram dispatcher");
        }
        _ = dispatcher.dispatch() => {
            warn!("telegram dispatcher exited unexpectedly");
        }
    }

    Ok(())
}
