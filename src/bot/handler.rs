//! Command handling — one flow per user-visible command.
//!
//! Every failure is translated into a message on the channel; nothing
//! propagates past this module.  The tracker guard taken at admission is
//! dropped on every exit path, so an identifier can never stay stuck
//! in flight.

use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use tracing::{error, info, warn};

use super::{AppState, Command};
use crate::config::RandomRange;
use crate::delivery::channel::{DeliveryChannel, StatusHandle};
use crate::delivery::{self, DeliveryOutcome};
use crate::fetch::{self, FetchOptions, FetchOutcome};
use crate::jobs::JobState;
use teloxide::utils::command::BotCommands;

// ── Variants ─────────────────────────────────────────────────────────────────

/// Which fetch configuration a command selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobVariant {
    Standard,
    Force,
    Retry,
}

impl JobVariant {
    fn options(&self, state: &AppState) -> FetchOptions {
        let base = &state.config.fetch.options;
        match self {
            JobVariant::Standard => base.clone(),
            JobVariant::Force => base.forced(state.config.fetch.force_max_pages),
            JobVariant::Retry => base.patient(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            JobVariant::Standard => "fetch",
            JobVariant::Force => "forced fetch",
            JobVariant::Retry => "retry fetch",
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Route one parsed command to its flow.
pub async fn dispatch(state: Arc<AppState>, channel: &dyn DeliveryChannel, command: Command) {
    match command {
        Command::Get(id) => handle_fetch(state, channel, id, JobVariant::Standard).await,
        Command::Random => {
            let id = roll_random_id(&state.config.random);
            send_or_log(channel, &format!("🎲 Rolled {id}")).await;
            handle_fetch(state, channel, id.to_string(), JobVariant::Standard).await;
        }
        Command::Force(id) => handle_fetch(state, channel, id, JobVariant::Force).await,
        Command::Retry(id) => handle_fetch(state, channel, id, JobVariant::Retry).await,
        Command::Status => handle_status(&state, channel).await,
        Command::Diagnose => handle_diagnose(&state, channel).await,
        Command::Help => send_or_log(channel, &help_text()).await,
    }
}

fn roll_random_id(range: &RandomRange) -> u64 {
    rand::thread_rng().gen_range(range.id_min..=range.id_max)
}

fn help_text() -> String {
    format!(
        "{}\n\nOversized documents are split into numbered .zip parts \
         automatically; a reassembly note follows the parts.",
        Command::descriptions()
    )
}

// ── Fetch flow ───────────────────────────────────────────────────────────────

/// Admission → fetch → classify → deliver, reporting progress through one
/// editable status message.
pub async fn handle_fetch(
    state: Arc<AppState>,
    channel: &dyn DeliveryChannel,
    id: String,
    variant: JobVariant,
) {
    if !is_valid_id(&id) {
        send_or_log(
            channel,
            "Give a numeric document id, e.g. /get 123456",
        )
        .await;
        return;
    }

    let document = state.config.document_path(&id);

    // Re-fetch variants skip the cache: the user explicitly asked to try again.
    if variant != JobVariant::Retry && document.exists() {
        send_or_log(
            channel,
            &format!("📁 {id}.pdf is already downloaded, sending it now"),
        )
        .await;
        deliver_and_report(&state, channel, &document, &format!("{id}.pdf")).await;
        return;
    }

    let Some(guard) = state.tracker.try_admit(&id) else {
        send_or_log(
            channel,
            &format!("⏳ {id} is already being fetched, try again once it finishes"),
        )
        .await;
        return;
    };

    let status = match channel
        .send_text(&format!("📥 Starting {} of {id}, hang on...", variant.label()))
        .await
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(%id, "cannot send status message: {e}");
            None
        }
    };

    guard.set_state(JobState::InFlight);
    info!(%id, variant = ?variant, "fetch dispatched");

    let options = variant.options(&state);
    let outcome = fetch::run(state.engine.clone(), id.clone(), options).await;

    match outcome {
        FetchOutcome::Completed => {
            if document.exists() {
                guard.set_state(JobState::Completed);
                let size = file_size(&document);
                edit_or_log(
                    channel,
                    status,
                    &format!("✅ {id} fetched ({} KiB)", size / 1024),
                )
                .await;
                deliver_and_report(&state, channel, &document, &format!("{id}.pdf")).await;
            } else {
                guard.set_state(JobState::Failed);
                let pages = pages_summary(&state, &id);
                warn!(%id, %pages, "engine finished but no document was produced");
                edit_or_log(
                    channel,
                    status,
                    &format!("⚠️ {id}: fetch finished but no document was produced ({pages})"),
                )
                .await;
            }
        }
        FetchOutcome::Partial { failed, detail } => {
            warn!(%id, failed, "partial fetch: {detail}");
            if document.exists() {
                guard.set_state(JobState::Completed);
                let size = file_size(&document);
                edit_or_log(
                    channel,
                    status,
                    &format!(
                        "⚠️ {id}: {failed} item(s) failed to download ({} KiB fetched). \
                         The document may be incomplete.",
                        size / 1024
                    ),
                )
                .await;
                deliver_and_report(&state, channel, &document, &format!("{id}_partial.pdf")).await;
            } else {
                guard.set_state(JobState::Failed);
                edit_or_log(
                    channel,
                    status,
                    &format!("❌ {id}: {failed} item(s) failed and no document was produced"),
                )
                .await;
            }
        }
        FetchOutcome::Failed { detail } => {
            guard.set_state(JobState::Failed);
            error!(%id, "fetch failed: {detail}");
            edit_or_log(channel, status, &format!("❌ {id}: fetch failed: {detail}")).await;
        }
    }
}

async fn deliver_and_report(
    state: &AppState,
    channel: &dyn DeliveryChannel,
    path: &Path,
    filename: &str,
) {
    match delivery::deliver(channel, path, filename, &state.config.delivery).await {
        Ok(DeliveryOutcome::Direct) => {}
        Ok(DeliveryOutcome::Chunked { parts }) => {
            info!(%filename, parts, "chunked delivery complete");
        }
        Err(e) => {
            warn!(%filename, "delivery failed: {e}");
            send_or_log(
                channel,
                &format!("❌ Could not deliver {filename}: {e}. Please request it again."),
            )
            .await;
        }
    }
}

// ── Status & diagnostics ─────────────────────────────────────────────────────

pub async fn handle_status(state: &AppState, channel: &dyn DeliveryChannel) {
    let mut lines = vec![format!(
        "📊 {}, up since {}",
        state.config.bot_name,
        state.started_at.format("%Y-%m-%d %H:%M UTC"),
    )];
    lines.push(format!(
        "🎯 random range {}..={}",
        state.config.random.id_min, state.config.random.id_max
    ));

    let jobs = state.tracker.snapshot();
    if jobs.is_empty() {
        lines.push("no jobs in flight".to_string());
    } else {
        for (id, job_state) in jobs {
            lines.push(format!("🔄 {id}: {}", job_state.as_str()));
        }
    }

    send_or_log(channel, &lines.join("\n")).await;
}

pub async fn handle_diagnose(state: &AppState, channel: &dyn DeliveryChannel) {
    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    let config = &state.config;

    let mut lines = vec!["🔧 Diagnostics".to_string()];
    lines.push(format!(
        "{} work dir {}",
        mark(config.work_dir.is_dir()),
        config.work_dir.display()
    ));
    lines.push(format!(
        "{} document dir {}",
        mark(config.document_dir().is_dir()),
        config.document_dir().display()
    ));
    lines.push(format!(
        "{} pages dir {}",
        mark(config.pages_dir().is_dir()),
        config.pages_dir().display()
    ));

    let program = &config.fetch.program;
    if program.is_absolute() {
        lines.push(format!(
            "{} engine {}",
            mark(program.exists()),
            program.display()
        ));
    } else {
        lines.push(format!("🔎 engine {} (resolved via PATH)", program.display()));
    }

    send_or_log(channel, &lines.join("\n")).await;
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn pages_summary(state: &AppState, id: &str) -> String {
    let dir = state.config.job_pages_dir(id);
    if !dir.is_dir() {
        return "no intermediate pages directory".to_string();
    }
    match std::fs::read_dir(&dir) {
        Ok(entries) => format!(
            "{} intermediate file(s) under {}",
            entries.count(),
            dir.display()
        ),
        Err(e) => format!("cannot inspect {}: {e}", dir.display()),
    }
}

async fn send_or_log(channel: &dyn DeliveryChannel, text: &str) {
    if let Err(e) = channel.send_text(text).await {
        warn!("cannot send message: {e}");
    }
}

async fn edit_or_log(channel: &dyn DeliveryChannel, status: Option<StatusHandle>, text: &str) {
    match status {
        Some(handle) => {
            if let Err(e) = channel.edit_text(handle, text).await {
                warn!("cannot edit status message: {e}");
            }
        }
        None => send_or_log(channel, text).await,
    }
}
