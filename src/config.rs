//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `FERRYBOT_WORK_DIR` and `FERRYBOT_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::delivery::{DeliveryConfig, packager};
use crate::error::AppError;
use crate::fetch::FetchOptions;
use crate::logger;

// ── Resolved types ───────────────────────────────────────────────────────────

/// Inclusive id range for the randomized-selection command.
#[derive(Debug, Clone)]
pub struct RandomRange {
    pub id_min: u64,
    pub id_max: u64,
}

/// Fetch-engine invocation settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// External fetch-and-convert program (absolute path or PATH lookup).
    pub program: PathBuf,
    /// Base options for a standard fetch.
    pub options: FetchOptions,
    /// Page cap applied by the force variant.
    pub force_max_pages: u32,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Working directory for documents and intermediate pages (already
    /// expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub random: RandomRange,
    pub delivery: DeliveryConfig,
    pub fetch: FetchConfig,
}

impl Config {
    /// Directory the engine writes finished documents into.
    pub fn document_dir(&self) -> PathBuf {
        self.work_dir.join("pdf")
    }

    /// Directory the engine writes intermediate page artifacts into.
    pub fn pages_dir(&self) -> PathBuf {
        self.work_dir.join("pages")
    }

    /// Expected output path for one identifier.
    pub fn document_path(&self, id: &str) -> PathBuf {
        self.document_dir().join(format!("{id}.pdf"))
    }

    /// Intermediate artifacts tree for one identifier.
    pub fn job_pages_dir(&self, id: &str) -> PathBuf {
        self.pages_dir().join(id)
    }
}

// ── Raw TOML shape ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    random: RawRandom,
    #[serde(default)]
    delivery: RawDelivery,
    #[serde(default)]
    fetch: RawFetch,
}

#[derive(Deserialize)]
struct RawBot {
    name: String,
    work_dir: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawRandom {
    #[serde(default = "default_id_min")]
    id_min: u64,
    #[serde(default = "default_id_max")]
    id_max: u64,
}

impl Default for RawRandom {
    fn default() -> Self {
        Self {
            id_min: default_id_min(),
            id_max: default_id_max(),
        }
    }
}

fn default_id_min() -> u64 {
    110_000
}
fn default_id_max() -> u64 {
    1_200_000
}

#[derive(Deserialize)]
struct RawDelivery {
    /// Largest single-message attachment, in bytes.
    #[serde(default = "default_ceiling_bytes")]
    ceiling_bytes: u64,
    /// Delay between chunk sends, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pacing_ms: u64,
}

impl Default for RawDelivery {
    fn default() -> Self {
        Self {
            ceiling_bytes: default_ceiling_bytes(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

fn default_ceiling_bytes() -> u64 {
    8 * 1024 * 1024
}
fn default_pacing_ms() -> u64 {
    1_000
}

#[derive(Deserialize)]
struct RawFetch {
    #[serde(default = "default_program")]
    program: String,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
    #[serde(default = "default_force_max_pages")]
    force_max_pages: u32,
    #[serde(default = "default_retry_count")]
    retry_count: u32,
    #[serde(default = "default_concurrency")]
    concurrency: u32,
}

impl Default for RawFetch {
    fn default() -> Self {
        Self {
            program: default_program(),
            max_pages: default_max_pages(),
            force_max_pages: default_force_max_pages(),
            retry_count: default_retry_count(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_program() -> String {
    "docfetch".to_string()
}
fn default_max_pages() -> u32 {
    100
}
fn default_force_max_pages() -> u32 {
    500
}
fn default_retry_count() -> u32 {
    5
}
fn default_concurrency() -> u32 {
    30
}

// ── Loading ──────────────────────────────────────────────────────────────────

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("FERRYBOT_WORK_DIR").ok();
    let log_level_override = env::var("FERRYBOT_LOG_LEVEL").ok();
    load_from(
        Path::new(path.unwrap_or("config/default.toml")),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let work_dir_str = work_dir_override.unwrap_or(&parsed.bot.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override
        .unwrap_or(&parsed.bot.log_level)
        .to_string();

    logger::parse_level(&log_level)
        .map_err(|_| AppError::Config(format!("unrecognised log level '{log_level}'")))?;

    if packager::slice_len(parsed.delivery.ceiling_bytes) == 0 {
        return Err(AppError::Config(format!(
            "delivery ceiling of {} bytes leaves no room for chunk payloads",
            parsed.delivery.ceiling_bytes
        )));
    }
    if parsed.random.id_min > parsed.random.id_max {
        return Err(AppError::Config(format!(
            "random id range is inverted: {} > {}",
            parsed.random.id_min, parsed.random.id_max
        )));
    }
    if parsed.fetch.max_pages == 0 || parsed.fetch.concurrency == 0 {
        return Err(AppError::Config(
            "fetch max_pages and concurrency must be positive".into(),
        ));
    }
    if parsed.fetch.force_max_pages < parsed.fetch.max_pages {
        return Err(AppError::Config(format!(
            "force_max_pages ({}) is below max_pages ({})",
            parsed.fetch.force_max_pages, parsed.fetch.max_pages
        )));
    }

    Ok(Config {
        bot_name: parsed.bot.name,
        work_dir,
        log_level,
        random: RandomRange {
            id_min: parsed.random.id_min,
            id_max: parsed.random.id_max,
        },
        delivery: DeliveryConfig {
            ceiling: parsed.delivery.ceiling_bytes,
            pacing: Duration::from_millis(parsed.delivery.pacing_ms),
        },
        fetch: FetchConfig {
            program: PathBuf::from(parsed.fetch.program),
            options: FetchOptions {
                max_pages: parsed.fetch.max_pages,
                retry_count: parsed.fetch.retry_count,
                concurrency: parsed.fetch.concurrency,
            },
            force_max_pages: parsed.fetch.force_max_pages,
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
