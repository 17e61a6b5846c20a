//! End-to-end command flows over a recording channel and a scripted engine.
//!
//! These exercise the full path a Telegram command takes — admission, the
//! blocking-pool fetch, outcome classification, and sequenced delivery —
//! without touching the real platform or a real engine.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use ferrybot::bot::AppState;
use ferrybot::bot::handler::{self, JobVariant};
use ferrybot::config::{Config, FetchConfig, RandomRange};
use ferrybot::delivery::DeliveryConfig;
use ferrybot::delivery::channel::{
    Attachment, AttachmentBody, DeliveryChannel, SendError, StatusHandle,
};
use ferrybot::fetch::{FAILURE_MARKER, FetchEngine, FetchError, FetchOptions};

const MIB: u64 = 1024 * 1024;

// ── Recording channel ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Edit(String),
    Attachment { name: String, len: u64 },
}

#[derive(Default)]
struct RecordingChannel {
    log: Mutex<Vec<Sent>>,
}

impl RecordingChannel {
    fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    fn attachments(&self) -> Vec<(String, u64)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Attachment { name, len } => Some((name, len)),
                _ => None,
            })
            .collect()
    }

    fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) | Sent::Edit(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send_text(&self, text: &str) -> Result<StatusHandle, SendError> {
        let mut log = self.log.lock().unwrap();
        log.push(Sent::Text(text.to_string()));
        Ok(StatusHandle(log.len() as i32))
    }

    async fn send_attachment(&self, attachment: Attachment) -> Result<(), SendError> {
        let len = match &attachment.body {
            AttachmentBody::File(path) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            AttachmentBody::Bytes(data) => data.len() as u64,
        };
        self.log.lock().unwrap().push(Sent::Attachment {
            name: attachment.name,
            len,
        });
        Ok(())
    }

    async fn edit_text(&self, _handle: StatusHandle, text: &str) -> Result<(), SendError> {
        self.log.lock().unwrap().push(Sent::Edit(text.to_string()));
        Ok(())
    }
}

// ── Scripted engine ──────────────────────────────────────────────────────────

enum ScriptedOutcome {
    Ok,
    Partial { failed: Option<usize>, detail: String },
    Fail(String),
}

struct ScriptedEngine {
    outcome: ScriptedOutcome,
    /// Document to write before reporting the outcome, if any.
    produce: Option<(PathBuf, usize)>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn new(outcome: ScriptedOutcome, produce: Option<(PathBuf, usize)>) -> Self {
        Self {
            outcome,
            produce,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchEngine for ScriptedEngine {
    fn fetch(&self, _id: &str, _options: &FetchOptions) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((path, len)) = &self.produce {
            std::fs::write(path, vec![0u8; *len]).expect("write scripted document");
        }
        match &self.outcome {
            ScriptedOutcome::Ok => Ok(()),
            ScriptedOutcome::Partial { failed, detail } => Err(FetchError::Partial {
                failed: *failed,
                detail: detail.clone(),
            }),
            ScriptedOutcome::Fail(detail) => Err(FetchError::Engine(detail.clone())),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn test_config(work_dir: &Path) -> Config {
    Config {
        bot_name: "test".into(),
        work_dir: work_dir.to_path_buf(),
        log_level: "info".into(),
        random: RandomRange {
            id_min: 1,
            id_max: 10,
        },
        delivery: DeliveryConfig {
            ceiling: 8 * MIB,
            pacing: Duration::ZERO,
        },
        fetch: FetchConfig {
            program: PathBuf::from("unused-in-tests"),
            options: FetchOptions::default(),
            force_max_pages: 500,
        },
    }
}

struct Fixture {
    _work_dir: TempDir,
    state: std::sync::Arc<AppState>,
    engine: std::sync::Arc<ScriptedEngine>,
}

fn fixture(id: &str, outcome: ScriptedOutcome, produce_len: Option<usize>) -> Fixture {
    let work_dir = TempDir::new().expect("work dir");
    let config = test_config(work_dir.path());
    std::fs::create_dir_all(config.document_dir()).expect("document dir");
    std::fs::create_dir_all(config.pages_dir()).expect("pages dir");

    let produce = produce_len.map(|len| (config.document_path(id), len));
    let engine = std::sync::Arc::new(ScriptedEngine::new(outcome, produce));
    let state = AppState::new(config, engine.clone());

    Fixture {
        _work_dir: work_dir,
        state,
        engine,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn small_document_is_delivered_in_one_message() {
    let fx = fixture("42", ScriptedOutcome::Ok, Some(6 * MIB as usize));
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "42".into(), JobVariant::Standard).await;

    assert_eq!(fx.engine.calls(), 1);
    assert_eq!(
        channel.attachments(),
        vec![("42.pdf".to_string(), 6 * MIB)]
    );
    let log = channel.sent();
    assert!(matches!(&log[0], Sent::Text(t) if t.contains("Starting fetch of 42")));
    assert!(matches!(&log[1], Sent::Edit(t) if t.contains("✅ 42 fetched")));
    // Tracker entry is gone once the handler returns.
    assert!(fx.state.tracker.snapshot().is_empty());
}

#[tokio::test]
async fn oversized_document_is_chunked_in_order() {
    let fx = fixture("7", ScriptedOutcome::Ok, Some(20 * MIB as usize));
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "7".into(), JobVariant::Standard).await;

    // 20 MiB at an 8 MiB ceiling: 7 MiB slices, parts of 7, 7, 6 MiB.
    let log = channel.sent();
    assert_eq!(log.len(), 7, "status, edit, announcement, 3 parts, instructions");
    assert!(matches!(&log[2], Sent::Text(t) if t.contains("3 compressed parts")));
    for (i, entry) in log[3..6].iter().enumerate() {
        match entry {
            Sent::Attachment { name, len } => {
                assert_eq!(name, &format!("7.pdf.part{}.zip", i + 1));
                assert!(*len <= 8 * MIB, "every container stays under the ceiling");
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }
    assert!(matches!(&log[6], Sent::Text(t) if t.contains("reassemble")));
}

#[tokio::test]
async fn partial_with_output_still_delivers() {
    // Two per-item failure markers and a 3 MiB document on disk.
    let detail = format!("p4: {FAILURE_MARKER}; p9: {FAILURE_MARKER}");
    let fx = fixture(
        "99",
        ScriptedOutcome::Partial {
            failed: None,
            detail,
        },
        Some(3 * MIB as usize),
    );
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "99".into(), JobVariant::Standard).await;

    let texts = channel.texts();
    assert!(
        texts.iter().any(|t| t.contains("2 item(s) failed")),
        "failure count recovered from markers: {texts:?}"
    );
    assert_eq!(
        channel.attachments(),
        vec![("99_partial.pdf".to_string(), 3 * MIB)],
        "partial output is flagged in the filename"
    );
}

#[tokio::test]
async fn partial_without_output_skips_delivery() {
    let fx = fixture(
        "13",
        ScriptedOutcome::Partial {
            failed: Some(4),
            detail: "four items lost".into(),
        },
        None,
    );
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "13".into(), JobVariant::Standard).await;

    assert!(channel.attachments().is_empty(), "nothing to deliver");
    assert!(
        channel
            .texts()
            .iter()
            .any(|t| t.contains("no document was produced")),
        "{:?}",
        channel.texts()
    );
}

#[tokio::test]
async fn hard_failure_is_reported() {
    let fx = fixture("5", ScriptedOutcome::Fail("upstream said no".into()), None);
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "5".into(), JobVariant::Standard).await;

    assert!(channel.attachments().is_empty());
    assert!(
        channel
            .texts()
            .iter()
            .any(|t| t.contains("fetch failed") && t.contains("upstream said no"))
    );
    assert!(fx.state.tracker.snapshot().is_empty());
}

#[tokio::test]
async fn duplicate_request_is_rejected_without_engine_call() {
    let fx = fixture("123456", ScriptedOutcome::Ok, None);
    let channel = RecordingChannel::default();

    // First request still in flight.
    let _guard = fx.state.tracker.try_admit("123456").expect("admit");

    handler::handle_fetch(
        fx.state.clone(),
        &channel,
        "123456".into(),
        JobVariant::Standard,
    )
    .await;

    assert_eq!(fx.engine.calls(), 0, "duplicate must not reach the engine");
    assert!(
        channel
            .texts()
            .iter()
            .any(|t| t.contains("already being fetched"))
    );
}

#[tokio::test]
async fn invalid_id_is_rejected_early() {
    let fx = fixture("x", ScriptedOutcome::Ok, None);
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "12ab".into(), JobVariant::Standard).await;

    assert_eq!(fx.engine.calls(), 0);
    assert!(channel.texts().iter().any(|t| t.contains("numeric document id")));
    assert!(fx.state.tracker.snapshot().is_empty());
}

#[tokio::test]
async fn cached_document_short_circuits_the_engine() {
    let fx = fixture("77", ScriptedOutcome::Ok, None);
    std::fs::write(fx.state.config.document_path("77"), vec![1u8; 1024]).expect("seed cache");
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "77".into(), JobVariant::Standard).await;

    assert_eq!(fx.engine.calls(), 0, "cache hit skips the engine");
    assert!(channel.texts().iter().any(|t| t.contains("already downloaded")));
    assert_eq!(channel.attachments(), vec![("77.pdf".to_string(), 1024)]);
}

#[tokio::test]
async fn retry_variant_refetches_despite_cache() {
    let fx = fixture("88", ScriptedOutcome::Ok, Some(1024));
    std::fs::write(fx.state.config.document_path("88"), vec![1u8; 512]).expect("seed cache");
    let channel = RecordingChannel::default();

    handler::handle_fetch(fx.state.clone(), &channel, "88".into(), JobVariant::Retry).await;

    assert_eq!(fx.engine.calls(), 1, "retry re-runs the engine");
}

#[tokio::test]
async fn success_without_output_reports_conversion_failure() {
    let fx = fixture("31", ScriptedOutcome::Ok, None);
    // Simulate the engine leaving intermediate pages behind.
    let pages = fx.state.config.job_pages_dir("31");
    std::fs::create_dir_all(&pages).expect("pages dir");
    std::fs::write(pages.join("p1.jpg"), b"jpg").expect("page file");

    let channel = RecordingChannel::default();
    handler::handle_fetch(fx.state.clone(), &channel, "31".into(), JobVariant::Standard).await;

    assert!(channel.attachments().is_empty());
    assert!(
        channel
            .texts()
            .iter()
            .any(|t| t.contains("no document was produced") && t.contains("1 intermediate file")),
        "{:?}",
        channel.texts()
    );
}
