//! Test helper utilities: local stub servers, fake pipeline scripts, and a
//! controller rig wired against them.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use pipeline_relay::app_state::AppState;
use pipeline_relay::config::{AppConfig, DeliveryMode};
use pipeline_relay::routes;
use pipeline_relay::services::controller::JobController;
use pipeline_relay::services::invoker::PipelineInvoker;
use pipeline_relay::services::transfer::TransferClient;

/// Script body that writes the expected 42-byte bundle into the output
/// directory (`$2` is the input path, `$4` the output directory).
pub const WRITE_42_BYTE_BUNDLE: &str = r#"mkdir -p "$4"
head -c 42 /dev/zero > "$4/PORT_BOND_BUNDLE.zip""#;

/// Counts requests served by a stub endpoint.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bind a stub router on an ephemeral local port and serve it in the
/// background.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    addr
}

/// Serve `body` with `status` at a single file URL, counting hits.
pub async fn start_file_server(status: StatusCode, body: &'static str) -> (String, HitCounter) {
    let hits = HitCounter::default();
    let handler_hits = hits.clone();
    let app = Router::new().route(
        "/file",
        get(move || async move {
            handler_hits.bump();
            (status, body)
        }),
    );

    let addr = serve(app).await;
    (format!("http://{addr}/file"), hits)
}

/// Stub upload endpoint answering every POST with `status` and `body`.
pub async fn start_upload_server(status: StatusCode, body: serde_json::Value) -> String {
    let app = Router::new().route(
        "/api/v1/upload",
        post(move || async move { (status, axum::Json(body)) }),
    );

    let addr = serve(app).await;
    format!("http://{addr}/api/v1/upload")
}

/// A fake pipeline executable on disk.
///
/// Every script touches an `invoked` marker next to itself when it starts,
/// so tests can assert whether the pipeline ran at all.
pub struct PipelineFixture {
    dir: tempfile::TempDir,
    pub bin: PathBuf,
}

pub fn fake_pipeline(body: &str) -> PipelineFixture {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("create pipeline dir");
    let bin = dir.path().join("fake-pipeline.sh");
    let script = format!("#!/bin/sh\ntouch \"$(dirname \"$0\")/invoked\"\n{body}\n");
    std::fs::write(&bin, script).expect("write fake pipeline");
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755))
        .expect("mark fake pipeline executable");

    PipelineFixture { dir, bin }
}

impl PipelineFixture {
    pub fn invoked(&self) -> bool {
        self.dir.path().join("invoked").exists()
    }

    pub fn marker(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// A controller built against test-owned scratch and bundle directories.
pub struct Rig {
    pub controller: JobController,
    pub scratch_root: tempfile::TempDir,
    pub bundle_dir: tempfile::TempDir,
}

impl Rig {
    pub fn scratch_is_empty(&self) -> bool {
        let mut entries =
            std::fs::read_dir(self.scratch_root.path()).expect("read scratch root");
        entries.next().is_none()
    }
}

pub fn test_config(pipeline_bin: &Path, scratch: &Path, bundles: &Path) -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        pipeline_bin: pipeline_bin.to_path_buf(),
        pipeline_timeout_secs: 30,
        download_timeout_secs: 5,
        upload_timeout_secs: 5,
        // Unreachable by default; tests that exercise uploads override it.
        upload_url: "http://127.0.0.1:9/api/v1/upload".to_string(),
        delivery_mode: DeliveryMode::Inline,
        max_inline_bytes: 8 * 1024 * 1024,
        scratch_dir: scratch.to_path_buf(),
        bundle_dir: bundles.to_path_buf(),
    }
}

pub fn build_controller(config: &AppConfig) -> JobController {
    let transfer = TransferClient::new(
        &config.upload_url,
        Duration::from_secs(config.download_timeout_secs),
        Duration::from_secs(config.upload_timeout_secs),
    );
    let invoker = PipelineInvoker::new(
        &config.pipeline_bin,
        Duration::from_secs(config.pipeline_timeout_secs),
    );
    JobController::new(transfer, invoker, config)
}

pub fn rig(pipeline_bin: &Path, tweak: impl FnOnce(&mut AppConfig)) -> Rig {
    let scratch_root = tempfile::tempdir().expect("create scratch root");
    let bundle_dir = tempfile::tempdir().expect("create bundle dir");
    let mut config = test_config(pipeline_bin, scratch_root.path(), bundle_dir.path());
    tweak(&mut config);

    let controller = build_controller(&config);

    Rig {
        controller,
        scratch_root,
        bundle_dir,
    }
}

/// Mount the real routes on an ephemeral port and return the base URL.
pub async fn start_app(config: AppConfig) -> String {
    let controller = build_controller(&config);
    let state = AppState::new(config, controller);

    let app = Router::new()
        .route("/", post(routes::process::process_job))
        .route("/health", get(routes::health::health_check))
        .route("/status", get(routes::health::status))
        .with_state(state);

    let addr = serve(app).await;
    format!("http://{addr}")
}
