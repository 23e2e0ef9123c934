//! Report upload server: a local HTTP server that turns photographed lab
//! reports into structured test results.
//!
//! Serves a single-page upload form, accepts a multipart image upload on
//! `POST /get-lab-tests`, runs it through the OCR pipeline, and responds
//! with the parsed records in a success/error envelope.
//!
//! Pattern: bind → spawn background task → return handle with shutdown
//! channel.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::models::LabTestRecord;
use crate::pipeline::{self, ExtractionError, OcrEngine};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Session metadata for a running report server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub session_id: Uuid,
    pub server_addr: String,
    pub url: String,
    pub started_at: chrono::NaiveDateTime,
}

/// Handle to a running report server.
pub struct ReportServer {
    pub session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ReportServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Report server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Success/error envelope for `POST /get-lab-tests`. Exactly one of
/// `data` and `error` is present; the other is omitted from the JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct LabTestsEnvelope {
    pub is_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<LabTestRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LabTestsEnvelope {
    fn success(records: Vec<LabTestRecord>) -> Self {
        Self {
            is_success: true,
            data: Some(records),
            error: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal types (axum server state)
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ServerState {
    engine: Arc<dyn OcrEngine>,
}

// ---------------------------------------------------------------------------
// Server lifecycle
// ---------------------------------------------------------------------------

/// Start the report server on the configured address.
///
/// Binds, builds the router, and spawns the axum server in a background
/// tokio task. Returns a handle with session metadata and a shutdown
/// channel. Bind to port 0 to let the OS pick one (tests do).
pub async fn start_report_server(
    config: ServerConfig,
    engine: Arc<dyn OcrEngine>,
) -> Result<ReportServer, String> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| format!("Failed to bind report server: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let session = ServerSession {
        session_id: Uuid::new_v4(),
        server_addr: addr.to_string(),
        url: format!("http://{addr}/"),
        started_at: chrono::Local::now().naive_local(),
    };

    let app = report_router(ServerState { engine }, config.max_upload_bytes);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Report server received shutdown signal");
        };

        tracing::info!(%addr, "Report server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Report server error: {e}");
        }

        tracing::info!("Report server stopped");
    });

    Ok(ReportServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

fn report_router(state: ServerState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_upload_page))
        .route("/get-lab-tests", post(get_lab_tests))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_upload_bytes + 1024 * 1024)) // multipart framing overhead
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Axum handlers
// ---------------------------------------------------------------------------

async fn serve_upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE_HTML)
}

async fn get_lab_tests(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<LabTestsEnvelope>) {
    let mut file_data: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            match field.bytes().await {
                Ok(bytes) => file_data = Some(bytes.to_vec()),
                Err(e) => {
                    tracing::warn!("Failed to read upload bytes: {e}");
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(LabTestsEnvelope::failure("Failed to read file data.")),
                    );
                }
            }
        }
    }

    let Some(bytes) = file_data else {
        return (
            StatusCode::BAD_REQUEST,
            Json(LabTestsEnvelope::failure("No file provided.")),
        );
    };

    // Decode + OCR are CPU-bound; keep them off the async runtime.
    let size = bytes.len();
    let engine = state.engine.clone();
    let result =
        tokio::task::spawn_blocking(move || pipeline::process_report_image(engine.as_ref(), &bytes))
            .await;

    match result {
        Ok(Ok(records)) => {
            tracing::info!(count = records.len(), size, "Report parsed");
            (StatusCode::OK, Json(LabTestsEnvelope::success(records)))
        }
        Ok(Err(e)) => {
            tracing::warn!("Report pipeline failed: {e}");
            (status_for(&e), Json(LabTestsEnvelope::failure(e.to_string())))
        }
        Err(e) => {
            tracing::error!("Report task failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LabTestsEnvelope::failure("Report processing failed.")),
            )
        }
    }
}

fn status_for(err: &ExtractionError) -> StatusCode {
    match err {
        ExtractionError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Upload page HTML (self-contained, mobile-optimized, no external resources)
// ---------------------------------------------------------------------------

const UPLOAD_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1, maximum-scale=1">
  <title>Labscan — Scan a Lab Report</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      background: #fafaf9; color: #1c1917;
      min-height: 100vh; display: flex; flex-direction: column;
      align-items: center; padding: 32px 24px;
    }
    h1 { font-size: 24px; margin-bottom: 8px; }
    p { color: #78716c; font-size: 14px; margin-bottom: 24px; text-align: center; }
    .actions { display: flex; flex-direction: column; gap: 12px; width: 100%; max-width: 320px; }
    .btn {
      display: flex; align-items: center; justify-content: center;
      padding: 16px; border-radius: 12px; font-size: 16px; font-weight: 500;
      cursor: pointer; border: none; min-height: 56px; width: 100%;
    }
    .btn-primary { background: #4a7c59; color: white; }
    .btn-secondary { background: white; color: #44403c; border: 1px solid #d6d3d1; }
    .status { margin-top: 24px; text-align: center; font-size: 14px; }
    .status.error { color: #dc2626; }
    table { margin-top: 24px; border-collapse: collapse; width: 100%; max-width: 560px; display: none; }
    th, td { padding: 8px 12px; border-bottom: 1px solid #e7e5e4; text-align: left; font-size: 14px; }
    th { color: #78716c; font-weight: 500; }
    .flag { color: #dc2626; font-weight: 600; }
    #file-input, #camera-input { display: none; }
  </style>
</head>
<body>
  <h1>Labscan</h1>
  <p>Photograph a lab report and get its test results as structured data.</p>

  <div class="actions">
    <button class="btn btn-primary" id="btn-photo">Take a photo</button>
    <button class="btn btn-secondary" id="btn-file">Choose an image</button>
  </div>

  <input type="file" id="file-input" accept="image/*">
  <input type="file" id="camera-input" accept="image/*" capture="environment">

  <div class="status" id="status"></div>

  <table id="results">
    <thead>
      <tr><th>Test</th><th>Value</th><th>Reference range</th><th></th></tr>
    </thead>
    <tbody id="results-body"></tbody>
  </table>

  <script>
    var fileInput = document.getElementById('file-input');
    var cameraInput = document.getElementById('camera-input');
    var statusEl = document.getElementById('status');
    var tableEl = document.getElementById('results');
    var bodyEl = document.getElementById('results-body');

    document.getElementById('btn-photo').addEventListener('click', function() { cameraInput.click(); });
    document.getElementById('btn-file').addEventListener('click', function() { fileInput.click(); });

    cameraInput.addEventListener('change', handleFile);
    fileInput.addEventListener('change', handleFile);

    function handleFile(e) {
      var file = e.target.files[0];
      if (!file) return;

      var formData = new FormData();
      formData.append('file', file);

      showStatus('Scanning...', '');
      tableEl.style.display = 'none';

      var xhr = new XMLHttpRequest();
      xhr.open('POST', '/get-lab-tests');
      xhr.onload = function() {
        var resp;
        try {
          resp = JSON.parse(xhr.responseText);
        } catch (_) {
          showStatus('Scan failed', 'error');
          return;
        }
        if (resp.is_success) {
          renderResults(resp.data);
        } else {
          showStatus(resp.error || 'Scan failed', 'error');
        }
      };
      xhr.onerror = function() { showStatus('Connection failed', 'error'); };
      xhr.send(formData);
    }

    function renderResults(records) {
      if (!records.length) {
        showStatus('No lab tests recognized in this image.', '');
        return;
      }
      showStatus(records.length + ' test(s) found', '');
      bodyEl.innerHTML = '';
      records.forEach(function(r) {
        var row = document.createElement('tr');
        addCell(row, r.test_name);
        addCell(row, r.test_value + (r.test_unit ? ' ' + r.test_unit : ''));
        addCell(row, r.bio_reference_range);
        var flag = addCell(row, r.lab_test_out_of_range ? 'out of range' : '');
        if (r.lab_test_out_of_range) flag.className = 'flag';
        bodyEl.appendChild(row);
      });
      tableEl.style.display = 'table';
    }

    function addCell(row, text) {
      var cell = document.createElement('td');
      cell.textContent = text;
      row.appendChild(cell);
      return cell;
    }

    function showStatus(message, kind) {
      statusEl.textContent = message;
      statusEl.className = 'status' + (kind ? ' ' + kind : '');
    }
  </script>
</body>
</html>
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{MockOcrEngine, OcrPageResult};

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
            Err(ExtractionError::OcrProcessing("engine exploded".into()))
        }
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    async fn start_test_server(engine: Arc<dyn OcrEngine>) -> ReportServer {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ServerConfig::default()
        };
        start_report_server(config, engine)
            .await
            .expect("server should start")
    }

    async fn post_file(server: &ReportServer, bytes: Vec<u8>) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name("report.png"),
        );
        reqwest::Client::new()
            .post(format!("{}get-lab-tests", server.session.url))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    #[test]
    fn success_envelope_omits_error_key() {
        let json = serde_json::to_value(LabTestsEnvelope::success(vec![])).unwrap();
        assert_eq!(json["is_success"], true);
        assert!(json.get("data").is_some());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_envelope_omits_data_key() {
        let json = serde_json::to_value(LabTestsEnvelope::failure("bad image")).unwrap();
        assert_eq!(json["is_success"], false);
        assert_eq!(json["error"], "bad image");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn server_session_has_valid_metadata() {
        let mut server =
            start_test_server(Arc::new(MockOcrEngine::new("", 0.9))).await;

        assert!(server.session.server_addr.contains(':'));
        assert!(server.session.url.starts_with("http://127.0.0.1:"));

        server.shutdown();
    }

    #[tokio::test]
    async fn upload_page_is_served() {
        let mut server =
            start_test_server(Arc::new(MockOcrEngine::new("", 0.9))).await;

        let body = reqwest::get(&server.session.url)
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("Labscan"));
        assert!(body.contains("/get-lab-tests"));

        server.shutdown();
    }

    #[tokio::test]
    async fn health_route_responds() {
        let mut server =
            start_test_server(Arc::new(MockOcrEngine::new("", 0.9))).await;

        let body = reqwest::get(format!("{}health", server.session.url))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        server.shutdown();
    }

    #[tokio::test]
    async fn upload_round_trip_returns_records() {
        let engine = MockOcrEngine::new(
            "GLUCOSE 90 70-100 CHOLESTEROL 220 mg/dL 125-200",
            0.95,
        );
        let mut server = start_test_server(Arc::new(engine)).await;

        let resp = post_file(&server, tiny_png()).await;
        assert_eq!(resp.status().as_u16(), 200);

        let envelope: LabTestsEnvelope = resp.json().await.unwrap();
        assert!(envelope.is_success);
        let records = envelope.data.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].test_name, "GLUCOSE");
        assert!(records[1].lab_test_out_of_range);

        server.shutdown();
    }

    #[tokio::test]
    async fn upload_with_no_matches_returns_empty_success() {
        let engine = MockOcrEngine::new("nothing recognizable here", 0.4);
        let mut server = start_test_server(Arc::new(engine)).await;

        let resp = post_file(&server, tiny_png()).await;
        assert_eq!(resp.status().as_u16(), 200);

        let envelope: LabTestsEnvelope = resp.json().await.unwrap();
        assert!(envelope.is_success);
        assert!(envelope.data.unwrap().is_empty());

        server.shutdown();
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let mut server =
            start_test_server(Arc::new(MockOcrEngine::new("", 0.9))).await;

        let form = reqwest::multipart::Form::new().text("note", "no file here");
        let resp = reqwest::Client::new()
            .post(format!("{}get-lab-tests", server.session.url))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        let envelope: LabTestsEnvelope = resp.json().await.unwrap();
        assert!(!envelope.is_success);
        assert_eq!(envelope.error.as_deref(), Some("No file provided."));

        server.shutdown();
    }

    #[tokio::test]
    async fn undecodable_upload_is_rejected() {
        let mut server =
            start_test_server(Arc::new(MockOcrEngine::new("", 0.9))).await;

        let resp = post_file(&server, b"this is not an image".to_vec()).await;
        assert_eq!(resp.status().as_u16(), 422);

        let envelope: LabTestsEnvelope = resp.json().await.unwrap();
        assert!(!envelope.is_success);
        assert!(envelope.error.unwrap().contains("Image decoding failed"));

        server.shutdown();
    }

    #[tokio::test]
    async fn engine_failure_maps_to_500() {
        let mut server = start_test_server(Arc::new(FailingEngine)).await;

        let resp = post_file(&server, tiny_png()).await;
        assert_eq!(resp.status().as_u16(), 500);

        let envelope: LabTestsEnvelope = resp.json().await.unwrap();
        assert!(!envelope.is_success);
        assert!(envelope.error.unwrap().contains("engine exploded"));

        server.shutdown();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_waits() {
        let mut server =
            start_test_server(Arc::new(MockOcrEngine::new("", 0.9))).await;

        server.shutdown();
        server.shutdown(); // Second call is a no-op
        server.wait().await;
    }
}
