//! HTTP MJPEG streaming server: `/` (HTML viewer), `/stream` (MJPEG
//! multipart), `/status` (JSON snapshot). Runs on its own Tokio runtime
//! thread so the synchronous control loop is never scheduled alongside it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::camera::Camera;
use crate::error::HexResult;
use crate::vision::{self, Danger, Detector};

const BOUNDARY: &str = "F";
/// `/stream` JPEG encode quality (distinct from the camera's own capture
/// quality, which governs the subprocess's MJPEG encode).
pub const STREAM_JPEG_QUALITY: u8 = 70;
const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>hexapod</title></head>
<body style="background:#111;color:#eee;font-family:sans-serif;">
<h1>hexapod monitor</h1>
<img src="/stream" style="max-width:100%;border:1px solid #444;" />
<pre id="status"></pre>
<script>
setInterval(() => fetch('/status').then(r => r.json()).then(s => {
  document.getElementById('status').textContent = JSON.stringify(s, null, 2);
}), 1000);
</script>
</body>
</html>"#;

/// JSON-serializable snapshot the orchestrator publishes for `/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusSnapshot {
    pub fps: f32,
    pub obstacles: usize,
    pub danger: String,
    pub action: String,
    pub state: String,
    pub paused: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            fps: 0.0,
            obstacles: 0,
            danger: "INIT".to_string(),
            action: "stop".to_string(),
            state: "INIT".to_string(),
            paused: false,
        }
    }
}

pub type StatusHandle = Arc<Mutex<StatusSnapshot>>;

/// Shared handles the server needs to serve every route.
#[derive(Clone)]
struct AppState {
    camera: Arc<Camera>,
    status: StatusHandle,
    overlay: bool,
    jpeg_quality: u8,
}

/// Runs the HTTP server to completion on a dedicated Tokio runtime. Blocks
/// the calling thread; spawn it on its own `std::thread`.
pub fn run(
    port: u16,
    camera: Arc<Camera>,
    status: StatusHandle,
    overlay: bool,
    jpeg_quality: u8,
    running: Arc<std::sync::atomic::AtomicBool>,
) -> HexResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| crate::error::HexError::Server(format!("failed to start runtime: {e}")))?;

    runtime.block_on(async move {
        let state = AppState {
            camera,
            status,
            overlay,
            jpeg_quality,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let make_svc = make_service_fn(move |_conn| {
            let state = state.clone();
            async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone()))) }
        });

        let server = Server::bind(&addr).serve(make_svc);
        info!(%addr, "streaming server listening");

        let shutdown = async {
            while running.load(std::sync::atomic::Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        };

        if let Err(e) = server.with_graceful_shutdown(shutdown).await {
            error!(error = %e, "streaming server error");
        }
    });

    Ok(())
}

async fn handle(req: Request<Body>, state: AppState) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => Response::builder()
            .header("Content-Type", "text/html")
            .body(Body::from(INDEX_HTML))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        (&Method::GET, "/stream") => stream_response(state).await,
        (&Method::GET, "/status") => status_response(&state),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap_or_else(|_| Response::new(Body::empty())),
    };
    Ok(response)
}

fn status_response(state: &AppState) -> Response<Body> {
    let snapshot = state
        .status
        .lock()
        .map(|s| s.clone())
        .unwrap_or_default();
    match serde_json::to_vec(&snapshot) {
        Ok(body) => Response::builder()
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::from(body))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        Err(_) => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .unwrap_or_else(|_| Response::new(Body::empty())),
    }
}

async fn stream_response(state: AppState) -> Response<Body> {
    let (mut sender, body) = Body::channel();

    tokio::spawn(async move {
        let detector = state
            .overlay
            .then(|| Detector::new(&crate::config::DetectorConfig::default()));

        loop {
            let frame = state.camera.latest_frame();
            if let Some(frame) = frame {
                let mut rgb = (*frame.image).clone();

                if let Some(detector) = &detector {
                    let (obstacles, danger, _position) = detector.detect(&rgb);
                    vision::overlay::draw(&mut rgb, &obstacles, danger);
                }

                if let Some(jpeg) = encode_jpeg(&rgb, state.jpeg_quality) {
                    let mut part = Vec::with_capacity(jpeg.len() + 64);
                    part.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
                    part.extend_from_slice(b"Content-Type: image/jpeg\r\n");
                    part.extend_from_slice(
                        format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes(),
                    );
                    part.extend_from_slice(&jpeg);
                    part.extend_from_slice(b"\r\n");

                    if sender.send_data(part.into()).await.is_err() {
                        debug!(error = %crate::error::HexError::ClientDisconnect, "stream client gone, ending response");
                        break;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    let content_type = format!("multipart/x-mixed-replace; boundary={BOUNDARY}");
    Response::builder()
        .header("Content-Type", content_type)
        .header("Access-Control-Allow-Origin", "*")
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn encode_jpeg(image: &image::RgbImage, quality: u8) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    match encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    ) {
        Ok(()) => Some(buf),
        Err(e) => {
            warn!(error = %e, "failed to encode JPEG frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn status_snapshot_serializes_expected_keys() {
        let snapshot = StatusSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("fps").is_some());
        assert!(json.get("obstacles").is_some());
        assert!(json.get("danger").is_some());
        assert!(json.get("action").is_some());
        assert!(json.get("state").is_some());
        assert!(json.get("paused").is_some());
    }

    #[test]
    fn encode_jpeg_round_trips_dimensions() {
        let img = image::RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        let encoded = encode_jpeg(&img, 70).expect("should encode");
        let decoded = image::load_from_memory(&encoded).expect("should decode");
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn danger_colour_mapping_is_distinct() {
        use vision::detector::Danger::*;
        let mut colours = std::collections::HashSet::new();
        for d in [Ok, Obs, Warn, Stop] {
            colours.insert(format!("{d:?}"));
        }
        assert_eq!(colours.len(), 4);
    }
}
