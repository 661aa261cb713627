//! Camera source: spawns an MJPEG-producing subprocess, decodes the stream,
//! and publishes the latest decoded frame behind a mutex.
//!
//! Primary path: spawn `libcamera-vid` writing MJPEG to stdout and scan it
//! for JPEG SOI/EOI markers. Fallback path, used if spawning the primary
//! process fails: repeatedly invoke a still-image capture command into a
//! temp file and read it back. Both paths are ported from the reference
//! `FastCamera` implementation.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
const SCAN_BUFFER_CAP: usize = 500_000;
const SCAN_BUFFER_KEEP: usize = 100_000;

/// A single decoded camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: Arc<RgbImage>,
}

type FrameSlot = Arc<Mutex<Option<Frame>>>;

/// Owns the capture subprocess/thread and exposes the latest decoded frame.
pub struct Camera {
    slot: FrameSlot,
    running: Arc<std::sync::atomic::AtomicBool>,
    process: Option<Child>,
    capture_thread: Option<JoinHandle<()>>,
    temp_dir: Option<tempfile::TempDir>,
}

impl Camera {
    /// Start the camera. Tries the primary MJPEG subprocess path first;
    /// falls back to still-image snapshots if that subprocess can't be
    /// spawned.
    pub fn start(config: &CameraConfig) -> Self {
        info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            "starting camera"
        );

        let slot: FrameSlot = Arc::new(Mutex::new(None));
        let running = Arc::new(std::sync::atomic::AtomicBool::new(true));

        let spawn_result = Command::new("libcamera-vid")
            .arg("--width")
            .arg(config.width.to_string())
            .arg("--height")
            .arg(config.height.to_string())
            .arg("--framerate")
            .arg(config.fps.to_string())
            .arg("--timeout")
            .arg("0")
            .arg("--codec")
            .arg("mjpeg")
            .arg("--quality")
            .arg(config.jpeg_quality.to_string())
            .arg("--nopreview")
            .arg("-o")
            .arg("-")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();

        match spawn_result {
            Ok(mut child) => {
                let stdout = child.stdout.take();
                let thread_slot = slot.clone();
                let thread_running = running.clone();
                let handle = stdout.map(|out| {
                    thread::spawn(move || read_mjpeg(out, thread_slot, thread_running))
                });
                info!("camera started via libcamera-vid");
                Camera {
                    slot,
                    running,
                    process: Some(child),
                    capture_thread: handle,
                    temp_dir: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "libcamera-vid spawn failed, falling back to snapshot capture");
                Self::start_fallback(config, slot, running)
            }
        }
    }

    fn start_fallback(config: &CameraConfig, slot: FrameSlot, running: Arc<std::sync::atomic::AtomicBool>) -> Self {
        let temp_dir = tempfile::tempdir().ok();
        let frame_path = temp_dir
            .as_ref()
            .map(|d| d.path().join("frame.jpg"))
            .unwrap_or_else(|| std::path::PathBuf::from("frame.jpg"));

        let cfg = config.clone();
        let thread_slot = slot.clone();
        let thread_running = running.clone();
        let handle = thread::spawn(move || capture_loop(cfg, frame_path, thread_slot, thread_running));

        Camera {
            slot,
            running,
            process: None,
            capture_thread: Some(handle),
            temp_dir,
        }
    }

    /// Return the most recently decoded frame, if any.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|g| g.clone())
    }

    /// Stop the capture subprocess/thread and clean up temp files.
    pub fn stop(&mut self) {
        self.running
            .store(false, std::sync::atomic::Ordering::SeqCst);
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
        self.temp_dir = None;
        info!("camera stopped");
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_mjpeg(
    mut stdout: impl Read,
    slot: FrameSlot,
    running: Arc<std::sync::atomic::AtomicBool>,
) {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    while running.load(std::sync::atomic::Ordering::SeqCst) {
        let n = match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let err = crate::error::HexError::Camera(format!("subprocess pipe read failed: {e}"));
                warn!(error = %err);
                break;
            }
        };
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(start) = find_subslice(&buffer, &JPEG_SOI) {
            if let Some(end) = find_subslice(&buffer[start..], &JPEG_EOI) {
                let end = start + end + 2;
                let jpeg_data = buffer[start..end].to_vec();
                buffer.drain(..end);

                if let Ok(decoded) = image::load_from_memory(&jpeg_data) {
                    let rgb = decoded.to_rgb8();
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(Frame {
                            image: Arc::new(rgb),
                        });
                    }
                } else {
                    let err = crate::error::HexError::Decode(
                        "dropped malformed JPEG segment from camera stream".to_string(),
                    );
                    debug!(error = %err);
                }
            }
        }

        if buffer.len() > SCAN_BUFFER_CAP {
            let keep_from = buffer.len() - SCAN_BUFFER_KEEP;
            buffer.drain(..keep_from);
        }
    }
}

fn capture_loop(
    config: CameraConfig,
    frame_path: std::path::PathBuf,
    slot: FrameSlot,
    running: Arc<std::sync::atomic::AtomicBool>,
) {
    let frame_delay = Duration::from_secs_f64(1.0 / config.fps.max(1) as f64);

    while running.load(std::sync::atomic::Ordering::SeqCst) {
        let start = std::time::Instant::now();

        let status = Command::new("rpicam-jpeg")
            .arg("--width")
            .arg(config.width.to_string())
            .arg("--height")
            .arg(config.height.to_string())
            .arg("--timeout")
            .arg("500")
            .arg("--quality")
            .arg(config.jpeg_quality.to_string())
            .arg("--output")
            .arg(&frame_path)
            .arg("--nopreview")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        if status.is_ok() {
            if let Ok(decoded) = image::open(&frame_path) {
                let rgb = decoded.to_rgb8();
                if let Ok(mut guard) = slot.lock() {
                    *guard = Some(Frame {
                        image: Arc::new(rgb),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        if elapsed < frame_delay {
            thread::sleep(frame_delay - elapsed);
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
