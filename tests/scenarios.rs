//! End-to-end scenario tests exercising the pure (non-hardware) parts of the
//! control stack together: gait engine, obstacle detector, autonomy policy,
//! and the streaming server's `/status` route. The actuator bus and camera
//! subprocess require real hardware and are covered by unit tests alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hexapod_control::autonomy::AutonomyPolicy;
use hexapod_control::config::DetectorConfig;
use hexapod_control::gait::library::{deg_to_raw, Action, GaitLibrary, INIT_POSE};
use hexapod_control::gait::GaitEngine;
use hexapod_control::vision::{Danger, Detector, Position};
use image::{Rgb, RgbImage};

#[test]
fn boot_sequence_emits_init_pose() {
    let mut engine = GaitEngine::new(GaitLibrary::build());
    let frame = engine.tick();
    assert_eq!(frame, INIT_POSE);
    assert_eq!(deg_to_raw(frame[0]), 2389);
}

#[test]
fn forward_walk_cycle_completes_one_revolution() {
    let mut engine = GaitEngine::new(GaitLibrary::build());
    engine.set_action(Action::Forward);

    let library = GaitLibrary::build();
    let forward_len = library.forward.len();
    assert_eq!(forward_len, 12);

    let mut broadcasts = Vec::with_capacity(forward_len);
    for _ in 0..forward_len {
        broadcasts.push(engine.tick());
    }

    assert_eq!(engine.cursor(), 0);
    assert_eq!(broadcasts.len(), 12);
    assert_eq!(deg_to_raw(broadcasts[0][0]), deg_to_raw(library.forward[0][0]));
}

fn blob_frame(w: u32, h: u32, x0: u32, y0: u32, bw: u32, bh: u32) -> RgbImage {
    let mut frame = RgbImage::from_pixel(w, h, Rgb([30, 30, 30]));
    for y in y0..(y0 + bh).min(h) {
        for x in x0..(x0 + bw).min(w) {
            frame.put_pixel(x, y, Rgb([230, 30, 30]));
        }
    }
    frame
}

#[test]
fn obstacle_on_the_right_drives_an_escape_slide_left() {
    // Bright blob in the right third, low in frame (close to the robot).
    let frame = blob_frame(640, 240, 480, 180, 120, 50);
    let detector = Detector::new(&DetectorConfig {
        min_area: 4000,
        stop_distance_threshold: 0.65,
    });
    let (obstacles, danger, position) = detector.detect(&frame);

    assert!(!obstacles.is_empty());
    assert_eq!(position, Position::Right);
    assert!(matches!(danger, Danger::Obs | Danger::Warn));

    let mut policy = AutonomyPolicy::new();
    policy.toggle_pause();
    let action = policy.decide(Danger::Obs, Position::Right, &obstacles);
    assert_eq!(action, Action::SlideLeft);
}

#[test]
fn central_near_obstacle_drives_a_pivot() {
    let frame = blob_frame(640, 240, 260, 190, 160, 38);
    let detector = Detector::new(&DetectorConfig {
        min_area: 4000,
        stop_distance_threshold: 0.5,
    });
    let (obstacles, danger, position) = detector.detect(&frame);

    assert!(!obstacles.is_empty());
    assert_eq!(position, Position::Center);
    assert_eq!(danger, Danger::Stop);

    let mut policy = AutonomyPolicy::new();
    policy.toggle_pause();
    let action = policy.decide(danger, position, &obstacles);
    assert!(matches!(action, Action::PivotLeft | Action::PivotRight));
    assert_eq!(policy.danger_count(), 1);
}

#[test]
fn pause_round_trip_resets_cursor_and_re_emits_init() {
    let mut engine = GaitEngine::new(GaitLibrary::build());
    let mut policy = AutonomyPolicy::new();
    policy.toggle_pause(); // Running

    let action = policy.decide(Danger::Ok, Position::None, &[]);
    assert_eq!(action, Action::Forward);
    engine.set_action(action);
    engine.tick();
    engine.tick();
    let cursor_before_pause = engine.cursor();
    assert!(cursor_before_pause > 0);

    policy.toggle_pause(); // Paused
    let paused_action = policy.decide(Danger::Ok, Position::None, &[]);
    assert_eq!(paused_action, Action::Stop);
    engine.set_action(paused_action);
    let frame = engine.tick();
    assert_eq!(frame, INIT_POSE);
    assert_eq!(engine.cursor(), 0);

    policy.toggle_pause(); // Running again
    let resumed_action = policy.decide(Danger::Ok, Position::None, &[]);
    assert_eq!(resumed_action, Action::Forward);
    assert!(engine.set_action(resumed_action));
    assert_eq!(engine.cursor(), 0);
}

#[tokio::test]
async fn http_status_reports_ok_with_no_obstacles() {
    use hexapod_control::camera::Camera;
    use hexapod_control::config::CameraConfig;
    use hexapod_control::server::StatusSnapshot;

    let camera = Arc::new(Camera::start(&CameraConfig {
        width: 64,
        height: 48,
        fps: 1,
        jpeg_quality: 60,
    }));
    let status = Arc::new(Mutex::new(StatusSnapshot {
        fps: 10.0,
        obstacles: 0,
        danger: "OK".to_string(),
        action: "forward".to_string(),
        state: "FORWARD".to_string(),
        paused: false,
    }));
    let running = Arc::new(AtomicBool::new(true));

    let port = 18080u16;
    let server_running = running.clone();
    let server_camera = camera.clone();
    let server_status = status.clone();
    let handle = std::thread::spawn(move || {
        let _ = hexapod_control::server::run(
            port,
            server_camera,
            server_status,
            false,
            60,
            server_running,
        );
    });

    // Give the listener a moment to bind before connecting.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let client = hyper::Client::new();
    let uri: hyper::Uri = format!("http://127.0.0.1:{port}/status").parse().unwrap();
    let response = client.get(uri).await.expect("request should succeed");
    assert_eq!(response.status(), hyper::StatusCode::OK);

    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("body should read");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("valid JSON");

    assert_eq!(body["danger"], "OK");
    assert_eq!(body["obstacles"], 0);
    assert_eq!(body["paused"], false);
    assert_eq!(body["action"], "forward");

    running.store(false, Ordering::SeqCst);
    let _ = handle.join();
}
