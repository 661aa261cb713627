//! Composes the actuator bus, gait engine, camera, vision pipeline,
//! autonomy policy, teleop input, and streaming server into the two
//! operating modes (`manual`, `autonomous`), and owns startup/shutdown
//! sequencing and the `running`/`paused` atomics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::actuator::bus::MOTOR_IDS;
use crate::actuator::ActuatorBus;
use crate::autonomy::{AutonomyPolicy, Mode as AutonomyMode};
use crate::camera::Camera;
use crate::cli::Mode;
use crate::config::AppConfig;
use crate::error::HexResult;
use crate::gait::library::{Action, GaitLibrary, INIT_POSE};
use crate::gait::GaitEngine;
use crate::input::{InputSource, Key};
use crate::server::{self, StatusHandle, StatusSnapshot};
use crate::vision::Detector;

/// Top-level coordinator. Construction opens the actuator bus; `run` drives
/// the selected mode to completion and `shutdown` releases every resource.
pub struct Orchestrator {
    config: AppConfig,
    bus: ActuatorBus,
    running: Arc<AtomicBool>,
    signaled: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Open the actuator bus and enable torque on all motors. Hardware
    /// resources are opened in dependency order: port, then (in `run`)
    /// camera, then server.
    pub fn start(config: AppConfig) -> HexResult<Self> {
        let mut bus = ActuatorBus::open(&config.serial.device, config.serial.baud)?;
        bus.enable_torque(&MOTOR_IDS)?;

        let running = Arc::new(AtomicBool::new(true));
        let signaled = Arc::new(AtomicBool::new(false));
        {
            let running = running.clone();
            let signaled = signaled.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                signaled.store(true, Ordering::SeqCst);
                running.store(false, Ordering::SeqCst);
            }) {
                warn!(error = %e, "failed to install signal handler");
            }
        }

        Ok(Self {
            config,
            bus,
            running,
            signaled,
        })
    }

    /// Whether the run loop ended because of a SIGINT/SIGTERM rather than a
    /// teleop quit keypress. Used by the entry point to pick exit code 130.
    pub fn was_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Run the selected mode until `running` is cleared (by Ctrl-C, SIGTERM,
    /// or a teleop quit keypress), then shut down. Returns whether the run
    /// ended because of a signal, for the entry point's exit code.
    pub fn run(mut self, mode: Mode) -> HexResult<bool> {
        let library = GaitLibrary::build();
        let mut engine = GaitEngine::new(library);

        // Write the init pose once on startup (end-to-end scenario 1).
        let init_frame = engine.tick();
        if let Err(e) = self.bus.broadcast_goal_positions(&init_frame) {
            warn!(error = %e, "initial broadcast failed");
        }
        thread::sleep(Duration::from_secs(1));

        let camera = Arc::new(Camera::start(&self.config.camera));
        let status: StatusHandle = Arc::new(Mutex::new(StatusSnapshot::default()));

        let server_running = self.running.clone();
        let server_camera = camera.clone();
        let server_status = status.clone();
        let port = self.config.server.port;
        let overlay = mode == Mode::Autonomous;
        let server_handle = thread::spawn(move || {
            if let Err(e) = server::run(
                port,
                server_camera,
                server_status,
                overlay,
                server::STREAM_JPEG_QUALITY,
                server_running,
            ) {
                warn!(error = %e, "streaming server exited with error");
            }
        });

        let input = InputSource::new();

        let result = match mode {
            Mode::Manual => self.run_manual(&mut engine, &input, &status),
            Mode::Autonomous => self.run_autonomous(&mut engine, &input, &camera, &status),
        };

        let signaled = self.was_signaled();
        self.shutdown(camera, server_handle);
        result.map(|()| signaled)
    }

    fn run_manual(
        &mut self,
        engine: &mut GaitEngine,
        input: &InputSource,
        status: &StatusHandle,
    ) -> HexResult<()> {
        info!("entering manual (teleop) mode");
        while self.running.load(Ordering::SeqCst) {
            match input.try_read_key(false) {
                Some(Key::Action(action)) => {
                    if engine.set_action(action) {
                        thread::sleep(GaitEngine::settle_delay());
                    }
                }
                Some(Key::Quit) => break,
                Some(Key::TogglePause) | None => {}
            }

            let frame = engine.tick();
            if let Err(e) = self.bus.broadcast_goal_positions(&frame) {
                warn!(error = %e, "broadcast failed, continuing open-loop");
            }

            let delay = engine.recommended_delay();
            if let Ok(mut snapshot) = status.lock() {
                snapshot.action = format!("{:?}", engine.current_action()).to_lowercase();
                snapshot.danger = "OK".to_string();
                snapshot.paused = false;
                snapshot.state = "FORWARD".to_string();
                snapshot.fps = 1000.0 / delay.as_millis().max(1) as f32;
            }

            thread::sleep(delay);
        }
        Ok(())
    }

    fn run_autonomous(
        &mut self,
        engine: &mut GaitEngine,
        input: &InputSource,
        camera: &Arc<Camera>,
        status: &StatusHandle,
    ) -> HexResult<()> {
        info!("entering autonomous mode");
        engine.set_vision_pacing(true);
        let detector = Detector::new(&self.config.detector);
        let mut policy = AutonomyPolicy::new();
        policy.toggle_pause(); // starts Paused; flip to Running to begin driving.

        while self.running.load(Ordering::SeqCst) {
            match input.try_read_key(true) {
                Some(Key::TogglePause) => policy.toggle_pause(),
                Some(Key::Quit) => break,
                Some(Key::Action(_)) | None => {}
            }

            let (obstacles, danger, position, action) = if policy.mode() == AutonomyMode::Paused {
                (Vec::new(), None, None, Action::Stop)
            } else if let Some(frame) = camera.latest_frame() {
                let (obstacles, danger, position) = detector.detect(&frame.image);
                let action = policy.decide(danger, position, &obstacles);
                (obstacles, Some(danger), Some(position), action)
            } else {
                // No frame yet: stay stopped for safety.
                (Vec::new(), None, None, Action::Stop)
            };

            if engine.set_action(action) {
                thread::sleep(GaitEngine::settle_delay());
            }
            let frame = engine.tick();
            if let Err(e) = self.bus.broadcast_goal_positions(&frame) {
                warn!(error = %e, "broadcast failed, continuing open-loop");
            }

            let delay = engine.recommended_delay();
            if let Ok(mut snapshot) = status.lock() {
                snapshot.obstacles = obstacles.len();
                snapshot.danger = danger
                    .map(|d| format!("{d:?}").to_uppercase())
                    .unwrap_or_else(|| "INIT".to_string());
                snapshot.action = format!("{action:?}").to_lowercase();
                snapshot.paused = policy.mode() == AutonomyMode::Paused;
                snapshot.state = state_label(position, policy.mode());
                snapshot.fps = 1000.0 / delay.as_millis().max(1) as f32;
            }

            thread::sleep(delay);
        }
        Ok(())
    }

    fn shutdown(self, camera: Arc<Camera>, server_handle: thread::JoinHandle<()>) {
        info!("shutting down");
        self.running.store(false, Ordering::SeqCst);

        let mut bus = self.bus;
        if let Err(e) = bus.broadcast_goal_positions(&INIT_POSE) {
            warn!(error = %e, "failed to write init pose during shutdown");
        }
        bus.close();

        drop(camera);
        let _ = server_handle.join();
        info!("shutdown complete");
    }
}

fn state_label(position: Option<crate::vision::Position>, mode: AutonomyMode) -> String {
    use crate::vision::Position::*;
    if mode == AutonomyMode::Paused {
        return "PAUSE".to_string();
    }
    match position {
        None => "FORWARD".to_string(),
        Some(Position::None) => "FORWARD".to_string(),
        Some(Center) => "DANGER".to_string(),
        Some(Both) => "BLOCKED".to_string(),
        Some(Left) | Some(Right) => "AVOIDING".to_string(),
    }
}
