//! Autonomy finite-state machine: `(Danger, Position)` plus hidden escape
//! state maps to the next gait action. See SPEC_FULL.md section 4.6 for the
//! transition table this implements; it has no direct precedent in the
//! filtered original-source material, which dropped the mechanism this
//! policy implements, so it is built directly from the specification.

use crate::gait::library::Action;
use crate::vision::detector::{Danger, Obstacle, Position, Zone};

/// Left/right bias used for pivoting and escape-direction memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Whether the policy is actively driving the gait engine or idling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Paused,
    Running,
}

const STOP_CLEARANCE_DIST: f32 = 0.3;
const OBS_RECOVERY_STEPS: u32 = 10;
const WARN_BOTH_BLOCK: u32 = 6;

/// Hidden FSM state plus the pause gate.
pub struct AutonomyPolicy {
    mode: Mode,
    escape_direction: Option<Side>,
    escape_steps: u32,
    rotation_bias: Side,
    danger_count: u32,
}

impl Default for AutonomyPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AutonomyPolicy {
    pub fn new() -> Self {
        Self {
            mode: Mode::Paused,
            escape_direction: None,
            escape_steps: 0,
            rotation_bias: Side::Left,
            danger_count: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn toggle_pause(&mut self) {
        self.mode = match self.mode {
            Mode::Paused => Mode::Running,
            Mode::Running => Mode::Paused,
        };
    }

    pub fn danger_count(&self) -> u32 {
        self.danger_count
    }

    /// Decide the next action. While paused, always returns `Stop` without
    /// touching any hidden state.
    pub fn decide(&mut self, danger: Danger, position: Position, obstacles: &[Obstacle]) -> Action {
        if self.mode == Mode::Paused {
            return Action::Stop;
        }

        match (danger, position) {
            (Danger::Stop, Position::Center) => self.handle_stop_center(obstacles),
            (Danger::Warn, Position::Center) => self.handle_warn_center(),
            (Danger::Warn, Position::Both) => self.handle_warn_both(),
            (Danger::Obs, Position::Left) => self.handle_obs_side(Side::Right),
            (Danger::Obs, Position::Right) => self.handle_obs_side(Side::Left),
            (Danger::Ok, Position::None) => {
                self.clear_escape_state();
                Action::Forward
            }
            // Any other combination falls back to stopping in place; the
            // detector never emits these, but the FSM stays total.
            _ => Action::Stop,
        }
    }

    fn handle_stop_center(&mut self, obstacles: &[Obstacle]) -> Action {
        self.danger_count += 1;

        let left_blocked = obstacles
            .iter()
            .any(|o| o.zone == Zone::Left && o.distance > STOP_CLEARANCE_DIST);
        let right_blocked = obstacles
            .iter()
            .any(|o| o.zone == Zone::Right && o.distance > STOP_CLEARANCE_DIST);

        let chosen = match (left_blocked, right_blocked) {
            (true, false) => Side::Right,
            (false, true) => Side::Left,
            _ => self.rotation_bias,
        };
        self.rotation_bias = chosen;

        match chosen {
            Side::Left => Action::PivotLeft,
            Side::Right => Action::PivotRight,
        }
    }

    fn handle_warn_center(&mut self) -> Action {
        if self.escape_direction.is_none() {
            self.escape_direction = Some(Side::Left);
        }
        match self.escape_direction {
            Some(Side::Left) => Action::SlideLeft,
            Some(Side::Right) => Action::SlideRight,
            None => Action::SlideLeft,
        }
    }

    fn handle_warn_both(&mut self) -> Action {
        if self.escape_steps >= WARN_BOTH_BLOCK {
            self.escape_steps = 0;
            return match self.rotation_bias {
                Side::Left => Action::PivotLeft,
                Side::Right => Action::PivotRight,
            };
        }

        let action = if self.escape_steps % WARN_BOTH_BLOCK < WARN_BOTH_BLOCK / 2 {
            Action::SlideLeft
        } else {
            Action::SlideRight
        };
        self.escape_steps += 1;
        action
    }

    fn handle_obs_side(&mut self, escape_toward: Side) -> Action {
        if self.escape_steps > OBS_RECOVERY_STEPS {
            self.escape_steps = 0;
            return Action::Forward;
        }
        self.escape_direction = Some(escape_toward);
        self.escape_steps += 1;
        match escape_toward {
            Side::Left => Action::SlideLeft,
            Side::Right => Action::SlideRight,
        }
    }

    fn clear_escape_state(&mut self) {
        self.escape_direction = None;
        self.escape_steps = 0;
    }
}
