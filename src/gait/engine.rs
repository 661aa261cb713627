//! Cursor-based keyframe scheduler.

use std::time::Duration;

use crate::gait::library::{Action, GaitLibrary};

/// Tracks the currently active gait and where within its cycle the engine is.
///
/// `set_action` resets the cursor whenever the action changes; repeating the
/// same action is a no-op for the cursor. `tick` emits the keyframe at the
/// current cursor and advances it, except for `Stop`, which always re-emits
/// the single init keyframe without advancing.
pub struct GaitEngine {
    library: GaitLibrary,
    action: Action,
    cursor: usize,
    vision_pacing: bool,
}

impl GaitEngine {
    pub fn new(library: GaitLibrary) -> Self {
        Self {
            library,
            action: Action::Stop,
            cursor: 0,
            vision_pacing: false,
        }
    }

    /// Enable the slower pacing profile used when the vision pipeline is
    /// competing for CPU time alongside the control loop.
    pub fn set_vision_pacing(&mut self, enabled: bool) {
        self.vision_pacing = enabled;
    }

    pub fn current_action(&self) -> Action {
        self.action
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Switch the active action. Resets the cursor only if the action is
    /// actually changing.
    pub fn set_action(&mut self, action: Action) -> bool {
        if action == self.action {
            return false;
        }
        self.action = action;
        self.cursor = 0;
        true
    }

    /// Compute the keyframe for this tick and advance the cursor. Returns
    /// the keyframe to broadcast to the actuator bus.
    pub fn tick(&mut self) -> [f32; 12] {
        let gait = self.library.gait_for(self.action);
        let frame = gait[self.cursor];
        if self.action != Action::Stop {
            self.cursor = (self.cursor + 1) % gait.len();
        }
        frame
    }

    /// Pacing delay to sleep between ticks for the current action.
    pub fn recommended_delay(&self) -> Duration {
        if self.vision_pacing {
            return self.recommended_delay_vision();
        }
        match self.action {
            Action::SlideLeft | Action::SlideRight | Action::PivotLeft | Action::PivotRight => {
                Duration::from_millis(150)
            }
            Action::Forward | Action::Backward => Duration::from_millis(80),
            Action::Stop => Duration::from_millis(100),
        }
    }

    /// Slower pacing profile (200-250ms) used alongside the vision pipeline.
    pub fn recommended_delay_vision(&self) -> Duration {
        match self.action {
            Action::Stop => Duration::from_millis(200),
            _ => Duration::from_millis(250),
        }
    }

    /// Settling pause observed once, right after an action change, before
    /// the first emission under the new gait.
    pub fn settle_delay() -> Duration {
        Duration::from_millis(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gait::library::GaitLibrary;

    fn engine() -> GaitEngine {
        GaitEngine::new(GaitLibrary::build())
    }

    #[test]
    fn repeating_action_does_not_reset_cursor() {
        let mut e = engine();
        e.set_action(Action::Forward);
        e.tick();
        e.tick();
        let cursor_before = e.cursor();
        assert!(!e.set_action(Action::Forward));
        assert_eq!(e.cursor(), cursor_before);
    }

    #[test]
    fn changing_action_resets_cursor() {
        let mut e = engine();
        e.set_action(Action::Forward);
        e.tick();
        e.tick();
        assert!(e.set_action(Action::Backward));
        assert_eq!(e.cursor(), 0);
    }

    #[test]
    fn full_revolution_returns_cursor_to_zero() {
        let mut e = engine();
        e.set_action(Action::Forward);
        let len = e.library.gait_for(Action::Forward).len();
        for _ in 0..(3 * len) {
            e.tick();
        }
        assert_eq!(e.cursor(), 0);
    }

    #[test]
    fn stop_never_advances_cursor() {
        let mut e = engine();
        e.set_action(Action::Stop);
        for _ in 0..10 {
            let frame = e.tick();
            assert_eq!(frame, crate::gait::library::INIT_POSE);
            assert_eq!(e.cursor(), 0);
        }
    }

    #[test]
    fn tick_emits_twelve_clamped_values() {
        let mut e = engine();
        e.set_action(Action::PivotLeft);
        let frame = e.tick();
        assert_eq!(frame.len(), 12);
        for deg in frame {
            let raw = crate::gait::library::deg_to_raw(deg);
            assert!(raw <= 4095);
        }
    }
}
