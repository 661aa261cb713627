//! Constant per-motor keyframe tables and the amplitude transform.
//!
//! The raw degree values below are the canonical keyframe tables for this
//! hexapod's twelve motors (slot `i` drives motor id `i + 1`). They are
//! amplified around their per-motor mean at load time (see [`amplify`]) and
//! converted to raw actuator units with [`deg_to_raw`] on every tick.

/// One motion keyframe: a target angle in degrees for each of the 12 motors.
pub type Keyframe = [f32; 12];

/// A gait is a small, fixed, cyclic sequence of keyframes.
pub type Gait = Vec<Keyframe>;

/// Direction / command the gait engine can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Stop,
    Forward,
    Backward,
    SlideLeft,
    SlideRight,
    PivotLeft,
    PivotRight,
}

/// Amplitude factor applied to walking gaits.
pub const FACTOR_WALK: f32 = 2.0;
/// Amplitude factor applied to the lateral (slide) gaits.
pub const FACTOR_SLIDE: f32 = 1.2;
/// Amplitude factor applied to the pivot (turn) gaits.
pub const FACTOR_TURN: f32 = 1.0;

/// Neutral standing pose, also the single-keyframe `Stop` gait.
pub const INIT_POSE: Keyframe = [
    30.0, -30.0, -30.0, -30.0, 15.0, -30.0, -15.0, -30.0, -30.0, -30.0, 30.0, -30.0,
];

const SEQ_MOVE_F: [Keyframe; 12] = [
    [51.54, -40.0, -40.0, -10.0, 10.0, -10.0, -10.0, -10.0, -50.0, -10.0, 61.54, -20.0],
    [43.85, -20.0, -43.85, -10.0, 13.85, -10.0, -13.85, -10.0, -46.15, -10.0, 69.23, -30.0],
    [47.69, -10.0, -47.69, -10.0, 17.69, -10.0, -17.69, -10.0, -53.85, -20.0, 76.92, -40.0],
    [51.54, -10.0, -51.54, -10.0, 21.54, -10.0, -21.54, -10.0, -61.54, -30.0, 84.62, -20.0],
    [55.38, -10.0, -55.38, -10.0, 25.38, -10.0, -13.85, -20.0, -69.23, -40.0, 80.77, -10.0],
    [59.23, -10.0, -59.23, -10.0, 29.23, -10.0, -6.15, -30.0, -76.92, -20.0, 76.92, -10.0],
    [63.08, -10.0, -63.08, -10.0, 21.54, -20.0, 1.54, -40.0, -73.08, -10.0, 73.08, -10.0],
    [66.92, -10.0, -66.92, -10.0, 13.85, -30.0, 9.23, -20.0, -69.23, -10.0, 69.23, -10.0],
    [70.77, -10.0, -59.23, -20.0, 6.15, -40.0, 5.38, -10.0, -65.38, -10.0, 65.38, -10.0],
    [74.62, -10.0, -51.54, -30.0, -1.54, -20.0, 1.54, -10.0, -61.54, -10.0, 61.54, -10.0],
    [66.92, -20.0, -43.85, -40.0, 2.31, -10.0, -2.31, -10.0, -57.69, -10.0, 57.69, -10.0],
    [59.23, -30.0, -36.15, -20.0, 6.15, -10.0, -6.15, -10.0, -53.85, -10.0, 53.85, -10.0],
];

const SEQ_MOVE_B: [Keyframe; 12] = [
    [59.23, -30.0, -36.15, -20.0, 6.15, -10.0, -6.15, -10.0, -53.85, -10.0, 53.85, -10.0],
    [66.92, -20.0, -43.85, -40.0, 2.31, -10.0, -2.31, -10.0, -57.69, -10.0, 58.0, -10.0],
    [75.0, -10.0, -52.0, -30.0, -2.0, -20.0, 2.0, -10.0, -62.0, -10.0, 62.0, -10.0],
    [71.0, -10.0, -59.0, -20.0, 6.2, -40.0, 5.0, -10.0, -65.0, -10.0, 65.0, -10.0],
    [67.0, -10.0, -67.0, -10.0, 14.0, -30.0, 9.0, -20.0, -69.0, -10.0, 69.0, -10.0],
    [63.0, -10.0, -63.0, -10.0, 22.0, -20.0, 2.0, -40.0, -73.0, -10.0, 73.0, -10.0],
    [59.0, -10.0, -59.0, -10.0, 29.0, -10.0, -6.2, -30.0, -77.0, -20.0, 77.0, -10.0],
    [55.0, -10.0, -55.0, -10.0, 25.0, -10.0, -14.0, -20.0, -69.0, -40.0, 81.0, -10.0],
    [52.0, -10.0, -52.0, -10.0, 22.0, -10.0, -22.0, -10.0, -62.0, -30.0, 85.0, -20.0],
    [48.0, -10.0, -48.0, -10.0, 18.0, -10.0, -18.0, -10.0, -54.0, -20.0, 77.0, -40.0],
    [44.0, -20.0, -44.0, -10.0, 14.0, -10.0, -14.0, -10.0, -46.0, -10.0, 69.0, -30.0],
    [52.0, -40.0, -40.0, -10.0, 10.0, -10.0, -10.0, -10.0, -50.0, -10.0, 62.0, -20.0],
];

const SEQ_SLIDE_L: [Keyframe; 5] = [
    [40.0, -25.0, 0.0, -35.0, 8.0, -50.0, -8.0, -60.0, -40.0, -25.0, 0.0, -35.0],
    [-10.0, -50.0, 10.0, -20.0, 8.0, -30.0, -8.0, -20.0, 10.0, -50.0, -10.0, -20.0],
    [-10.0, -20.0, 10.0, -40.0, 8.0, -30.0, -8.0, -20.0, 10.0, -20.0, -10.0, -40.0],
    [-10.0, -20.0, -40.0, -40.0, 8.0, -30.0, -8.0, -20.0, 10.0, -20.0, 40.0, -40.0],
    [-10.0, -30.0, -60.0, -20.0, 8.0, -50.0, -8.0, -50.0, 10.0, -30.0, 60.0, -20.0],
];

const SEQ_SLIDE_R: [Keyframe; 5] = [
    [0.0, -35.0, -40.0, -25.0, 8.0, -60.0, -8.0, -50.0, 0.0, -35.0, 40.0, -25.0],
    [-10.0, -20.0, 10.0, -50.0, 8.0, -20.0, -8.0, -30.0, 10.0, -20.0, -10.0, -50.0],
    [-10.0, -40.0, 10.0, -20.0, 8.0, -20.0, -8.0, -30.0, 10.0, -40.0, -10.0, -20.0],
    [40.0, -40.0, 10.0, -20.0, 8.0, -20.0, -8.0, -30.0, -40.0, -40.0, -10.0, -20.0],
    [60.0, -20.0, 10.0, -30.0, 8.0, -50.0, -8.0, -50.0, -60.0, -20.0, -10.0, -30.0],
];

const SEQ_PIVOT_L: [Keyframe; 4] = [
    [55.0, -20.0, -55.0, -40.0, -7.0, -40.0, 7.0, -20.0, -35.0, -20.0, 35.0, -40.0],
    [70.0, -10.0, -70.0, -10.0, -22.0, -10.0, 22.0, -10.0, -20.0, -10.0, 20.0, -10.0],
    [55.29, -40.0, -55.29, -20.0, -7.29, -20.0, 7.29, -40.0, -34.71, -40.0, 34.71, -20.0],
    [40.0, -10.0, -40.0, -10.0, 8.0, -10.0, -8.0, -10.0, -50.0, -10.0, 50.0, -10.0],
];

const SEQ_PIVOT_R: [Keyframe; 4] = [
    [25.0, -20.0, -25.0, -40.0, 23.0, -40.0, -23.0, -20.0, -65.0, -20.0, 65.0, -40.0],
    [10.0, -10.0, -10.0, -10.0, 38.0, -10.0, -38.0, -10.0, -80.0, -10.0, 80.0, -10.0],
    [25.29, -40.0, -25.29, -20.0, 22.71, -20.0, -22.71, -40.0, -64.71, -40.0, 64.71, -20.0],
    [40.0, -10.0, -40.0, -10.0, 8.0, -10.0, -8.0, -10.0, -50.0, -10.0, 50.0, -10.0],
];

/// Convert a signed degree angle to a raw actuator position, clamped to the
/// valid `0..=4095` range. `2048` is the servo's neutral position; one full
/// turn spans 4096 raw units.
pub fn deg_to_raw(deg: f32) -> u32 {
    let raw = (2048.0 + deg * (4095.0 / 360.0)).round();
    raw.clamp(0.0, 4095.0) as u32
}

/// Scale a gait's keyframes around each motor's per-keyframe mean by `factor`.
/// `factor == 1.0` is the identity transform; the mean of the result equals
/// the mean of the input, column-wise.
pub fn amplify(sequence: &[Keyframe], factor: f32) -> Gait {
    let n = sequence.len() as f32;
    let mut means = [0.0f32; 12];
    for step in sequence {
        for (m, v) in means.iter_mut().zip(step.iter()) {
            *m += v / n;
        }
    }

    sequence
        .iter()
        .map(|step| {
            let mut out: Keyframe = [0.0; 12];
            for (i, v) in step.iter().enumerate() {
                out[i] = means[i] + (v - means[i]) * factor;
            }
            out
        })
        .collect()
}

/// The full set of effective (amplified) gaits, computed once at startup.
#[derive(Debug, Clone)]
pub struct GaitLibrary {
    pub forward: Gait,
    pub backward: Gait,
    pub slide_left: Gait,
    pub slide_right: Gait,
    pub pivot_left: Gait,
    pub pivot_right: Gait,
    pub init: Gait,
}

impl GaitLibrary {
    /// Build the effective gait tables by amplifying the constant source
    /// sequences with their respective factors.
    pub fn build() -> Self {
        Self {
            forward: amplify(&SEQ_MOVE_F, FACTOR_WALK),
            backward: amplify(&SEQ_MOVE_B, FACTOR_WALK),
            slide_left: amplify(&SEQ_SLIDE_L, FACTOR_SLIDE),
            slide_right: amplify(&SEQ_SLIDE_R, FACTOR_SLIDE),
            pivot_left: amplify(&SEQ_PIVOT_L, FACTOR_TURN),
            pivot_right: amplify(&SEQ_PIVOT_R, FACTOR_TURN),
            init: vec![INIT_POSE],
        }
    }

    /// Look up the effective gait for an action. `Stop` maps to the
    /// single-keyframe init pose.
    pub fn gait_for(&self, action: Action) -> &Gait {
        match action {
            Action::Stop => &self.init,
            Action::Forward => &self.forward,
            Action::Backward => &self.backward,
            Action::SlideLeft => &self.slide_left,
            Action::SlideRight => &self.slide_right,
            Action::PivotLeft => &self.pivot_left,
            Action::PivotRight => &self.pivot_right,
        }
    }
}

impl Default for GaitLibrary {
    fn default() -> Self {
        Self::build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deg_to_raw_in_bounds_for_full_range() {
        let mut deg = -180.0;
        while deg <= 180.0 {
            let raw = deg_to_raw(deg);
            assert!(raw <= 4095);
            deg += 5.0;
        }
    }

    #[test]
    fn deg_to_raw_neutral_is_2048() {
        assert_eq!(deg_to_raw(0.0), 2048);
    }

    #[test]
    fn deg_to_raw_matches_reference_formula() {
        // 30 degrees: round(2048 + 30 * 4095/360) = round(2389.25) = 2389
        assert_eq!(deg_to_raw(30.0), 2389);
    }

    #[test]
    fn amplify_identity_at_factor_one() {
        let amplified = amplify(&SEQ_MOVE_F, 1.0);
        for (orig, amp) in SEQ_MOVE_F.iter().zip(amplified.iter()) {
            for (o, a) in orig.iter().zip(amp.iter()) {
                assert!((o - a).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn amplify_preserves_column_means() {
        for factor in [0.5, 1.0, 1.2, 2.0] {
            let amplified = amplify(&SEQ_MOVE_F, factor);
            for col in 0..12 {
                let orig_mean: f32 =
                    SEQ_MOVE_F.iter().map(|s| s[col]).sum::<f32>() / SEQ_MOVE_F.len() as f32;
                let amp_mean: f32 =
                    amplified.iter().map(|s| s[col]).sum::<f32>() / amplified.len() as f32;
                assert!((orig_mean - amp_mean).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn amplify_round_trip_recovers_original() {
        let amplified = amplify(&SEQ_SLIDE_L, 1.2);
        let round_tripped = amplify(&amplified, 1.0 / 1.2);
        for (orig, rt) in SEQ_SLIDE_L.iter().zip(round_tripped.iter()) {
            for (o, r) in orig.iter().zip(rt.iter()) {
                assert!((o - r).abs() < 1e-2);
            }
        }
    }

    #[test]
    fn gait_library_lengths_match_source_tables() {
        let lib = GaitLibrary::build();
        assert_eq!(lib.forward.len(), 12);
        assert_eq!(lib.backward.len(), 12);
        assert_eq!(lib.slide_left.len(), 5);
        assert_eq!(lib.slide_right.len(), 5);
        assert_eq!(lib.pivot_left.len(), 4);
        assert_eq!(lib.pivot_right.len(), 4);
        assert_eq!(lib.init.len(), 1);
    }
}
