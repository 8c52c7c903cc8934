// src/time.rs
//! Fixed timestep accumulator for the physics driver.

/// Turns variable frame deltas into a whole number of fixed steps plus a blend factor.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    accumulator: f32,
    fixed_dt: f32,
    max_steps: u32,
}

impl FixedTimestep {
    pub fn new(fixed_dt: f32, max_steps: u32) -> Self {
        Self {
            accumulator: 0.0,
            fixed_dt,
            max_steps: max_steps.max(1),
        }
    }

    #[inline(always)]
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Adds `frame_dt` and returns how many fixed steps are due.
    ///
    /// Time beyond `max_steps` steps is dropped so a long stall can't spiral.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if frame_dt.is_finite() && frame_dt > 0.0 {
            self.accumulator += frame_dt;
        }
        let mut steps = 0;
        while self.accumulator >= self.fixed_dt && steps < self.max_steps {
            self.accumulator -= self.fixed_dt;
            steps += 1;
        }
        if steps == self.max_steps && self.accumulator >= self.fixed_dt {
            log::debug!(
                "physics fell behind, dropping {:.4}s",
                self.accumulator - self.accumulator % self.fixed_dt
            );
            self.accumulator %= self.fixed_dt;
        }
        steps
    }

    /// Leftover fraction of a step, in [0, 1).
    #[inline(always)]
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.fixed_dt).clamp(0.0, 1.0)
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_partial_frames() {
        let mut ts = FixedTimestep::new(0.5, 4);
        assert_eq!(ts.advance(0.25), 0);
        assert!((ts.alpha() - 0.5).abs() < 1e-6);
        assert_eq!(ts.advance(0.5), 1);
        assert!((ts.alpha() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn caps_catch_up_steps() {
        let mut ts = FixedTimestep::new(0.5, 2);
        assert_eq!(ts.advance(10.25), 2);
        assert!(ts.alpha() < 1.0);
        assert_eq!(ts.advance(0.0), 0);
    }

    #[test]
    fn ignores_bad_deltas() {
        let mut ts = FixedTimestep::new(0.5, 2);
        assert_eq!(ts.advance(-1.0), 0);
        assert_eq!(ts.advance(f32::NAN), 0);
        assert_eq!(ts.alpha(), 0.0);
    }
}
