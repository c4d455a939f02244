//! Fixed timestep accumulator.
//!
//! Real frame deltas are accumulated and drained in whole `dt` steps, so the
//! simulation rate never depends on the display rate. A partial step stays in
//! the accumulator and becomes the render interpolation factor.

/// Accumulates variable frame time into fixed steps.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            accumulator: 0.0,
        }
    }

    /// Adds `delta` seconds and returns how many whole steps are now due.
    ///
    /// Non-positive deltas (clock hiccups) are ignored.
    pub fn advance(&mut self, delta: f32) -> u32 {
        if delta <= 0.0 {
            return 0;
        }
        self.accumulator += delta;
        let mut steps = 0;
        while self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            steps += 1;
        }
        steps
    }

    /// Fraction of a step left over, in [0, 1).
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_whole_steps_only() {
        let mut ts = FixedTimestep::new(0.01);
        assert_eq!(ts.advance(0.025), 2);
        assert!((ts.alpha() - 0.5).abs() < 1e-3);
        assert_eq!(ts.advance(0.004), 0);
        assert_eq!(ts.advance(0.002), 1);
    }

    #[test]
    fn ignores_non_positive_delta() {
        let mut ts = FixedTimestep::new(0.01);
        assert_eq!(ts.advance(0.0), 0);
        assert_eq!(ts.advance(-1.0), 0);
        assert_eq!(ts.alpha(), 0.0);
    }
}
