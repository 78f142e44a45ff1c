use instant::Instant;

/// Longest step handed to the renderer after a stalled frame.
pub const MAX_FRAME_SECONDS: f32 = 0.25;

#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    elapsed: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            elapsed: 0.0,
        }
    }

    /// Seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.elapsed += f64::from(delta);
        delta.min(MAX_FRAME_SECONDS)
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.last_frame = Instant::now();
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_non_negative_and_capped() {
        let mut clock = FrameClock::new();
        let first = clock.tick();
        assert!((0.0..=MAX_FRAME_SECONDS).contains(&first));
        assert!(clock.elapsed() >= 0.0);
    }
}
