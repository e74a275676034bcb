use std::time::{Duration, Instant};

/// Frame timing snapshot handed to the update phase.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped seconds since the previous tick.
    pub dt: f32,

    /// Seconds since the clock started, sum of clamped deltas.
    pub elapsed: f64,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Ticks before this one.
    pub frame_number: u64,

    /// Exponentially smoothed frames per second.
    pub fps: f32,
}

/// Produces [`FrameTime`] snapshots for one frame loop.
///
/// Delta time is clamped so a debugger pause or a long stall does not push
/// a huge step into the simulation.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_number: u64,
    elapsed: f64,
    fps: f32,
    dt_min: Duration,
    dt_max: Duration,
}

/// Weight of the newest sample in the fps average.
const FPS_SMOOTHING: f32 = 0.1;

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self::starting_at(Instant::now(), dt_min, dt_max)
    }

    fn starting_at(start: Instant, dt_min: Duration, dt_max: Duration) -> Self {
        Self {
            last: start,
            frame_number: 0,
            elapsed: 0.0,
            fps: 0.0,
            dt_min,
            dt_max,
        }
    }

    /// Moves the baseline to now without producing a frame.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock as if the tick happened at `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max)
            .as_secs_f32();
        self.last = now;
        self.elapsed += dt as f64;

        let instant_fps = 1.0 / dt;
        self.fps = if self.frame_number == 0 {
            instant_fps
        } else {
            self.fps + (instant_fps - self.fps) * FPS_SMOOTHING
        };

        let time = FrameTime {
            dt,
            elapsed: self.elapsed,
            now,
            frame_number: self.frame_number,
            fps: self.fps,
        };
        self.frame_number = self.frame_number.wrapping_add(1);
        time
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
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

    fn clock(start: Instant) -> FrameClock {
        FrameClock::starting_at(start, Duration::from_millis(1), Duration::from_millis(100))
    }

    #[test]
    fn long_stall_is_clamped() {
        let start = Instant::now();
        let mut c = clock(start);
        let t = c.tick_at(start + Duration::from_secs(5));
        assert!((t.dt - 0.1).abs() < 1e-6);
        assert!((t.elapsed - 0.1).abs() < 1e-6);
    }

    #[test]
    fn zero_delta_is_raised_to_minimum() {
        let start = Instant::now();
        let mut c = clock(start);
        let t = c.tick_at(start);
        assert!((t.dt - 0.001).abs() < 1e-6);
    }

    #[test]
    fn fps_converges_to_steady_rate() {
        let start = Instant::now();
        let mut c = clock(start);
        let mut now = start;
        let mut last = c.tick_at(now);
        for _ in 0..200 {
            now += Duration::from_millis(20);
            last = c.tick_at(now);
        }
        assert!((last.fps - 50.0).abs() < 0.5, "{}", last.fps);
        assert_eq!(last.frame_number, 200);
    }
}
