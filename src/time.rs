//! Wall-clock frame timing.
//!
//! Scenes advance their simulations by the fixed [`FRAME_DT`](crate::scene::FRAME_DT)
//! so results do not depend on frame pacing. [`Time`] measures what actually
//! happened: a smoothed FPS figure for debug output and
//! [`FrameStats`](crate::render_loop::FrameStats).
//!
//! ```ignore
//! let mut time = Time::new();
//! loop {
//!     time.update();
//!     log::trace!("{:.1} fps", time.fps());
//! }
//! ```

use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_millis(500);

/// Frame clock.
#[derive(Debug, Clone)]
pub struct Time {
    last_frame: Instant,
    /// Last computed FPS, refreshed every `fps_window`.
    fps: f32,
    fps_window: Duration,
    window_start: Instant,
    window_frames: u64,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            fps: 0.0,
            fps_window: FPS_WINDOW,
            window_start: now,
            window_frames: 0,
        }
    }

    /// Record one frame. Returns the delta in seconds.
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.window_frames += 1;

        let window = now.duration_since(self.window_start);
        if window >= self.fps_window {
            self.fps = self.window_frames as f32 / window.as_secs_f32();
            self.window_frames = 0;
            self.window_start = now;
        }

        delta
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_time_new() {
        let time = Time::new();
        assert_eq!(time.fps(), 0.0);
    }

    #[test]
    fn test_update_returns_delta() {
        let mut time = Time::new();
        thread::sleep(Duration::from_millis(5));
        assert!(time.update() > 0.0);
    }

    #[test]
    fn test_fps_after_window() {
        let mut time = Time {
            fps_window: Duration::from_millis(20),
            ..Time::new()
        };
        for _ in 0..4 {
            thread::sleep(Duration::from_millis(10));
            time.update();
        }
        assert!(time.fps() > 0.0);
    }

    #[test]
    fn test_fps_holds_until_window_elapses() {
        let mut time = Time::new();
        time.update();
        time.update();
        assert_eq!(time.fps(), 0.0);
    }
}
