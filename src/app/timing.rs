use std::time::{Duration, Instant};

const FIRST_FRAME: Duration = Duration::from_millis(16);
const FPS_WINDOW_SECS: f64 = 0.5;

/// Wall-clock frame delta plus a rolling frame rate for logging.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Option<Instant>,
    frame_count: u32,
    pub frame_dt: f64,
    fps: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTiming {
    pub fn new() -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: None,
            frame_count: 0,
            frame_dt: FIRST_FRAME.as_secs_f64(),
            fps: 0.0,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Returns the delta since the previous call, in seconds.
    pub fn update(&mut self, now: Instant) -> f64 {
        let dt_duration = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => FIRST_FRAME,
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f64().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let window_start = *self.last_fps_time.get_or_insert(now);
        let elapsed = now.saturating_duration_since(window_start).as_secs_f64();
        if elapsed >= FPS_WINDOW_SECS {
            self.fps = self.frame_count as f64 / elapsed;
            log::trace!("{:.1} fps (frame {:.2} ms)", self.fps, self.frame_dt * 1000.0);
            self.frame_count = 0;
            self.last_fps_time = Some(now);
        }
        self.frame_dt
    }
}
