//! Loop pacing.
//!
//! Best-effort frame-rate limiting: sleep away whatever is left of the
//! target frame time after an iteration. No drift correction; under load
//! the loop simply runs slower.

use std::time::{Duration, Instant};

/// Throttles the capture-process-render loop to a target rate.
#[derive(Clone, Copy, Debug)]
pub struct PacingController {
    frame_time: Duration,
}

impl PacingController {
    pub fn new(target_fps: u32) -> Self {
        let fps = target_fps.max(1);
        Self {
            frame_time: Duration::from_secs_f64(1.0 / fps as f64),
        }
    }

    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }

    /// Remaining sleep budget for an iteration that took `elapsed`.
    /// Saturates at zero; never a negative duration.
    pub fn sleep_budget(&self, elapsed: Duration) -> Duration {
        self.frame_time.saturating_sub(elapsed)
    }

    /// Sleep out the rest of the frame time for an iteration started at
    /// `iteration_start`.
    pub fn pace(&self, iteration_start: Instant) {
        let budget = self.sleep_budget(iteration_start.elapsed());
        if !budget.is_zero() {
            std::thread::sleep(budget);
        }
    }
}

/// Instantaneous display rate from the inter-frame interval.
#[derive(Debug, Default)]
pub struct FpsCounter {
    last_display: Option<Instant>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a displayed frame and return the rate implied by the interval
    /// since the previous one (0.0 for the first frame).
    pub fn tick(&mut self, now: Instant) -> f32 {
        let fps = match self.last_display {
            Some(prev) => {
                let dt = now.saturating_duration_since(prev).as_secs_f32();
                if dt > 0.0 {
                    1.0 / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_display = Some(now);
        fps
    }
}
