use std::time::{Duration, Instant};

/// Frame timing and damage counters. Purely observational.
#[derive(Debug, Clone)]
pub struct FrameMetrics {
    hold: Duration,
    frames: u64,
    last_frame: Duration,
    fps: f64,
    dirty_cells: usize,
    held_dirty_cells: usize,
    held_at: Option<Instant>,
    last_frame_at: Option<Instant>,
}

impl FrameMetrics {
    /// `hold` is how long [`held_dirty_cells`](Self::held_dirty_cells) keeps
    /// reporting the last non-zero count after frames go quiet.
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            frames: 0,
            last_frame: Duration::ZERO,
            fps: 0.0,
            dirty_cells: 0,
            held_dirty_cells: 0,
            held_at: None,
            last_frame_at: None,
        }
    }

    pub(crate) fn record(&mut self, now: Instant, elapsed: Duration, dirty_cells: usize) {
        self.frames += 1;
        self.last_frame = elapsed;
        if let Some(prev) = self.last_frame_at {
            let gap = now.saturating_duration_since(prev).as_secs_f64();
            if gap > 0.0 {
                let instant = 1.0 / gap;
                // Exponential smoothing so one slow frame doesn't dominate.
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps * 0.9 + instant * 0.1
                };
            }
        }
        self.last_frame_at = Some(now);

        self.dirty_cells = dirty_cells;
        if dirty_cells > 0 {
            self.held_dirty_cells = dirty_cells;
            self.held_at = Some(now);
        } else if self
            .held_at
            .is_none_or(|at| now.saturating_duration_since(at) > self.hold)
        {
            self.held_dirty_cells = 0;
            self.held_at = None;
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Duration {
        self.last_frame
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Cells written by the most recent frame.
    pub fn dirty_cells(&self) -> usize {
        self.dirty_cells
    }

    pub fn held_dirty_cells(&self) -> usize {
        self.held_dirty_cells
    }
}
