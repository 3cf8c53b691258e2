//! Session configuration.
//!
//! Everything here is fixed for the lifetime of a [`Session`](crate::Session);
//! in particular the dirty tracking granularity cannot change once windows
//! exist.

use std::time::Duration;

use ratatui::layout::Size;

use crate::constants::{
    CLICK_MAX_DISTANCE, CLICK_TIMEOUT, DOUBLE_CLICK_TIMEOUT, MAX_DRIVER_FAILURES, METRICS_HOLD,
    MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH, POLL_INTERVAL,
};
use crate::dirty::DirtyGranularity;
use crate::drivers::keyboard::KeyRepeat;
use crate::error::{DeskError, DeskResult};

#[derive(Debug, Clone, PartialEq)]
pub struct DeskConfig {
    pub granularity: DirtyGranularity,
    pub click_timeout: Duration,
    pub double_click_timeout: Duration,
    pub click_max_distance: u16,
    pub metrics_enabled: bool,
    pub metrics_hold: Duration,
    pub max_driver_failures: u32,
    pub poll_interval: Duration,
    pub min_window_size: Size,
    /// Applied by input drivers built with [`DeskConfig`].
    pub key_repeat: KeyRepeat,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            granularity: DirtyGranularity::Line,
            click_timeout: CLICK_TIMEOUT,
            double_click_timeout: DOUBLE_CLICK_TIMEOUT,
            click_max_distance: CLICK_MAX_DISTANCE,
            metrics_enabled: true,
            metrics_hold: METRICS_HOLD,
            max_driver_failures: MAX_DRIVER_FAILURES,
            poll_interval: POLL_INTERVAL,
            min_window_size: Size::new(MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT),
            key_repeat: KeyRepeat::default(),
        }
    }
}

impl DeskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_granularity(mut self, granularity: DirtyGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_click_timeout(mut self, timeout: Duration) -> Self {
        self.click_timeout = timeout;
        self
    }

    pub fn with_double_click_timeout(mut self, timeout: Duration) -> Self {
        self.double_click_timeout = timeout;
        self
    }

    pub fn with_click_max_distance(mut self, cells: u16) -> Self {
        self.click_max_distance = cells;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn with_metrics_hold(mut self, hold: Duration) -> Self {
        self.metrics_hold = hold;
        self
    }

    pub fn with_max_driver_failures(mut self, attempts: u32) -> Self {
        self.max_driver_failures = attempts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_min_window_size(mut self, size: Size) -> Self {
        self.min_window_size = size;
        self
    }

    pub fn with_key_repeat(mut self, repeat: KeyRepeat) -> Self {
        self.key_repeat = repeat;
        self
    }

    /// Reject settings the session cannot operate with.
    pub fn validate(&self) -> DeskResult<()> {
        if self.max_driver_failures == 0 {
            return Err(DeskError::InvalidConfig(
                "max_driver_failures must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(DeskError::InvalidConfig(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.min_window_size.width == 0 || self.min_window_size.height == 0 {
            return Err(DeskError::InvalidConfig(
                "min_window_size must be non-empty".to_string(),
            ));
        }
        if self.double_click_timeout.is_zero() {
            return Err(DeskError::InvalidConfig(
                "double_click_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
