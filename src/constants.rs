//! Shared crate-wide constants.

use std::time::Duration;

/// Smallest width a window may be resized to when it does not declare its
/// own minimum. Leaves room for both borders and a few title cells.
pub const MIN_WINDOW_WIDTH: u16 = 6;

/// Smallest height a window may be resized to when it does not declare its
/// own minimum: top border, header row, bottom border.
pub const MIN_WINDOW_HEIGHT: u16 = 3;

/// Longest press (down to up) that still counts as a click.
pub const CLICK_TIMEOUT: Duration = Duration::from_millis(500);

/// Two clicks on the same control closer together than this form a
/// double click.
pub const DOUBLE_CLICK_TIMEOUT: Duration = Duration::from_millis(400);

/// Maximum pointer travel, in cells on either axis, between press and
/// release for the pair to still count as a click.
pub const CLICK_MAX_DISTANCE: u16 = 1;

/// How long the metrics keep showing the last non-zero dirty cell count
/// after frames go quiet.
pub const METRICS_HOLD: Duration = Duration::from_secs(1);

/// Consecutive failed frames tolerated before the error reaches the host.
pub const MAX_DRIVER_FAILURES: u32 = 3;

/// Default input poll interval of the render loop (~60 fps).
pub const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Upper bound on buffered log lines kept by the in-memory log sink.
pub const LOG_BUFFER_LINES: usize = 2000;
