//! Error types.
//!
//! Only driver failures and invalid configuration travel across subsystem
//! boundaries as errors. Policy rejections (closing a window that is not
//! closable, focusing a disabled control, ...) are reported through status
//! values instead.

use std::io;

use thiserror::Error;

pub type DeskResult<T> = Result<T, DeskError>;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("driver i/o error: {0}")]
    Driver(#[from] io::Error),
    #[error("driver failed {attempts} consecutive frames: {source}")]
    DriverFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a control while rendering. The compositor contains
/// it to the failing control and draws a placeholder instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("control failed to render: {0}")]
    Render(String),
    #[error("control panicked while rendering: {0}")]
    Panicked(String),
}

impl ControlError {
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_into_driver_errors() {
        let err: DeskError = io::Error::other("pipe closed").into();
        assert!(matches!(err, DeskError::Driver(_)));
        assert_eq!(err.to_string(), "driver i/o error: pipe closed");
    }

    #[test]
    fn driver_failed_keeps_source() {
        use std::error::Error as _;
        let err = DeskError::DriverFailed {
            attempts: 3,
            source: io::Error::other("gone"),
        };
        assert!(err.to_string().contains("3 consecutive"));
        assert!(err.source().is_some());
    }
}
