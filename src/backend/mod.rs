//! Backend abstraction for the device transport and the virtual gamepad
//!
//! The core never talks to an OS API directly. Raw report frames come and go
//! through a `Transport`, and mapped frames leave through a `GamepadSink`.
//! Mock implementations of both live here for tests and the offline inspector.

pub mod mock_sink;
pub mod mock_transport;

pub use mock_sink::MockGamepadSink;
pub use mock_transport::{MockTransport, MockTransportOpener};

use crate::mapping::frame::{GamepadAxis, GamepadButton, GamepadSlider};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend operation failed: {0}")]
    Operation(String),

    #[error("Virtual gamepad unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to open device '{device}': {reason}")]
    Open { device: String, reason: String },

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Frame of {len} bytes is shorter than the {frame_len}-byte output report")]
    ShortFrame { len: usize, frame_len: usize },

    #[error("Transport closed")]
    Closed,
}

/// Result of a bounded read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were written into the buffer
    Data(usize),

    /// Nothing arrived before the timeout; not an error
    Timeout,
}

/// An open raw-report channel to one device.
///
/// `read` and `write` may be called concurrently from different threads; a
/// single `write` call is one atomic framed write.
pub trait Transport: Send + Sync {
    /// Block until a report arrives or `timeout` elapses
    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<ReadOutcome, TransportError>;

    /// Write one full output frame
    fn write(&self, frame: &[u8]) -> Result<(), TransportError>;

    fn max_input_report_len(&self) -> usize;

    fn max_output_report_len(&self) -> usize;

    /// Release the handle; pending and later reads should fail promptly
    fn close(&self) {}
}

/// Opens transports for device references handed out by discovery
pub trait TransportOpener {
    fn open(&self, device_ref: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Unified backend interface for the virtual gamepad driver.
///
/// The mapping engine calls `reset_frame`, then the setters, then `submit`,
/// once per device state change.
pub trait GamepadSink: Send {
    fn reset_frame(&mut self);

    fn set_button(&mut self, button: GamepadButton, pressed: bool);

    fn set_axis(&mut self, axis: GamepadAxis, value: i16);

    fn set_slider(&mut self, slider: GamepadSlider, value: u8);

    fn submit(&mut self) -> Result<(), BackendError>;
}

impl<S: GamepadSink + ?Sized> GamepadSink for Box<S> {
    fn reset_frame(&mut self) {
        (**self).reset_frame()
    }

    fn set_button(&mut self, button: GamepadButton, pressed: bool) {
        (**self).set_button(button, pressed)
    }

    fn set_axis(&mut self, axis: GamepadAxis, value: i16) {
        (**self).set_axis(axis, value)
    }

    fn set_slider(&mut self, slider: GamepadSlider, value: u8) {
        (**self).set_slider(slider, value)
    }

    fn submit(&mut self) -> Result<(), BackendError> {
        (**self).submit()
    }
}
