//! Mock virtual gamepad for testing.
//!
//! This sink logs frames instead of handing them to a gamepad driver, and
//! records every submitted frame so tests can assert on the mapping output.
//! Clones share the same record.

use crate::backend::{BackendError, GamepadSink};
use crate::mapping::frame::{GamepadAxis, GamepadButton, GamepadSlider, VirtualControllerFrame};
use log::{debug, info};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug, Default)]
pub struct MockGamepadSink {
    name: String,
    pending: VirtualControllerFrame,
    submitted: Arc<Mutex<Vec<VirtualControllerFrame>>>,
}

impl MockGamepadSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Every frame submitted so far, oldest first
    pub fn submitted(&self) -> Vec<VirtualControllerFrame> {
        self.submitted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_submitted(&self) -> Option<VirtualControllerFrame> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl GamepadSink for MockGamepadSink {
    fn reset_frame(&mut self) {
        self.pending = VirtualControllerFrame::default();
    }

    fn set_button(&mut self, button: GamepadButton, pressed: bool) {
        if pressed {
            debug!("[MOCK PAD {}] Button {:?} DOWN", self.name, button);
        }
        self.pending.set_button(button, pressed);
    }

    fn set_axis(&mut self, axis: GamepadAxis, value: i16) {
        self.pending.set_axis(axis, value);
    }

    fn set_slider(&mut self, slider: GamepadSlider, value: u8) {
        self.pending.set_slider(slider, value);
    }

    fn submit(&mut self) -> Result<(), BackendError> {
        let frame = self.pending;
        info!(
            "[MOCK PAD {}] buttons={:04X} L=({}, {}) R=({}, {}) LT={} RT={}",
            self.name,
            frame.buttons,
            frame.left_x,
            frame.left_y,
            frame.right_x,
            frame.right_y,
            frame.left_trigger,
            frame.right_trigger
        );
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_sink_records_frames() {
        let mut sink = MockGamepadSink::new("p1");
        let observer = sink.clone();

        sink.reset_frame();
        sink.set_button(GamepadButton::A, true);
        sink.set_axis(GamepadAxis::LeftX, 1000);
        assert!(sink.submit().is_ok());

        let frame = observer.last_submitted().unwrap();
        assert!(frame.is_pressed(GamepadButton::A));
        assert_eq!(frame.left_x, 1000);
        assert_eq!(observer.submit_count(), 1);
    }

    #[test]
    fn test_reset_clears_pending() {
        let mut sink = MockGamepadSink::new("p1");
        sink.set_slider(GamepadSlider::RightTrigger, 200);
        sink.reset_frame();
        sink.submit().unwrap();

        assert!(sink.last_submitted().unwrap().is_neutral());
    }
}
