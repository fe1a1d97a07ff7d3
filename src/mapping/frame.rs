//! Virtual controller frame
//!
//! The output of the mapping engine in the sink's native ranges: an
//! XInput-style 16-bit button word, four signed 16-bit stick axes and two
//! 8-bit trigger sliders.

use crate::backend::{BackendError, GamepadSink};
use serde::{Deserialize, Serialize};

/// Digital buttons exposed by the virtual gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Start,
    Back,
    Guide,
    LeftThumb,
    RightThumb,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl GamepadButton {
    pub const ALL: [GamepadButton; 15] = [
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
        GamepadButton::LeftShoulder,
        GamepadButton::RightShoulder,
        GamepadButton::Start,
        GamepadButton::Back,
        GamepadButton::Guide,
        GamepadButton::LeftThumb,
        GamepadButton::RightThumb,
        GamepadButton::DPadUp,
        GamepadButton::DPadDown,
        GamepadButton::DPadLeft,
        GamepadButton::DPadRight,
    ];

    /// XInput button bit
    pub const fn mask(self) -> u16 {
        match self {
            GamepadButton::DPadUp => 0x0001,
            GamepadButton::DPadDown => 0x0002,
            GamepadButton::DPadLeft => 0x0004,
            GamepadButton::DPadRight => 0x0008,
            GamepadButton::Start => 0x0010,
            GamepadButton::Back => 0x0020,
            GamepadButton::LeftThumb => 0x0040,
            GamepadButton::RightThumb => 0x0080,
            GamepadButton::LeftShoulder => 0x0100,
            GamepadButton::RightShoulder => 0x0200,
            GamepadButton::Guide => 0x0400,
            GamepadButton::A => 0x1000,
            GamepadButton::B => 0x2000,
            GamepadButton::X => 0x4000,
            GamepadButton::Y => 0x8000,
        }
    }
}

/// Signed stick axes (-32768..=32767)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamepadAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl GamepadAxis {
    pub const ALL: [GamepadAxis; 4] = [
        GamepadAxis::LeftX,
        GamepadAxis::LeftY,
        GamepadAxis::RightX,
        GamepadAxis::RightY,
    ];
}

/// Trigger sliders (0..=255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamepadSlider {
    LeftTrigger,
    RightTrigger,
}

impl GamepadSlider {
    pub const ALL: [GamepadSlider; 2] = [GamepadSlider::LeftTrigger, GamepadSlider::RightTrigger];
}

/// One snapshot of the virtual gamepad
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualControllerFrame {
    pub buttons: u16,
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

impl VirtualControllerFrame {
    pub fn is_pressed(&self, button: GamepadButton) -> bool {
        (self.buttons & button.mask()) != 0
    }

    pub fn set_button(&mut self, button: GamepadButton, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
    }

    pub fn axis(&self, axis: GamepadAxis) -> i16 {
        match axis {
            GamepadAxis::LeftX => self.left_x,
            GamepadAxis::LeftY => self.left_y,
            GamepadAxis::RightX => self.right_x,
            GamepadAxis::RightY => self.right_y,
        }
    }

    pub fn set_axis(&mut self, axis: GamepadAxis, value: i16) {
        match axis {
            GamepadAxis::LeftX => self.left_x = value,
            GamepadAxis::LeftY => self.left_y = value,
            GamepadAxis::RightX => self.right_x = value,
            GamepadAxis::RightY => self.right_y = value,
        }
    }

    pub fn slider(&self, slider: GamepadSlider) -> u8 {
        match slider {
            GamepadSlider::LeftTrigger => self.left_trigger,
            GamepadSlider::RightTrigger => self.right_trigger,
        }
    }

    pub fn set_slider(&mut self, slider: GamepadSlider, value: u8) {
        match slider {
            GamepadSlider::LeftTrigger => self.left_trigger = value,
            GamepadSlider::RightTrigger => self.right_trigger = value,
        }
    }

    /// No buttons held, sticks centred, triggers released
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Push this frame through `sink`: reset, every setter, then submit
    pub fn submit_to<S: GamepadSink + ?Sized>(&self, sink: &mut S) -> Result<(), BackendError> {
        sink.reset_frame();

        for button in GamepadButton::ALL {
            sink.set_button(button, self.is_pressed(button));
        }
        for axis in GamepadAxis::ALL {
            sink.set_axis(axis, self.axis(axis));
        }
        for slider in GamepadSlider::ALL {
            sink.set_slider(slider, self.slider(slider));
        }

        sink.submit()
    }
}
