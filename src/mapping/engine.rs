//! Mapping engine
//!
//! Turns a merged `DeviceState` into a `VirtualControllerFrame` using the
//! active profile, then hands it to a sink. The binding strategy is resolved
//! once when the engine is built for a profile.

use crate::backend::{BackendError, GamepadSink};
use crate::mapping::frame::{GamepadAxis, GamepadSlider, VirtualControllerFrame};
use crate::mapping::profile::{
    AccelTarget, AccelerometerMapping, GamepadTarget, MappingProfile, ProfileTemplate,
    TargetOutput,
};
use crate::wiimote::types::{Accelerometer, Buttons, DeviceButton, DeviceState};
use log::{debug, info};

/// Tilt (in g) that produces full deflection before sensitivity is applied
pub const MAX_TILT_G: f32 = 0.5;

/// Profiles whose buttons follow a hard-coded layout instead of their table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedLayoutId {
    RocketLeague,
}

impl FixedLayoutId {
    /// Fixed layouts are tied to the built-in profile of the same name
    pub fn for_profile(profile: &MappingProfile) -> Option<Self> {
        if profile.name == ProfileTemplate::RocketLeague.name() {
            Some(FixedLayoutId::RocketLeague)
        } else {
            None
        }
    }

    fn bindings(self) -> &'static [(GamepadTarget, DeviceButton)] {
        match self {
            FixedLayoutId::RocketLeague => &[
                (GamepadTarget::RightTrigger, DeviceButton::Two),
                (GamepadTarget::A, DeviceButton::One),
                (GamepadTarget::B, DeviceButton::B),
                (GamepadTarget::LeftTrigger, DeviceButton::A),
                (GamepadTarget::Start, DeviceButton::Plus),
                (GamepadTarget::Back, DeviceButton::Minus),
                (GamepadTarget::Guide, DeviceButton::Home),
                (GamepadTarget::DPadUp, DeviceButton::DPadUp),
                (GamepadTarget::DPadDown, DeviceButton::DPadDown),
                (GamepadTarget::DPadLeft, DeviceButton::DPadLeft),
                (GamepadTarget::DPadRight, DeviceButton::DPadRight),
            ],
        }
    }
}

/// How device buttons become gamepad buttons for one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingStrategy {
    /// Walk the profile's binding table
    GenericTable,
    /// Ignore the table and use a hard-coded layout
    FixedLayout(FixedLayoutId),
}

impl MappingStrategy {
    pub fn resolve(profile: &MappingProfile) -> Self {
        match FixedLayoutId::for_profile(profile) {
            Some(layout) => MappingStrategy::FixedLayout(layout),
            None => MappingStrategy::GenericTable,
        }
    }
}

/// Maps device state through one profile
#[derive(Debug, Clone)]
pub struct MappingEngine {
    profile: MappingProfile,
    strategy: MappingStrategy,
}

impl MappingEngine {
    pub fn new(profile: MappingProfile) -> Self {
        let strategy = MappingStrategy::resolve(&profile);
        info!("Mapping engine using profile '{}' ({:?})", profile.name, strategy);
        Self { profile, strategy }
    }

    pub fn profile(&self) -> &MappingProfile {
        &self.profile
    }

    pub fn strategy(&self) -> MappingStrategy {
        self.strategy
    }

    /// Compute the frame for `state`
    pub fn map(&self, state: &DeviceState) -> VirtualControllerFrame {
        let mut frame = VirtualControllerFrame::default();

        match self.strategy {
            MappingStrategy::GenericTable => {
                let table = self.profile.buttons.iter().map(|(t, b)| (*t, *b));
                apply_bindings(&mut frame, state.buttons, table);
            }
            MappingStrategy::FixedLayout(layout) => {
                apply_bindings(&mut frame, state.buttons, layout.bindings().iter().copied());
            }
        }

        let accel = &self.profile.accelerometer;
        if accel.enabled {
            apply_accelerometer(&mut frame, &state.accelerometer, accel);
        }

        frame
    }

    /// Map `state` and push the frame through the device's sink
    pub fn submit<S: GamepadSink + ?Sized>(
        &self,
        state: &DeviceState,
        sink: &mut S,
    ) -> Result<VirtualControllerFrame, BackendError> {
        let frame = self.map(state);
        frame.submit_to(sink)?;
        Ok(frame)
    }
}

fn apply_bindings(
    frame: &mut VirtualControllerFrame,
    buttons: Buttons,
    table: impl Iterator<Item = (GamepadTarget, DeviceButton)>,
) {
    for (target, button) in table {
        if !buttons.is_pressed(button) {
            continue;
        }
        match target.output() {
            TargetOutput::Button(pad_button) => frame.set_button(pad_button, true),
            TargetOutput::Slider(slider) => frame.set_slider(slider, u8::MAX),
        }
    }
}

/// Steering comes from Y and pitch from Z (upright wheel grip)
fn apply_accelerometer(
    frame: &mut VirtualControllerFrame,
    accel: &Accelerometer,
    mapping: &AccelerometerMapping,
) {
    let steering = shape_axis(accel.y, mapping);
    let pitch = shape_axis(accel.z, mapping);
    debug!("Tilt steering={:.3} pitch={:.3}", steering, pitch);

    match mapping.target {
        AccelTarget::LeftStick => {
            frame.set_axis(GamepadAxis::LeftX, to_stick(steering));
            frame.set_axis(GamepadAxis::LeftY, to_stick(pitch));
        }
        AccelTarget::RightStick => {
            frame.set_axis(GamepadAxis::RightX, to_stick(steering));
            frame.set_axis(GamepadAxis::RightY, to_stick(pitch));
        }
        AccelTarget::LeftStickX => frame.set_axis(GamepadAxis::LeftX, to_stick(steering)),
        AccelTarget::LeftStickY => frame.set_axis(GamepadAxis::LeftY, to_stick(pitch)),
        AccelTarget::RightStickX => frame.set_axis(GamepadAxis::RightX, to_stick(steering)),
        AccelTarget::RightStickY => frame.set_axis(GamepadAxis::RightY, to_stick(pitch)),
        AccelTarget::LeftTrigger => press_slider(frame, GamepadSlider::LeftTrigger, pitch),
        AccelTarget::RightTrigger => press_slider(frame, GamepadSlider::RightTrigger, pitch),
    }
}

/// Analog trigger never releases a digitally held one
fn press_slider(frame: &mut VirtualControllerFrame, slider: GamepadSlider, value: f32) {
    let analog = to_slider(value);
    if analog > frame.slider(slider) {
        frame.set_slider(slider, analog);
    }
}

/// Zero out magnitudes at or below the dead zone
pub fn apply_dead_zone(value: f32, dead_zone: f32) -> f32 {
    if value.abs() <= dead_zone {
        0.0
    } else {
        value
    }
}

/// Normalise, scale, dead-zone, clamp, curve and invert one tilt signal.
///
/// Output is in -1.0..=1.0.
pub fn shape_axis(raw: f32, mapping: &AccelerometerMapping) -> f32 {
    let scaled = (raw / MAX_TILT_G).clamp(-1.0, 1.0) * mapping.sensitivity;
    let gated = apply_dead_zone(scaled, mapping.dead_zone).clamp(-1.0, 1.0);
    let curved = gated.signum() * gated.abs().powf(mapping.curve_exponent);

    if mapping.invert {
        -curved
    } else {
        curved
    }
}

/// -1.0..=1.0 to the signed 16-bit stick range
pub fn to_stick(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// 0.0..=1.0 to the 8-bit slider range; negative values release
pub fn to_slider(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * u8::MAX as f32).round() as u8
}
