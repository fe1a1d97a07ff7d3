//! Wiimote type definitions
//!
//! Input state shared by the decoder, the connection state machine and the
//! mapping engine: the core button word, accelerometer samples, extension
//! sub-records and the merged `DeviceState`.

use crate::wiimote::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A physical Wiimote button, identified by its bit in the core button word.
///
/// The word is `byte1 << 8 | byte2` of any core-bearing input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceButton {
    Two,
    One,
    B,
    A,
    Minus,
    Home,
    Plus,
    DPadLeft,
    DPadRight,
    DPadDown,
    DPadUp,
}

impl DeviceButton {
    /// Every named button, in bit order
    pub const ALL: [DeviceButton; 11] = [
        DeviceButton::Two,
        DeviceButton::One,
        DeviceButton::B,
        DeviceButton::A,
        DeviceButton::Minus,
        DeviceButton::DPadLeft,
        DeviceButton::DPadRight,
        DeviceButton::DPadDown,
        DeviceButton::DPadUp,
        DeviceButton::Plus,
        DeviceButton::Home,
    ];

    /// Bit of this button in the core button word
    pub const fn mask(self) -> u16 {
        match self {
            DeviceButton::Two => 0x0001,
            DeviceButton::One => 0x0002,
            DeviceButton::B => 0x0004,
            DeviceButton::A => 0x0008,
            DeviceButton::Minus => 0x0010,
            DeviceButton::DPadLeft => 0x0100,
            DeviceButton::DPadRight => 0x0200,
            DeviceButton::DPadDown => 0x0400,
            DeviceButton::DPadUp => 0x0800,
            DeviceButton::Plus => 0x1000,
            DeviceButton::Home => 0x8000,
        }
    }
}

/// 16-bit core button word.
///
/// Bits 0x0020, 0x0040, 0x0080, 0x2000 and 0x4000 are reserved; they are kept
/// as received so the word round-trips unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buttons(pub u16);

impl Buttons {
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn is_pressed(self, button: DeviceButton) -> bool {
        (self.0 & button.mask()) != 0
    }

    pub fn set(&mut self, button: DeviceButton, pressed: bool) {
        if pressed {
            self.0 |= button.mask();
        } else {
            self.0 &= !button.mask();
        }
    }

    /// Named buttons currently held
    pub fn pressed(self) -> impl Iterator<Item = DeviceButton> {
        DeviceButton::ALL
            .into_iter()
            .filter(move |button| self.is_pressed(*button))
    }
}

/// Analog stick state (normalized -1.0 to 1.0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stick {
    /// Horizontal axis (-1.0 = left, 1.0 = right)
    pub x: f32,

    /// Vertical axis (-1.0 = down, 1.0 = up)
    pub y: f32,
}

/// Accelerometer data (linear acceleration in g)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accelerometer {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Accelerometer {
    /// Device lying flat, face up
    pub const RESTING: Accelerometer = Accelerometer { x: 0.0, y: 0.0, z: 1.0 };
}

impl Default for Accelerometer {
    fn default() -> Self {
        Self::RESTING
    }
}

/// Per-axis zero-g and one-g points of a 10-bit accelerometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelCalibration {
    pub zero: [u16; 3],
    pub one_g: [u16; 3],
}

impl Default for AccelCalibration {
    fn default() -> Self {
        Self {
            zero: [ACCEL_ZERO_10BIT; 3],
            one_g: [ACCEL_ONE_G_10BIT; 3],
        }
    }
}

impl AccelCalibration {
    /// Parse the 10-byte factory calibration block stored at EEPROM 0x0016.
    ///
    /// Layout: zero X/Y/Z MSBs, one LSB byte (X bits 5:4, Y bits 3:2, Z bits 1:0),
    /// then the same for the one-g point. Returns `None` when the block is short
    /// or any axis has a one-g point at or below its zero point.
    pub fn from_eeprom(data: &[u8]) -> Option<Self> {
        if data.len() < ACCEL_CALIBRATION_LEN as usize {
            return None;
        }

        let axis = |msb: u8, lsb_byte: u8, shift: u8| -> u16 {
            ((msb as u16) << 2) | ((lsb_byte >> shift) & 0x03) as u16
        };

        let zero = [
            axis(data[0], data[3], 4),
            axis(data[1], data[3], 2),
            axis(data[2], data[3], 0),
        ];
        let one_g = [
            axis(data[4], data[7], 4),
            axis(data[5], data[7], 2),
            axis(data[6], data[7], 0),
        ];

        if zero.iter().zip(one_g.iter()).any(|(z, g)| g <= z) {
            return None;
        }

        Some(Self { zero, one_g })
    }

    /// Convert raw 10-bit samples into g
    pub fn normalize(&self, raw: [u16; 3]) -> Accelerometer {
        let axis = |i: usize| {
            let span = self.one_g[i].saturating_sub(self.zero[i]).max(1) as f32;
            (raw[i] as f32 - self.zero[i] as f32) / span
        };

        Accelerometer {
            x: axis(0),
            y: axis(1),
            z: axis(2),
        }
    }
}

/// Nunchuk state with button polarity already resolved (bit set = pressed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NunchukState {
    pub stick: Stick,
    pub accelerometer: Accelerometer,
    pub buttons: u8,
}

impl NunchukState {
    pub const BUTTON_Z: u8 = 0x01;
    pub const BUTTON_C: u8 = 0x02;

    pub fn c(&self) -> bool {
        (self.buttons & Self::BUTTON_C) != 0
    }

    pub fn z(&self) -> bool {
        (self.buttons & Self::BUTTON_Z) != 0
    }
}

/// Classic Controller state with button polarity already resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassicControllerState {
    pub left_stick: Stick,
    pub right_stick: Stick,

    /// Analog triggers (0.0 to 1.0)
    pub left_trigger: f32,
    pub right_trigger: f32,

    pub buttons: u16,
}

impl ClassicControllerState {
    pub const BUTTON_DPAD_RIGHT: u16 = 0x8000;
    pub const BUTTON_DPAD_DOWN: u16 = 0x4000;
    pub const BUTTON_LT: u16 = 0x2000;
    pub const BUTTON_MINUS: u16 = 0x1000;
    pub const BUTTON_HOME: u16 = 0x0800;
    pub const BUTTON_PLUS: u16 = 0x0400;
    pub const BUTTON_RT: u16 = 0x0200;
    pub const BUTTON_ZL: u16 = 0x0080;
    pub const BUTTON_B: u16 = 0x0040;
    pub const BUTTON_Y: u16 = 0x0020;
    pub const BUTTON_A: u16 = 0x0010;
    pub const BUTTON_X: u16 = 0x0008;
    pub const BUTTON_ZR: u16 = 0x0004;
    pub const BUTTON_DPAD_LEFT: u16 = 0x0002;
    pub const BUTTON_DPAD_UP: u16 = 0x0001;

    pub fn is_pressed(&self, mask: u16) -> bool {
        (self.buttons & mask) != 0
    }
}

/// Extension controller plugged into the expansion port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionKind {
    #[default]
    None,
    Nunchuk,
    ClassicController,
    Guitar,
    MotionPlus,
    Unknown,
}

impl ExtensionKind {
    /// Match the six identifier bytes read from 0xA400FA
    pub fn from_identifier(id: &[u8]) -> Self {
        let id: [u8; 6] = match id.get(..6).and_then(|bytes| bytes.try_into().ok()) {
            Some(id) => id,
            None => return ExtensionKind::Unknown,
        };

        match id {
            EXTENSION_ID_NONE => ExtensionKind::None,
            EXTENSION_ID_NUNCHUK => ExtensionKind::Nunchuk,
            EXTENSION_ID_CLASSIC => ExtensionKind::ClassicController,
            EXTENSION_ID_GUITAR => ExtensionKind::Guitar,
            EXTENSION_ID_MOTION_PLUS => ExtensionKind::MotionPlus,
            _ => ExtensionKind::Unknown,
        }
    }

    /// Whether a real extension (recognised or not) is attached
    pub fn is_attached(self) -> bool {
        self != ExtensionKind::None
    }
}

/// Merged live state of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// Opaque transport-assigned identity
    pub device_id: String,
    pub connected: bool,

    pub buttons: Buttons,
    pub accelerometer: Accelerometer,

    /// Battery charge (0-100)
    pub battery_percent: u8,
    pub battery_low: bool,

    /// LED bits as reported (high nibble, 0x10..0x80)
    pub leds: u8,
    pub rumble: bool,
    pub speaker_enabled: bool,
    pub ir_enabled: bool,

    /// Extension-present flag from the last status report
    pub extension_connected: bool,
    pub extension: ExtensionKind,
    pub nunchuk: Option<NunchukState>,
    pub classic: Option<ClassicControllerState>,

    pub last_communication: Option<Instant>,
}

impl DeviceState {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            connected: false,
            buttons: Buttons::default(),
            accelerometer: Accelerometer::RESTING,
            battery_percent: 0,
            battery_low: false,
            leds: 0,
            rumble: false,
            speaker_enabled: false,
            ir_enabled: false,
            extension_connected: false,
            extension: ExtensionKind::None,
            nunchuk: None,
            classic: None,
            last_communication: None,
        }
    }

    /// Replace every button except Home, which only status reports own.
    pub fn merge_core_buttons(&mut self, buttons: Buttons) {
        let home = DeviceButton::Home.mask();
        self.buttons = Buttons((buttons.bits() & !home) | (self.buttons.bits() & home));
    }

    /// OR the Home bit in when pressed, AND-NOT it out when released.
    pub fn merge_home(&mut self, pressed: bool) {
        self.buttons.set(DeviceButton::Home, pressed);
    }

    /// Switch the cached extension kind, dropping sub-records that no longer apply.
    pub fn set_extension(&mut self, kind: ExtensionKind) {
        self.extension = kind;
        self.nunchuk = None;
        self.classic = None;
    }

    /// Back to rest: no buttons, gravity on Z, no extension data.
    pub fn reset_sensor_data(&mut self) {
        self.buttons = Buttons::default();
        self.accelerometer = Accelerometer::RESTING;
        self.nunchuk = None;
        self.classic = None;
    }

    pub fn touch(&mut self) {
        self.last_communication = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_masks_are_distinct() {
        let mut seen = 0u16;
        for button in DeviceButton::ALL {
            assert_eq!(seen & button.mask(), 0, "{:?} overlaps", button);
            seen |= button.mask();
        }
        assert_eq!(seen, 0x9F1F);
    }

    #[test]
    fn test_core_merge_preserves_home() {
        let mut state = DeviceState::new("dev");
        state.merge_home(true);
        state.merge_core_buttons(Buttons(DeviceButton::A.mask()));

        assert!(state.buttons.is_pressed(DeviceButton::A));
        assert!(state.buttons.is_pressed(DeviceButton::Home));

        // A Home bit inside a core word is ignored
        state.merge_home(false);
        state.merge_core_buttons(Buttons(0x8000));
        assert!(!state.buttons.is_pressed(DeviceButton::Home));
    }

    #[test]
    fn test_extension_identifiers() {
        assert_eq!(ExtensionKind::from_identifier(&EXTENSION_ID_NONE), ExtensionKind::None);
        assert_eq!(ExtensionKind::from_identifier(&EXTENSION_ID_NUNCHUK), ExtensionKind::Nunchuk);
        assert_eq!(
            ExtensionKind::from_identifier(&EXTENSION_ID_CLASSIC),
            ExtensionKind::ClassicController
        );
        assert_eq!(ExtensionKind::from_identifier(&EXTENSION_ID_GUITAR), ExtensionKind::Guitar);
        assert_eq!(
            ExtensionKind::from_identifier(&EXTENSION_ID_MOTION_PLUS),
            ExtensionKind::MotionPlus
        );
        assert_eq!(
            ExtensionKind::from_identifier(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            ExtensionKind::Unknown
        );
        assert_eq!(ExtensionKind::from_identifier(&[0x00, 0x00]), ExtensionKind::Unknown);
    }

    #[test]
    fn test_default_calibration_resting() {
        let accel = AccelCalibration::default().normalize([512, 512, 716]);
        assert_eq!(accel, Accelerometer::RESTING);
    }

    #[test]
    fn test_eeprom_calibration() {
        // zero = 0x82<<2|1, 0x7F<<2|2, 0x80<<2|3; one-g = 0x9C<<2, 0x9A<<2, 0x9D<<2
        let block = [0x82, 0x7F, 0x80, 0b0001_1011, 0x9C, 0x9A, 0x9D, 0x00, 0x00, 0x00];
        let cal = AccelCalibration::from_eeprom(&block).unwrap();
        assert_eq!(cal.zero, [0x209, 0x1FE, 0x203]);
        assert_eq!(cal.one_g, [0x270, 0x268, 0x274]);
    }

    #[test]
    fn test_eeprom_calibration_rejects_garbage() {
        assert!(AccelCalibration::from_eeprom(&[0u8; 10]).is_none());
        assert!(AccelCalibration::from_eeprom(&[0x80; 4]).is_none());
    }

    #[test]
    fn test_set_extension_drops_records() {
        let mut state = DeviceState::new("dev");
        state.nunchuk = Some(NunchukState::default());
        state.set_extension(ExtensionKind::ClassicController);
        assert!(state.nunchuk.is_none());
        assert_eq!(state.extension, ExtensionKind::ClassicController);
    }
}
