//! Input report decoding
//!
//! One decode function per report ID, each returning a variant of
//! `InputReport`. Decoding is pure; `InputReport::apply` merges a decoded
//! report into the live `DeviceState`.
//!
//! Buffers shorter than a report's minimum length and unknown report IDs
//! decode to `None` and must leave state untouched.

use crate::wiimote::constants::*;
use crate::wiimote::extension::{self, ExtensionData};
use crate::wiimote::types::{AccelCalibration, Buttons, DeviceButton, DeviceState, ExtensionKind};

/// Raw extension bytes relayed by reports 0x32 / 0x35
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionBytes {
    bytes: [u8; CORE_ACCEL_EXT_PAYLOAD_LEN],
    len: usize,
}

impl ExtensionBytes {
    fn copy_from(src: &[u8]) -> Self {
        let len = src.len().min(CORE_ACCEL_EXT_PAYLOAD_LEN);
        let mut bytes = [0u8; CORE_ACCEL_EXT_PAYLOAD_LEN];
        bytes[..len].copy_from_slice(&src[..len]);
        Self { bytes, len }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Report 0x20
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub buttons: Buttons,
    pub flags: u8,
    pub battery_raw: u8,
}

impl StatusReport {
    pub fn battery_low(&self) -> bool {
        (self.flags & STATUS_FLAG_BATTERY_LOW) != 0
    }

    pub fn extension_connected(&self) -> bool {
        (self.flags & STATUS_FLAG_EXTENSION) != 0
    }

    pub fn speaker_enabled(&self) -> bool {
        (self.flags & STATUS_FLAG_SPEAKER) != 0
    }

    pub fn ir_enabled(&self) -> bool {
        (self.flags & STATUS_FLAG_IR) != 0
    }

    pub fn leds(&self) -> u8 {
        self.flags & LED_MASK
    }

    /// round(raw * 100 / 255)
    pub fn battery_percent(&self) -> u8 {
        ((self.battery_raw as u32 * 100 + 127) / 255) as u8
    }
}

/// Report 0x21
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDataReport {
    pub buttons: Buttons,
    /// Number of valid data bytes (1-16)
    pub size: u8,
    /// 0 on success, 7 for write-only registers, 8 for nonexistent addresses
    pub error: u8,
    /// Low 16 bits of the address the data was read from
    pub address: u16,
    pub data: [u8; 16],
}

impl ReadDataReport {
    pub fn bytes(&self) -> &[u8] {
        &self.data[..(self.size as usize).min(16)]
    }
}

/// Report 0x22
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckReport {
    pub buttons: Buttons,
    pub report_id: u8,
    pub error: u8,
}

/// A decoded input report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputReport {
    CoreOnly {
        buttons: Buttons,
    },
    CoreAccel {
        buttons: Buttons,
        accel: [u16; 3],
    },
    CoreExt {
        buttons: Buttons,
        extension: ExtensionBytes,
    },
    CoreAccelExt {
        buttons: Buttons,
        accel: [u16; 3],
        extension: ExtensionBytes,
    },
    Status(StatusReport),
    ReadData(ReadDataReport),
    Ack(AckReport),
}

/// Classify a raw buffer by its report ID and decode it
pub fn decode(buf: &[u8]) -> Option<InputReport> {
    match *buf.first()? {
        REPORT_CORE_BUTTONS => decode_core_only(buf),
        REPORT_CORE_ACCEL => decode_core_accel(buf),
        REPORT_CORE_EXT => decode_core_ext(buf),
        REPORT_CORE_ACCEL_EXT => decode_core_accel_ext(buf),
        REPORT_STATUS => decode_status(buf),
        REPORT_READ_DATA => decode_read_data(buf),
        REPORT_ACK => decode_ack(buf),
        _ => None,
    }
}

/// 0x30: full 16-bit word, no masking
pub fn decode_core_only(buf: &[u8]) -> Option<InputReport> {
    if buf.len() < 3 {
        return None;
    }

    Some(InputReport::CoreOnly { buttons: button_word(buf[1], buf[2]) })
}

/// 0x31: masked buttons + 10-bit accelerometer
pub fn decode_core_accel(buf: &[u8]) -> Option<InputReport> {
    if buf.len() < 6 {
        return None;
    }

    Some(InputReport::CoreAccel {
        buttons: masked_button_word(buf[1], buf[2]),
        accel: accel_sample(buf),
    })
}

/// 0x32: full button word + 6 extension bytes
pub fn decode_core_ext(buf: &[u8]) -> Option<InputReport> {
    let end = CORE_EXT_PAYLOAD_OFFSET + CORE_EXT_PAYLOAD_LEN;
    if buf.len() < end {
        return None;
    }

    Some(InputReport::CoreExt {
        buttons: button_word(buf[1], buf[2]),
        extension: ExtensionBytes::copy_from(&buf[CORE_EXT_PAYLOAD_OFFSET..end]),
    })
}

/// 0x35: masked buttons + accelerometer + 11 extension bytes
pub fn decode_core_accel_ext(buf: &[u8]) -> Option<InputReport> {
    let end = CORE_ACCEL_EXT_PAYLOAD_OFFSET + CORE_ACCEL_EXT_PAYLOAD_LEN;
    if buf.len() < end {
        return None;
    }

    Some(InputReport::CoreAccelExt {
        buttons: masked_button_word(buf[1], buf[2]),
        accel: accel_sample(buf),
        extension: ExtensionBytes::copy_from(&buf[CORE_ACCEL_EXT_PAYLOAD_OFFSET..end]),
    })
}

/// 0x20: buttons, flags byte at 3, battery at 6
pub fn decode_status(buf: &[u8]) -> Option<InputReport> {
    if buf.len() < 7 {
        return None;
    }

    Some(InputReport::Status(StatusReport {
        buttons: button_word(buf[1], buf[2]),
        flags: buf[3],
        battery_raw: buf[6],
    }))
}

/// 0x21: buttons, size/error nibbles, address, 16 data bytes
pub fn decode_read_data(buf: &[u8]) -> Option<InputReport> {
    if buf.len() < 22 {
        return None;
    }

    let mut data = [0u8; 16];
    data.copy_from_slice(&buf[6..22]);

    Some(InputReport::ReadData(ReadDataReport {
        buttons: button_word(buf[1], buf[2]),
        size: (buf[3] >> 4) + 1,
        error: buf[3] & 0x0F,
        address: u16::from_be_bytes([buf[4], buf[5]]),
        data,
    }))
}

/// 0x22: buttons, acknowledged report ID, error code
pub fn decode_ack(buf: &[u8]) -> Option<InputReport> {
    if buf.len() < 5 {
        return None;
    }

    Some(InputReport::Ack(AckReport {
        buttons: button_word(buf[1], buf[2]),
        report_id: buf[3],
        error: buf[4],
    }))
}

fn button_word(byte1: u8, byte2: u8) -> Buttons {
    Buttons(((byte1 as u16) << 8) | byte2 as u16)
}

fn masked_button_word(byte1: u8, byte2: u8) -> Buttons {
    button_word(byte1 & CORE_BUTTON_BYTE_MASK, byte2 & CORE_BUTTON_BYTE_MASK)
}

/// Rebuild 10-bit samples: MSBs in bytes 3-5, LSBs hidden in the button bytes.
///
/// X low bits = byte2[7:6], Y low bits = byte1[7:6], Z = byte1[5] | byte2[5] << 1
fn accel_sample(buf: &[u8]) -> [u16; 3] {
    let (byte1, byte2) = (buf[1], buf[2]);

    let x_lo = (byte2 >> 6) & 0x03;
    let y_lo = (byte1 >> 6) & 0x03;
    let z_lo = ((byte1 >> 5) & 0x01) | (((byte2 >> 5) & 0x01) << 1);

    [
        ((buf[3] as u16) << 2) | x_lo as u16,
        ((buf[4] as u16) << 2) | y_lo as u16,
        ((buf[5] as u16) << 2) | z_lo as u16,
    ]
}

impl InputReport {
    /// Core button word carried by this report
    pub fn buttons(&self) -> Buttons {
        match self {
            InputReport::CoreOnly { buttons }
            | InputReport::CoreAccel { buttons, .. }
            | InputReport::CoreExt { buttons, .. }
            | InputReport::CoreAccelExt { buttons, .. } => *buttons,
            InputReport::Status(status) => status.buttons,
            InputReport::ReadData(read) => read.buttons,
            InputReport::Ack(ack) => ack.buttons,
        }
    }

    /// Merge this report into `state`.
    ///
    /// Every report replaces the non-Home buttons; only a status report
    /// moves the Home bit.
    pub fn apply(&self, state: &mut DeviceState, calibration: &AccelCalibration) {
        state.merge_core_buttons(self.buttons());

        match self {
            InputReport::CoreOnly { .. } | InputReport::ReadData(_) | InputReport::Ack(_) => {}
            InputReport::CoreAccel { accel, .. } => {
                state.accelerometer = calibration.normalize(*accel);
            }
            InputReport::CoreExt { extension, .. } => {
                apply_extension(state, extension.as_slice());
            }
            InputReport::CoreAccelExt { accel, extension, .. } => {
                state.accelerometer = calibration.normalize(*accel);
                apply_extension(state, extension.as_slice());
            }
            InputReport::Status(status) => {
                state.merge_home(status.buttons.is_pressed(DeviceButton::Home));
                state.battery_percent = status.battery_percent();
                state.battery_low = status.battery_low();
                state.leds = status.leds();
                state.speaker_enabled = status.speaker_enabled();
                state.ir_enabled = status.ir_enabled();
                state.extension_connected = status.extension_connected();

                if !state.extension_connected && state.extension != ExtensionKind::None {
                    state.set_extension(ExtensionKind::None);
                }
            }
        }

        state.touch();
    }
}

/// Forward extension bytes only once the attached extension has been identified
fn apply_extension(state: &mut DeviceState, payload: &[u8]) {
    if !state.extension.is_attached() {
        return;
    }

    match extension::decode(state.extension, payload) {
        Some(ExtensionData::Nunchuk(nunchuk)) => state.nunchuk = Some(nunchuk),
        Some(ExtensionData::Classic(classic)) => state.classic = Some(classic),
        None => {}
    }
}
