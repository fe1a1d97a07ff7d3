//! Output report encoding
//!
//! Builds the fixed-size host -> device frames. Every frame starts with its
//! report ID and is zero-padded to the transport frame length. The rumble bit
//! rides in bit 0 of the first payload byte of every report, so callers pass
//! the current rumble state along with each command.

use crate::wiimote::constants::*;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Output report needs {needed} bytes but the transport frame is {frame_len} bytes")]
    FrameTooShort { needed: usize, frame_len: usize },

    #[error("Memory write of {0} bytes exceeds the 16-byte limit")]
    WriteTooLong(usize),
}

/// Data reporting modes selectable with report 0x12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportingMode {
    CoreButtons,
    CoreAccel,
    CoreExt,
    CoreAccelExt,
}

impl ReportingMode {
    pub const fn report_id(self) -> u8 {
        match self {
            ReportingMode::CoreButtons => REPORT_CORE_BUTTONS,
            ReportingMode::CoreAccel => REPORT_CORE_ACCEL,
            ReportingMode::CoreExt => REPORT_CORE_EXT,
            ReportingMode::CoreAccelExt => REPORT_CORE_ACCEL_EXT,
        }
    }
}

/// LED bit for a zero-based device slot (slot 4 wraps back to LED 1)
pub fn led_for_index(index: usize) -> u8 {
    LED_1 << (index % 4)
}

/// Encoder for output reports of a fixed frame length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEncoder {
    frame_len: usize,
}

impl Default for OutputEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_LEN)
    }
}

impl OutputEncoder {
    pub fn new(frame_len: usize) -> Self {
        Self { frame_len }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Report 0x11: LED mask in the high nibble, rumble in bit 0
    pub fn led_rumble(&self, leds: u8, rumble: bool) -> Result<Vec<u8>, EncodeError> {
        self.frame(&[REPORT_LED_RUMBLE, (leds & LED_MASK) | rumble_bit(rumble)])
    }

    /// Report 0x12: continuous flag, then the requested input report ID
    pub fn set_reporting_mode(
        &self,
        mode: ReportingMode,
        continuous: bool,
        rumble: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        let flags = if continuous { CONTINUOUS_REPORTING } else { 0 };
        self.frame(&[REPORT_SET_MODE, flags | rumble_bit(rumble), mode.report_id()])
    }

    /// Report 0x15: status request
    pub fn status_request(&self, rumble: bool) -> Result<Vec<u8>, EncodeError> {
        self.frame(&[REPORT_STATUS_REQUEST, rumble_bit(rumble)])
    }

    /// Report 0x16: write up to 16 bytes to EEPROM or a register
    pub fn write_memory(
        &self,
        space: u8,
        address: u32,
        data: &[u8],
        rumble: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        if data.len() > MAX_WRITE_LEN {
            return Err(EncodeError::WriteTooLong(data.len()));
        }

        let mut payload = [0u8; 6 + MAX_WRITE_LEN];
        payload[0] = REPORT_WRITE_MEMORY;
        payload[1] = space | rumble_bit(rumble);
        payload[2..5].copy_from_slice(&address_bytes(address));
        payload[5] = data.len() as u8;
        payload[6..6 + data.len()].copy_from_slice(data);

        self.frame(&payload)
    }

    /// Report 0x17: read `size` bytes from EEPROM or a register
    pub fn read_memory(
        &self,
        space: u8,
        address: u32,
        size: u16,
        rumble: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        let [addr_hi, addr_mid, addr_lo] = address_bytes(address);
        let [size_hi, size_lo] = size.to_be_bytes();
        self.frame(&[
            REPORT_READ_MEMORY,
            space | rumble_bit(rumble),
            addr_hi,
            addr_mid,
            addr_lo,
            size_hi,
            size_lo,
        ])
    }

    /// Pad `payload` to the frame length
    fn frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        if payload.len() > self.frame_len {
            return Err(EncodeError::FrameTooShort {
                needed: payload.len(),
                frame_len: self.frame_len,
            });
        }

        let mut buf = vec![0u8; self.frame_len];
        buf[..payload.len()].copy_from_slice(payload);
        Ok(buf)
    }
}

fn rumble_bit(rumble: bool) -> u8 {
    if rumble {
        RUMBLE_BIT
    } else {
        0
    }
}

/// 24-bit big-endian address
fn address_bytes(address: u32) -> [u8; 3] {
    let [_, hi, mid, lo] = address.to_be_bytes();
    [hi, mid, lo]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_rumble_frame() {
        let encoder = OutputEncoder::default();
        let frame = encoder.led_rumble(LED_1 | LED_4, true).unwrap();

        assert_eq!(frame.len(), DEFAULT_FRAME_LEN);
        assert_eq!(&frame[..2], &[0x11, 0x91]);
        assert!(frame[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_led_mask_ignores_low_nibble() {
        let frame = OutputEncoder::default().led_rumble(0xFF, false).unwrap();
        assert_eq!(frame[1], 0xF0);
    }

    #[test]
    fn test_set_reporting_mode_frame() {
        let frame = OutputEncoder::default()
            .set_reporting_mode(ReportingMode::CoreAccel, true, false)
            .unwrap();
        assert_eq!(&frame[..3], &[0x12, 0x04, 0x31]);

        let frame = OutputEncoder::default()
            .set_reporting_mode(ReportingMode::CoreAccelExt, false, true)
            .unwrap();
        assert_eq!(&frame[..3], &[0x12, 0x01, 0x35]);
    }

    #[test]
    fn test_status_request_frame() {
        let frame = OutputEncoder::default().status_request(false).unwrap();
        assert_eq!(frame[0], 0x15);
        assert!(frame[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_memory_frame() {
        let frame = OutputEncoder::default()
            .write_memory(MEMORY_SPACE_REGISTER, EXTENSION_INIT_ADDR_1, &[0x55], false)
            .unwrap();
        assert_eq!(&frame[..7], &[0x16, 0x04, 0xA4, 0x00, 0xF0, 0x01, 0x55]);
        assert_eq!(frame.len(), 22);
    }

    #[test]
    fn test_read_memory_frame() {
        let frame = OutputEncoder::default()
            .read_memory(MEMORY_SPACE_REGISTER, EXTENSION_ID_ADDR, EXTENSION_ID_LEN, false)
            .unwrap();
        assert_eq!(&frame[..7], &[0x17, 0x04, 0xA4, 0x00, 0xFA, 0x00, 0x06]);
    }

    #[test]
    fn test_short_frame_is_reported() {
        let encoder = OutputEncoder::new(2);
        assert!(encoder.led_rumble(LED_1, false).is_ok());
        assert_eq!(
            encoder.set_reporting_mode(ReportingMode::CoreAccel, true, false),
            Err(EncodeError::FrameTooShort { needed: 3, frame_len: 2 })
        );
        assert_eq!(
            OutputEncoder::new(21).write_memory(MEMORY_SPACE_REGISTER, 0, &[0; 16], false),
            Err(EncodeError::FrameTooShort { needed: 22, frame_len: 21 })
        );
    }

    #[test]
    fn test_write_too_long() {
        assert_eq!(
            OutputEncoder::default().write_memory(MEMORY_SPACE_REGISTER, 0, &[0; 17], false),
            Err(EncodeError::WriteTooLong(17))
        );
    }

    #[test]
    fn test_led_for_index_wraps() {
        assert_eq!(led_for_index(0), LED_1);
        assert_eq!(led_for_index(3), LED_4);
        assert_eq!(led_for_index(4), LED_1);
    }
}
