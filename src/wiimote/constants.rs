//! Wiimote protocol constants
//!
//! This module contains every constant that has to match on the wire:
//! - HID identifiers
//! - Output and input report IDs
//! - LED / rumble / reporting-mode bits
//! - Extension register addresses and identifier sequences
//! - Accelerometer calibration defaults and timing defaults

// ============================================================================
// HID Identifiers
// ============================================================================

/// Nintendo Co., Ltd. USB/HID vendor ID
pub const NINTENDO_VENDOR_ID: u16 = 0x057E;

/// Original Wii Remote product ID
pub const WIIMOTE_PRODUCT_ID: u16 = 0x0306;

/// Wii Remote Plus (built-in MotionPlus) product ID
pub const WIIMOTE_PLUS_PRODUCT_ID: u16 = 0x0330;

/// Transport frame size used by the classic Bluetooth HID stack
pub const DEFAULT_FRAME_LEN: usize = 22;

// ============================================================================
// Output Reports (host -> device)
// ============================================================================

/// LED state and rumble
pub const REPORT_LED_RUMBLE: u8 = 0x11;

/// Data reporting mode selection
pub const REPORT_SET_MODE: u8 = 0x12;

/// Status information request
pub const REPORT_STATUS_REQUEST: u8 = 0x15;

/// Write memory and registers
pub const REPORT_WRITE_MEMORY: u8 = 0x16;

/// Read memory and registers
pub const REPORT_READ_MEMORY: u8 = 0x17;

// ============================================================================
// Input Reports (device -> host)
// ============================================================================

/// Status information
pub const REPORT_STATUS: u8 = 0x20;

/// Memory / register read reply
pub const REPORT_READ_DATA: u8 = 0x21;

/// Acknowledgement of an output report
pub const REPORT_ACK: u8 = 0x22;

/// Core buttons only
pub const REPORT_CORE_BUTTONS: u8 = 0x30;

/// Core buttons + accelerometer
pub const REPORT_CORE_ACCEL: u8 = 0x31;

/// Core buttons + extension bytes
pub const REPORT_CORE_EXT: u8 = 0x32;

/// Core buttons + accelerometer + extension bytes
pub const REPORT_CORE_ACCEL_EXT: u8 = 0x35;

// ============================================================================
// Output Report Bits
// ============================================================================

/// Player LED 1 (high nibble of the 0x11 payload byte)
pub const LED_1: u8 = 0x10;
pub const LED_2: u8 = 0x20;
pub const LED_3: u8 = 0x40;
pub const LED_4: u8 = 0x80;

/// All four LED bits
pub const LED_MASK: u8 = 0xF0;

/// Rumble motor bit (bit 0 of the first payload byte of every output report)
pub const RUMBLE_BIT: u8 = 0x01;

/// Continuous reporting flag for report 0x12
pub const CONTINUOUS_REPORTING: u8 = 0x04;

/// Address space selector for the EEPROM
pub const MEMORY_SPACE_EEPROM: u8 = 0x00;

/// Address space selector for control registers
pub const MEMORY_SPACE_REGISTER: u8 = 0x04;

/// Largest payload a single 0x16 write may carry
pub const MAX_WRITE_LEN: usize = 16;

// ============================================================================
// Status Report Flags (byte 3 of report 0x20)
// ============================================================================

pub const STATUS_FLAG_BATTERY_LOW: u8 = 0x01;
pub const STATUS_FLAG_EXTENSION: u8 = 0x02;
pub const STATUS_FLAG_SPEAKER: u8 = 0x04;
pub const STATUS_FLAG_IR: u8 = 0x08;

// ============================================================================
// Extension Registers
// ============================================================================

/// First init write: 0x55 to 0xA400F0 disables extension encryption
pub const EXTENSION_INIT_ADDR_1: u32 = 0xA4_00F0;
pub const EXTENSION_INIT_VALUE_1: u8 = 0x55;

/// Second init write: 0x00 to 0xA400FB
pub const EXTENSION_INIT_ADDR_2: u32 = 0xA4_00FB;
pub const EXTENSION_INIT_VALUE_2: u8 = 0x00;

/// Six identifier bytes live here once the extension is initialised
pub const EXTENSION_ID_ADDR: u32 = 0xA4_00FA;
pub const EXTENSION_ID_LEN: u16 = 6;

/// Extension identifier sequences
pub const EXTENSION_ID_NONE: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const EXTENSION_ID_NUNCHUK: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x00, 0x00];
pub const EXTENSION_ID_CLASSIC: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x01, 0x01];
pub const EXTENSION_ID_GUITAR: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x03, 0x03];
pub const EXTENSION_ID_MOTION_PLUS: [u8; 6] = [0x00, 0x00, 0xA6, 0x20, 0x00, 0x05];

/// Extension bytes carried by report 0x32 (starting at byte 3)
pub const CORE_EXT_PAYLOAD_OFFSET: usize = 3;
pub const CORE_EXT_PAYLOAD_LEN: usize = 6;

/// Extension bytes carried by report 0x35 (starting at byte 6)
pub const CORE_ACCEL_EXT_PAYLOAD_OFFSET: usize = 6;
pub const CORE_ACCEL_EXT_PAYLOAD_LEN: usize = 11;

// ============================================================================
// Accelerometer
// ============================================================================

/// Factory calibration block in EEPROM
pub const ACCEL_CALIBRATION_ADDR: u32 = 0x00_0016;
pub const ACCEL_CALIBRATION_LEN: u16 = 10;

/// 10-bit zero-g point (0x80 << 2)
pub const ACCEL_ZERO_10BIT: u16 = 512;

/// 10-bit one-g point (0xB3 << 2)
pub const ACCEL_ONE_G_10BIT: u16 = 716;

/// Mask applied to each button byte of accelerometer-bearing reports
pub const CORE_BUTTON_BYTE_MASK: u8 = 0x1F;

// ============================================================================
// Timing Constants
// ============================================================================

/// Period of the status poll (milliseconds)
pub const STATUS_INTERVAL_MS: u64 = 200;

/// Bounded transport read timeout (milliseconds)
pub const READ_TIMEOUT_MS: u64 = 100;
