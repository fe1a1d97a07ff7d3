//! Wiimote protocol support
//!
//! This module provides the device side of the bridge:
//! - Wire constants and the merged device state
//! - Input report and extension decoding
//! - Output report encoding
//! - Per-device session (handshake, read loop, status polling)

pub mod constants;
pub mod types;
pub mod report;
pub mod extension;
pub mod output;
pub mod connection;

// Re-export commonly used items
pub use types::*;
pub use report::{InputReport, ReadDataReport, StatusReport};
pub use extension::ExtensionData;
pub use output::{EncodeError, OutputEncoder, ReportingMode};
pub use connection::*;
