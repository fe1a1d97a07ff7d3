//! wiimote-pad: Wiimote to virtual gamepad bridge
//!
//! This library decodes Wiimote input reports, keeps a merged per-device
//! state, and maps it through user profiles onto a virtual gamepad.

pub mod backend;
pub mod wiimote;
pub mod mapping;
pub mod manager;

// Re-export commonly used items
pub use backend::{GamepadSink, Transport, TransportOpener};
pub use wiimote::{DeviceEvent, DeviceSession, DeviceState, InputReport, OutputEncoder};
pub use manager::{DeviceManager, ManagerError};
pub use mapping::{Config, MappingEngine, MappingProfile, ProfileStore, VirtualControllerFrame};
