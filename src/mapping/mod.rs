//! Mapping module - converts Wiimote state into virtual gamepad frames

pub mod config;
pub mod engine;
pub mod frame;
pub mod profile;
pub mod store;

pub use config::{Config, ConfigError};
pub use engine::{MappingEngine, MappingStrategy};
pub use frame::VirtualControllerFrame;
pub use profile::{MappingProfile, ProfileError, ProfileTemplate};
pub use store::{JsonProfileStore, MemoryProfileStore, ProfileStore, StoreError};
