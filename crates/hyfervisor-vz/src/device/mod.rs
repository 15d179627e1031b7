//! Device configuration types.
//!
//! This module provides configurations for the virtual devices a macOS
//! guest is given.

mod audio;
mod entropy;
mod graphics;
mod input;
mod network;
mod storage;

pub use audio::AudioDeviceConfiguration;
pub use entropy::EntropyDeviceConfiguration;
pub use graphics::GraphicsDeviceConfiguration;
pub use input::{KeyboardConfiguration, PointingDeviceConfiguration};
pub use network::NetworkDeviceConfiguration;
pub use storage::StorageDeviceConfiguration;
