//! Backend abstraction layer
//!
//! The device-context boundary the residency manager drives, with a Vulkan
//! implementation and a headless one for tests and tooling.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod vulkan;

pub use dummy::{DeviceCall, DummyContext, DummyDisplay};
pub use traits::*;
pub use types::*;
