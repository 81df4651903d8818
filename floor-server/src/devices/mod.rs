//! Device onboarding

pub mod device_auth;

pub use device_auth::{DeviceAuth, DeviceAuthHandle};
