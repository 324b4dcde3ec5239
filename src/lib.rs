//! Timed network-stability testing for an ADB-attached Android device
//!
//! The core is three cooperating loops: device presence polling, network
//! health sampling while a test runs, and a one-shot diagnostic capture after
//! a failure. [`controller::TestRunController`] ties them together and reports
//! through an [`events::EventBus`].

pub mod bridge;
pub mod capture;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod monitors;
#[doc(hidden)]
pub mod testing;

pub use bridge::{DeviceBridge, DeviceHandle};
pub use config::AppConfig;
pub use controller::{TestRunController, TestState};
pub use events::{EventBus, MonitorEvent};
