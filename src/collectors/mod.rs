pub mod network_status;
pub mod traffic;

pub use network_status::{InterfaceKind, NetworkStatus};
pub use traffic::TrafficSampler;
