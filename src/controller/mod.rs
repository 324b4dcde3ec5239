pub mod actor;
pub mod state;

pub use actor::{ControllerSnapshot, TICK_INTERVAL, TestRunController};
pub use state::{TestSession, TestState};
