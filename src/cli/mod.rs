pub mod commands;
pub mod console;
pub mod handlers;

pub use commands::{Cli, Commands};
pub use console::{ConsoleCommand, ConsolePresenter};
pub use handlers::CommandHandler;
