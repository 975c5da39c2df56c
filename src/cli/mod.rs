//! Command-line interface

pub mod commands;
pub mod handlers;

pub use commands::CacheCommands;
pub use commands::Cli;
pub use commands::Commands;
pub use handlers::handle_cache_command;
pub use handlers::handle_probe_command;
pub use handlers::handle_status_command;
