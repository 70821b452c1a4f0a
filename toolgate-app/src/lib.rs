pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod logging;

pub use bootstrap::{build, Toolgate};
pub use commands::Command;
pub use config::Config;
