pub mod cli;
pub mod load_config;
pub mod logging;

pub use cli::{execute, run, Cli, Commands};
