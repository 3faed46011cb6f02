pub mod app;
pub mod commands;
pub mod console;

pub use app::{Cli, Commands};
