pub mod config;
pub mod remote;
pub mod ring;
