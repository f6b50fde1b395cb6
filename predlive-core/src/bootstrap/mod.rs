//! Bootstrap helpers for starting the predlive server

pub mod config;

pub use config::load_config;
