// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod classifier;
pub mod config;
pub mod error;
pub mod shutdown;
pub mod state;
pub mod status;
pub mod tunnel;
pub mod types;
pub mod ws;
