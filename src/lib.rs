// Public API for the CLI, integration tests and embedding in other clients

pub mod api;
pub mod config;
pub mod mascot;
pub mod protocol;
pub mod session;
pub mod socket;
pub mod store;
pub mod sync;
pub mod types;
