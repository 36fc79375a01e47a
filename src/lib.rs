pub mod adapters;
pub mod apdu;
pub mod config;
pub mod domain;
pub mod server;
pub mod session;
pub mod telemetry;
