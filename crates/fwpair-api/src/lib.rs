// fwpair-api: Async Rust client for the firewall management center REST API

pub mod auth;
pub mod client;
pub mod deployment;
pub mod devices;
pub mod error;
pub mod ha;
pub mod models;
pub mod transport;

pub use auth::Session;
pub use client::FmcClient;
pub use error::Error;
pub use reqwest::Method;
pub use transport::{TlsMode, TransportConfig};
