mod client;

pub mod types;

pub use client::{connect, connect_with_config, Client, ServerRx};
pub use client::config::{Config, ConfigBuilder};
