//! Home Assistant REST integration.

mod client;

pub use client::HaClient;
