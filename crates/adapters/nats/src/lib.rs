//! kit-adapter-nats - NATS 适配器

mod connection;

pub use async_nats::Client;
pub use connection::*;
