//! kit-adapter-redis - Redis 适配器

mod connection;

pub use connection::*;
pub use redis::aio::ConnectionManager;
