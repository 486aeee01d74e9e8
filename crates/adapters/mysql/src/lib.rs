//! kit-adapter-mysql - MySQL 适配器

mod connection;

pub use connection::*;
pub use sqlx::mysql::MySqlPool;
