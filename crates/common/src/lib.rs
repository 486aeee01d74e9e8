//! kit-common - 通用类型和工具库

pub mod handler;
pub mod utils;

pub use handler::*;
pub use utils::*;
