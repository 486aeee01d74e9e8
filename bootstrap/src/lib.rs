//! kit-bootstrap - 统一服务启动骨架
//!
//! 加载配置、初始化日志、创建基础设施并交给生命周期管理

mod infrastructure;
mod runtime;
mod starter;

pub use infrastructure::*;
pub use runtime::*;
pub use starter::*;
