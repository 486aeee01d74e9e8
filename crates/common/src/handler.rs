//! 构造后回调

/// 客户端构造完成后的回调，可用于注册插件、订阅等定制
pub type Handler<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// 按注册顺序调用所有 handler
pub fn apply_handlers<T>(handle: &T, handlers: Vec<Handler<T>>) {
    for handler in handlers {
        handler(handle);
    }
}
