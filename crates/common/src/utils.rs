//! 通用工具函数

/// 零值回退
///
/// `value` 等于类型零值（空字符串、`0`、`Duration::ZERO` 等）时返回 `fallback`，
/// 否则原样返回 `value`。
pub fn default_value<T>(value: T, fallback: T) -> T
where
    T: Default + PartialEq,
{
    if value == T::default() { fallback } else { value }
}

/// 同 [`default_value`]，回退值仅在需要时才计算
pub fn default_with<T, F>(value: T, fallback: F) -> T
where
    T: Default + PartialEq,
    F: FnOnce() -> T,
{
    if value == T::default() { fallback() } else { value }
}
