//! 配置加载器
//!
//! 按顺序合并多个配置源（文件、环境变量、任意 figment Provider），
//! 后加入的源在键冲突时覆盖先前的值，最后解码为强类型结构。

use std::path::Path;

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Json, Toml, Yaml},
    value::{Dict, Map, Value},
};
use serde::de::DeserializeOwned;

use crate::ConfigError;

/// 配置文件格式，由扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
    Yaml,
}

impl FileFormat {
    /// 根据文件扩展名推断格式
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// 配置加载器
///
/// ```ignore
/// let config: AppConfig = ConfigLoader::new()
///     .file("config/default.toml")
///     .env("APP_")
///     .load()?;
/// ```
pub struct ConfigLoader {
    figment: Figment,
    error: Option<ConfigError>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            error: None,
        }
    }

    /// 工作目录下的 `config.yml`（可缺省）加无前缀环境变量
    ///
    /// 只读取列出的顶层键对应的环境变量，`sections` 为 `["redis"]` 时读取
    /// `REDIS` 与 `REDIS__*`，`PATH`、`HOME` 等无关变量不会进入配置树。
    pub fn standard(sections: &[&str]) -> Self {
        let sections: Vec<String> = sections.iter().map(|s| s.to_ascii_lowercase()).collect();
        let env = Env::raw()
            .filter(move |key| {
                let key = key.as_str().to_ascii_lowercase();
                sections.iter().any(|s| match key.strip_prefix(s.as_str()) {
                    Some(rest) => rest.is_empty() || rest.starts_with("__"),
                    None => false,
                })
            })
            .split("__");
        Self::new().optional_file("config.yml").provider(env)
    }

    /// 加入必需的配置文件，文件不存在时 `load` 返回错误
    pub fn file(self, path: impl AsRef<Path>) -> Self {
        self.add_file(path.as_ref(), true)
    }

    /// 加入可缺省的配置文件
    pub fn optional_file(self, path: impl AsRef<Path>) -> Self {
        self.add_file(path.as_ref(), false)
    }

    /// 加入带前缀的环境变量，`__` 分隔嵌套层级
    ///
    /// `APP_DATABASE__DSN` 映射为 `database.dsn`
    pub fn env(self, prefix: &str) -> Self {
        self.provider(Env::prefixed(prefix).split("__"))
    }

    /// 加入任意配置源（远程配置中心、内存数据等）
    pub fn provider<P: Provider>(mut self, provider: P) -> Self {
        self.figment = self.figment.merge(Lowercase(provider));
        self
    }

    /// 合并后的配置树
    pub fn figment(&self) -> &Figment {
        &self.figment
    }

    /// 解码为目标结构
    ///
    /// 字符串形式的数字、布尔值会被宽松转换
    pub fn load<T: DeserializeOwned>(self) -> Result<T, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(self.figment.extract_lossy()?)
    }

    /// 只解码某个子路径，例如 `"database"`
    pub fn load_section<T: DeserializeOwned>(self, key: &str) -> Result<T, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(self.figment.extract_inner_lossy(&key.to_lowercase())?)
    }

    fn add_file(mut self, path: &Path, required: bool) -> Self {
        if self.error.is_some() {
            return self;
        }

        let Some(format) = FileFormat::from_path(path) else {
            self.error = Some(ConfigError::UnsupportedFormat(path.to_path_buf()));
            return self;
        };

        if !path.exists() {
            if required {
                self.error = Some(ConfigError::MissingFile(path.to_path_buf()));
            }
            return self;
        }

        match format {
            FileFormat::Toml => self.provider(Toml::file(path)),
            FileFormat::Json => self.provider(Json::file(path)),
            FileFormat::Yaml => self.provider(Yaml::file(path)),
        }
    }
}

/// 将内部 Provider 的所有键转为小写，使键名大小写无关
struct Lowercase<P>(P);

impl<P: Provider> Provider for Lowercase<P> {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let data = self.0.data()?;
        Ok(data
            .into_iter()
            .map(|(profile, dict)| (profile, lowercase_dict(dict)))
            .collect())
    }

    fn profile(&self) -> Option<Profile> {
        self.0.profile()
    }
}

fn lowercase_dict(dict: Dict) -> Dict {
    dict.into_iter()
        .map(|(key, value)| (key.to_lowercase(), lowercase_value(value)))
        .collect()
}

fn lowercase_value(value: Value) -> Value {
    match value {
        Value::Dict(tag, dict) => Value::Dict(tag, lowercase_dict(dict)),
        Value::Array(tag, items) => {
            Value::Array(tag, items.into_iter().map(lowercase_value).collect())
        }
        other => other,
    }
}
