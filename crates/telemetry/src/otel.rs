//! OpenTelemetry 日志导出

use std::collections::HashMap;

use kit_config::OpenTelemetryConfig;
use kit_errors::{AppError, AppResult};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{LogExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{Resource, logs::LoggerProvider, runtime};
use secrecy::ExposeSecret;

const STREAM_FIELDS_HEADER: &str = "VL-Stream-Fields";
const STREAM_FIELDS: &str = "telemetry.sdk.language,severity,service.name";

/// 导出请求头
///
/// `auth_method` 不区分大小写：`bearer`、`basic` 写入 `Authorization`，
/// `header` 把令牌写入 `auth_header` 指定的请求头。
pub fn auth_headers(config: &OpenTelemetryConfig) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(STREAM_FIELDS_HEADER.to_string(), STREAM_FIELDS.to_string());

    let token = config.auth_token.expose_secret();
    match config.auth_method.trim().to_ascii_lowercase().as_str() {
        "bearer" => {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        "basic" => {
            headers.insert("Authorization".to_string(), format!("Basic {}", token));
        }
        "header" if !config.auth_header.is_empty() => {
            headers.insert(config.auth_header.clone(), token.clone());
        }
        _ => {}
    }
    headers
}

/// 构建 OTLP/HTTP 批量导出的 LoggerProvider，需在 tokio 运行时内调用
pub(crate) fn build_provider(
    config: &OpenTelemetryConfig,
    attributes: Vec<KeyValue>,
) -> AppResult<LoggerProvider> {
    if config.endpoint.trim().is_empty() {
        return Err(AppError::config(
            "opentelemetry endpoint is required when exporting is enabled",
        ));
    }

    let exporter = LogExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.trim())
        .with_headers(auth_headers(config))
        .build()
        .map_err(|e| AppError::telemetry(format!("Failed to create log exporter: {}", e)))?;

    let mut resource = vec![KeyValue::new("service.name", config.package_name.clone())];
    resource.extend(attributes);

    Ok(LoggerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(resource))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn config(method: &str, header: &str) -> OpenTelemetryConfig {
        OpenTelemetryConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9428/insert/opentelemetry/v1/logs".to_string(),
            auth_method: method.to_string(),
            auth_token: Secret::new("t0ken".to_string()),
            auth_header: header.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stream_fields_always_present() {
        let headers = auth_headers(&config("", ""));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[STREAM_FIELDS_HEADER], STREAM_FIELDS);
    }

    #[test]
    fn test_bearer_and_basic() {
        let headers = auth_headers(&config("Bearer", ""));
        assert_eq!(headers["Authorization"], "Bearer t0ken");

        let headers = auth_headers(&config("BASIC", ""));
        assert_eq!(headers["Authorization"], "Basic t0ken");
    }

    #[test]
    fn test_custom_header() {
        let headers = auth_headers(&config("header", "X-Api-Key"));
        assert_eq!(headers["X-Api-Key"], "t0ken");
        assert!(!headers.contains_key("Authorization"));

        // 未指定请求头名时不写入令牌
        let headers = auth_headers(&config("header", ""));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_unknown_method_is_ignored() {
        let headers = auth_headers(&config("digest", ""));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_missing_endpoint() {
        let mut config = config("", "");
        config.endpoint = "  ".to_string();
        let err = build_provider(&config, Vec::new()).unwrap_err();
        assert!(err.is_config());
    }
}
