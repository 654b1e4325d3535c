//! Integration configuration.
//!
//! # Two layers
//!
//! - [`BootstrapOptions`] is the raw input. It mirrors what hosts pass in
//!   (JSON or environment), including booleans given as `"true"`/`"false"`.
//! - [`Config`] is the parsed, validated form the middleware runs on. It is
//!   built once through [`Config::from_options`] or [`Config::from_env`] and
//!   never changes afterwards.
//!
//! Validation is eager: a missing gateway URL, CDN credential or log stream
//! fails here, before any request is served.
//!
//! # Environment variables
//!
//! - `GATEWAY_URL`, `MICROSERVICE_TOKEN`: required
//! - `REQUIRE_API_KEY`: `true`/`false` (default: `true`)
//! - `FASTLY_ENABLED`, `FASTLY_SERVICE_ID`, `FASTLY_API_KEY`
//! - `AWS_CLOUD_WATCH_LOGGING_ENABLED` (default: `true`), `AWS_REGION`,
//!   `AWS_CLOUD_WATCH_LOG_GROUP_NAME` (default: `api-keys-usage`),
//!   `AWS_CLOUD_WATCH_LOG_STREAM_NAME`
//! - `SKIP_API_KEY_ENDPOINTS`: `METHOD:regex` pairs, comma separated
//! - `UPSTREAM_TIMEOUT_MS`: timeout for outbound calls (default: none)
//! - `MAX_REQUEST_BODY_SIZE`: body buffering limit in bytes (default: 10MB)

use std::env;
use std::time::Duration;

use axum::http::Method;
use regex::Regex;
use serde::Deserialize;

use crate::error::{IntegrationError, IntegrationResult};

/// Log group used when none is configured.
pub const DEFAULT_LOG_GROUP: &str = "api-keys-usage";

/// Default limit for buffering request bodies during injection (10MB).
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Skip rules appended to every configuration.
///
/// The validation endpoint must be exempt, otherwise a gateway running this
/// middleware would call itself for every validation.
const BUILTIN_SKIP_RULES: [(&str, &str); 2] = [
    ("GET", "/healthcheck"),
    ("POST", "/api/v1/request/validate"),
];

/// A boolean as accepted at the configuration boundary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    /// Resolve to a real boolean. Only `true`, `false`, `"true"` and `"false"` are valid.
    pub fn parse(&self, name: &str) -> IntegrationResult<bool> {
        match self {
            Flag::Bool(value) => Ok(*value),
            Flag::Text(text) if text == "true" => Ok(true),
            Flag::Text(text) if text == "false" => Ok(false),
            Flag::Text(_) => Err(IntegrationError::Config(format!(
                "\"{name}\" needs to be a boolean"
            ))),
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Bool(value)
    }
}

/// Raw validation exemption: `{method, pathRegex}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRule {
    pub method: String,
    pub path_regex: String,
}

impl EndpointRule {
    pub fn new(method: impl Into<String>, path_regex: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path_regex: path_regex.into(),
        }
    }
}

/// Unvalidated configuration input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapOptions {
    #[serde(rename = "gatewayURL")]
    pub gateway_url: String,
    pub microservice_token: String,
    pub fastly_enabled: Option<Flag>,
    pub fastly_service_id: Option<String>,
    #[serde(rename = "fastlyAPIKey")]
    pub fastly_api_key: Option<String>,
    #[serde(rename = "requireAPIKey")]
    pub require_api_key: Option<Flag>,
    #[serde(default, rename = "skipAPIKeyRequirementEndpoints")]
    pub skip_api_key_requirement_endpoints: Vec<EndpointRule>,
    pub aws_cloud_watch_logging_enabled: Option<Flag>,
    pub aws_region: Option<String>,
    pub aws_cloud_watch_log_group_name: Option<String>,
    pub aws_cloud_watch_log_stream_name: Option<String>,
    pub upstream_timeout_ms: Option<u64>,
    pub max_request_body_size: Option<usize>,
}

/// Exemption from validation, matched on method and path.
#[derive(Debug, Clone)]
pub struct SkipRule {
    pub method: Method,
    /// Unanchored: matches anywhere in the path.
    pub path: Regex,
}

impl SkipRule {
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.path.is_match(path)
    }
}

/// CDN provider credentials. Present only when CDN signalling is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    pub service_id: String,
    pub api_key: String,
}

/// Audit log destination. Present only when audit logging is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub region: String,
    pub log_group: String,
    pub log_stream: String,
}

/// Validated integration configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway base URL, without trailing slash
    pub gateway_url: String,

    /// Bearer credential attached to every gateway/microservice call
    pub microservice_token: String,

    /// Whether inbound requests must carry an `x-api-key` header
    pub require_api_key: bool,

    /// Configured exemptions followed by the built-in ones
    pub skip_rules: Vec<SkipRule>,

    /// CDN signalling (None = disabled)
    pub cdn: Option<CdnConfig>,

    /// Usage audit logging (None = disabled)
    pub audit: Option<AuditConfig>,

    /// Timeout for every outbound call (None = wait indefinitely)
    pub upstream_timeout: Option<Duration>,

    /// Limit for buffering POST/PATCH/PUT bodies before injection
    pub max_request_body_size: usize,
}

impl Config {
    /// Parse and validate raw options.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Config` naming the first offending field.
    pub fn from_options(options: BootstrapOptions) -> IntegrationResult<Self> {
        let fastly_enabled = match &options.fastly_enabled {
            Some(flag) => flag.parse("fastlyEnabled")?,
            None => {
                return Err(IntegrationError::Config(
                    "\"fastlyEnabled\" needs to be a boolean".to_string(),
                ));
            }
        };
        let require_api_key = match &options.require_api_key {
            Some(flag) => flag.parse("requireAPIKey")?,
            None => true,
        };
        let logging_enabled = match &options.aws_cloud_watch_logging_enabled {
            Some(flag) => flag.parse("awsCloudWatchLoggingEnabled")?,
            None => true,
        };

        let gateway_url = non_empty(Some(options.gateway_url), "gatewayURL")?
            .trim_end_matches('/')
            .to_string();
        let microservice_token =
            non_empty(Some(options.microservice_token), "microserviceToken")?;

        let cdn = if fastly_enabled {
            Some(CdnConfig {
                service_id: non_empty(options.fastly_service_id, "fastlyServiceId")?,
                api_key: non_empty(options.fastly_api_key, "fastlyAPIKey")?,
            })
        } else {
            None
        };

        let audit = if logging_enabled {
            let log_group = options
                .aws_cloud_watch_log_group_name
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_GROUP.to_string());
            Some(AuditConfig {
                region: non_empty(options.aws_region, "awsRegion")?,
                log_group,
                log_stream: non_empty(
                    options.aws_cloud_watch_log_stream_name,
                    "awsCloudWatchLogStreamName",
                )?,
            })
        } else {
            None
        };

        let mut skip_rules = options
            .skip_api_key_requirement_endpoints
            .iter()
            .map(|rule| compile_skip_rule(&rule.method, &rule.path_regex))
            .collect::<IntegrationResult<Vec<_>>>()?;
        for (method, path) in BUILTIN_SKIP_RULES {
            skip_rules.push(compile_skip_rule(method, path)?);
        }

        let max_request_body_size = options
            .max_request_body_size
            .unwrap_or(DEFAULT_MAX_REQUEST_BODY_SIZE);
        if max_request_body_size == 0 {
            return Err(IntegrationError::Config(
                "\"maxRequestBodySize\" must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            gateway_url,
            microservice_token,
            require_api_key,
            skip_rules,
            cdn,
            audit,
            upstream_timeout: options.upstream_timeout_ms.map(Duration::from_millis),
            max_request_body_size,
        })
    }

    /// Load options from environment variables (and a `.env` file if present).
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Config` if a value cannot be parsed or the
    /// resulting options fail validation.
    pub fn from_env() -> IntegrationResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let options = BootstrapOptions {
            gateway_url: env::var("GATEWAY_URL").unwrap_or_default(),
            microservice_token: env::var("MICROSERVICE_TOKEN").unwrap_or_default(),
            fastly_enabled: env_flag("FASTLY_ENABLED"),
            fastly_service_id: env_opt("FASTLY_SERVICE_ID"),
            fastly_api_key: env_opt("FASTLY_API_KEY"),
            require_api_key: env_flag("REQUIRE_API_KEY"),
            skip_api_key_requirement_endpoints: parse_skip_endpoints(
                &env::var("SKIP_API_KEY_ENDPOINTS").unwrap_or_default(),
            )?,
            aws_cloud_watch_logging_enabled: env_flag("AWS_CLOUD_WATCH_LOGGING_ENABLED"),
            aws_region: env_opt("AWS_REGION"),
            aws_cloud_watch_log_group_name: env_opt("AWS_CLOUD_WATCH_LOG_GROUP_NAME"),
            aws_cloud_watch_log_stream_name: env_opt("AWS_CLOUD_WATCH_LOG_STREAM_NAME"),
            upstream_timeout_ms: parse_env_opt("UPSTREAM_TIMEOUT_MS")?,
            max_request_body_size: parse_env_opt("MAX_REQUEST_BODY_SIZE")?,
        };

        Self::from_options(options)
    }

    /// Check whether a request is exempt from validation.
    pub fn should_skip_validation(&self, method: &Method, path: &str) -> bool {
        self.skip_rules.iter().any(|rule| rule.matches(method, path))
    }

    pub fn cdn_enabled(&self) -> bool {
        self.cdn.is_some()
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit.is_some()
    }
}

/// Listener settings for the demo service binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Server host address (default: "0.0.0.0")
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl ServerSettings {
    pub fn from_env() -> IntegrationResult<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env_opt("PORT")?.unwrap_or(3000),
            metrics_port: parse_env_opt("METRICS_PORT")?.unwrap_or(9090),
        })
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the metrics endpoint address, or `None` if metrics are disabled.
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        (self.metrics_port > 0)
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            metrics_port: 9090,
        }
    }
}

fn non_empty(value: Option<String>, name: &str) -> IntegrationResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| IntegrationError::Config(format!("\"{name}\" cannot be empty")))
}

fn compile_skip_rule(method: &str, path: &str) -> IntegrationResult<SkipRule> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| IntegrationError::Config(format!("Invalid skip rule method {method}: {e}")))?;
    let path = Regex::new(path)
        .map_err(|e| IntegrationError::Config(format!("Invalid skip rule pattern {path}: {e}")))?;
    Ok(SkipRule { method, path })
}

/// Parse `METHOD:regex` pairs separated by commas.
fn parse_skip_endpoints(raw: &str) -> IntegrationResult<Vec<EndpointRule>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(method, path)| EndpointRule::new(method.trim(), path.trim()))
                .ok_or_else(|| {
                    IntegrationError::Config(format!(
                        "Invalid SKIP_API_KEY_ENDPOINTS entry '{entry}', expected METHOD:regex"
                    ))
                })
        })
        .collect()
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> Option<Flag> {
    env_opt(name).map(Flag::Text)
}

fn parse_env_opt<T>(name: &str) -> IntegrationResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(name)
        .map(|val| {
            val.parse()
                .map_err(|e| IntegrationError::Config(format!("Invalid {name}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn minimal() -> BootstrapOptions {
        BootstrapOptions {
            gateway_url: "https://gateway.test/".to_string(),
            microservice_token: "ms-token".to_string(),
            fastly_enabled: Some(false.into()),
            aws_cloud_watch_logging_enabled: Some(false.into()),
            ..BootstrapOptions::default()
        }
    }

    fn config_error(options: BootstrapOptions) -> String {
        Config::from_options(options).unwrap_err().to_string()
    }

    #[test]
    fn test_minimal_options_defaults() {
        let config = Config::from_options(minimal()).unwrap();

        assert_eq!(config.gateway_url, "https://gateway.test");
        assert!(config.require_api_key);
        assert!(!config.cdn_enabled());
        assert!(!config.audit_enabled());
        assert!(config.upstream_timeout.is_none());
        assert_eq!(config.max_request_body_size, DEFAULT_MAX_REQUEST_BODY_SIZE);
        assert_eq!(config.skip_rules.len(), 2);
    }

    #[test]
    fn test_string_flags_are_coerced() {
        let config = Config::from_options(BootstrapOptions {
            fastly_enabled: Some(Flag::Text("true".to_string())),
            fastly_service_id: Some("svc".to_string()),
            fastly_api_key: Some("key".to_string()),
            require_api_key: Some(Flag::Text("false".to_string())),
            ..minimal()
        })
        .unwrap();

        assert!(!config.require_api_key);
        assert_eq!(
            config.cdn,
            Some(CdnConfig {
                service_id: "svc".to_string(),
                api_key: "key".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_flag_text_rejected() {
        let err = config_error(BootstrapOptions {
            require_api_key: Some(Flag::Text("yes".to_string())),
            ..minimal()
        });
        assert!(err.contains("requireAPIKey"));
    }

    #[test]
    fn test_missing_fastly_flag_rejected() {
        let err = config_error(BootstrapOptions {
            fastly_enabled: None,
            ..minimal()
        });
        assert!(err.contains("fastlyEnabled"));
    }

    #[test]
    fn test_empty_gateway_url_rejected() {
        let err = config_error(BootstrapOptions {
            gateway_url: String::new(),
            ..minimal()
        });
        assert!(err.contains("gatewayURL"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = config_error(BootstrapOptions {
            microservice_token: String::new(),
            ..minimal()
        });
        assert!(err.contains("microserviceToken"));
    }

    #[test]
    fn test_cdn_requires_both_credentials() {
        let err = config_error(BootstrapOptions {
            fastly_enabled: Some(true.into()),
            fastly_api_key: Some("key".to_string()),
            ..minimal()
        });
        assert!(err.contains("fastlyServiceId"));

        let err = config_error(BootstrapOptions {
            fastly_enabled: Some(true.into()),
            fastly_service_id: Some("svc".to_string()),
            ..minimal()
        });
        assert!(err.contains("fastlyAPIKey"));
    }

    #[test]
    fn test_logging_enabled_by_default_requires_region_and_stream() {
        let err = config_error(BootstrapOptions {
            aws_cloud_watch_logging_enabled: None,
            aws_cloud_watch_log_stream_name: Some("stream".to_string()),
            ..minimal()
        });
        assert!(err.contains("awsRegion"));

        let err = config_error(BootstrapOptions {
            aws_cloud_watch_logging_enabled: None,
            aws_region: Some("us-east-1".to_string()),
            ..minimal()
        });
        assert!(err.contains("awsCloudWatchLogStreamName"));
    }

    #[test]
    fn test_logging_defaults_group_name() {
        let config = Config::from_options(BootstrapOptions {
            aws_cloud_watch_logging_enabled: Some(true.into()),
            aws_region: Some("us-east-1".to_string()),
            aws_cloud_watch_log_stream_name: Some("svc-stream".to_string()),
            ..minimal()
        })
        .unwrap();

        assert_eq!(
            config.audit,
            Some(AuditConfig {
                region: "us-east-1".to_string(),
                log_group: DEFAULT_LOG_GROUP.to_string(),
                log_stream: "svc-stream".to_string(),
            })
        );
    }

    #[test]
    fn test_builtin_skip_rules() {
        let config = Config::from_options(minimal()).unwrap();

        assert!(config.should_skip_validation(&Method::GET, "/healthcheck"));
        assert!(config.should_skip_validation(&Method::POST, "/api/v1/request/validate"));
        assert!(!config.should_skip_validation(&Method::POST, "/healthcheck"));
        assert!(!config.should_skip_validation(&Method::GET, "/api/v1/dataset"));
    }

    #[test]
    fn test_custom_skip_rule_is_regex() {
        let config = Config::from_options(BootstrapOptions {
            skip_api_key_requirement_endpoints: vec![EndpointRule::new(
                "get",
                "^/api/v1/public/.*$",
            )],
            ..minimal()
        })
        .unwrap();

        assert!(config.should_skip_validation(&Method::GET, "/api/v1/public/widgets"));
        assert!(!config.should_skip_validation(&Method::GET, "/api/v1/private/widgets"));
        assert_eq!(config.skip_rules.len(), 3);
    }

    #[test]
    fn test_invalid_skip_regex_rejected() {
        let err = config_error(BootstrapOptions {
            skip_api_key_requirement_endpoints: vec![EndpointRule::new("GET", "(")],
            ..minimal()
        });
        assert!(err.contains("Invalid skip rule pattern"));
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let err = config_error(BootstrapOptions {
            max_request_body_size: Some(0),
            ..minimal()
        });
        assert!(err.contains("maxRequestBodySize"));
    }

    #[test]
    fn test_deserialize_from_json_options() {
        let options: BootstrapOptions = serde_json::from_value(serde_json::json!({
            "gatewayURL": "https://gateway.test",
            "microserviceToken": "tok",
            "fastlyEnabled": "false",
            "requireAPIKey": false,
            "awsCloudWatchLoggingEnabled": "false",
            "skipAPIKeyRequirementEndpoints": [{"method": "GET", "pathRegex": "/docs"}]
        }))
        .unwrap();

        let config = Config::from_options(options).unwrap();
        assert!(!config.require_api_key);
        assert!(config.should_skip_validation(&Method::GET, "/docs"));
    }

    #[test]
    fn test_parse_skip_endpoints() {
        let rules = parse_skip_endpoints("GET:/a, POST:^/b$ ,").unwrap();
        assert_eq!(
            rules,
            vec![EndpointRule::new("GET", "/a"), EndpointRule::new("POST", "^/b$")]
        );

        assert!(parse_skip_endpoints("no-separator").is_err());
        assert!(parse_skip_endpoints("").unwrap().is_empty());
    }

    #[test]
    fn test_server_addr_format() {
        let settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..ServerSettings::default()
        };
        assert_eq!(settings.server_addr(), "127.0.0.1:8080");
        assert!(settings.metrics_addr().is_some());

        let settings = ServerSettings {
            metrics_port: 0,
            ..ServerSettings::default()
        };
        assert!(settings.metrics_addr().is_none());
    }
}
