//! Configuration module
//!
//! All recognised settings are enumerated here and validated once at startup.
//! `Config::from_env()` reads an optional `.env` file plus the process
//! environment; `Config::from_lookup()` performs the same parsing against any
//! key source, which keeps tests away from process-global state.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::models::{ImageKind, Threshold};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_APP_NAME: &str = "Vision Gate API";
const DEFAULT_DETECTOR_MODEL: &str = "yolov8n.pt";
const DEFAULT_CLASSIFIER_MODEL: &str = "Falconsai/nsfw_image_detection";
const DEFAULT_CONFIDENCE: f64 = 0.25;
const DEFAULT_IOU: f64 = 0.45;
const DEFAULT_MODERATION_THRESHOLD: f64 = 0.7;
const DEFAULT_SAFE_CATEGORIES: &str = "normal,safe";
const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "jpg,jpeg,png,bmp,webp";
const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 10_000;
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_TRUSTED_PROXY_COUNT: usize = 0;
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INFERENCE_MAX_CONCURRENCY: usize = 4;
const DEFAULT_INFERENCE_QUEUE_DEPTH: usize = 64;
const DEFAULT_BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Startup configuration failure. Never produced while serving requests.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Inconsistent(String),
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub environment: String,
    pub app_name: String,
    pub app_version: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub detector_model: String,
    pub detector_url: Option<String>,
    pub classifier_model: String,
    pub classifier_url: Option<String>,
    pub confidence_threshold: f64,
    pub iou_threshold: f64,
    pub moderation_threshold: Threshold,
    /// Lower-cased category names that never count towards the unsafe score.
    pub safe_categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,
    /// Lower-cased extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    pub max_image_dimension: u32,
    pub body_limit_slack: usize,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u32,
    pub window: Duration,
    pub trusted_proxy_count: usize,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Normalised tracing directive (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub timeout: Duration,
    pub max_concurrency: usize,
    pub queue_depth: usize,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub upload: UploadConfig,
    pub rate_limit: RateLimitConfig,
    pub observability: ObservabilityConfig,
    pub inference: InferenceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse and validate configuration from an arbitrary key source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let src = Source(&lookup);

        let environment = src.string_or("ENVIRONMENT", "development");
        let server = ServerConfig {
            host: src.parse_or("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: src.parse_or("PORT", DEFAULT_PORT)?,
            app_name: src.non_empty_or("APP_NAME", DEFAULT_APP_NAME)?,
            app_version: src.non_empty_or("APP_VERSION", env!("CARGO_PKG_VERSION"))?,
            cors_origins: split_list(&src.string_or("CORS_ORIGINS", "*")),
            environment,
        };
        if server.port == 0 {
            return Err(ConfigError::invalid("PORT", "0", "must be between 1 and 65535"));
        }

        let models = ModelConfig {
            detector_model: src.non_empty_or("DETECTOR_MODEL", DEFAULT_DETECTOR_MODEL)?,
            detector_url: src.url("DETECTOR_URL")?,
            classifier_model: src.non_empty_or("CLASSIFIER_MODEL", DEFAULT_CLASSIFIER_MODEL)?,
            classifier_url: src.url("CLASSIFIER_URL")?,
            confidence_threshold: src.unit_interval("CONFIDENCE_THRESHOLD", DEFAULT_CONFIDENCE)?,
            iou_threshold: src.unit_interval("IOU_THRESHOLD", DEFAULT_IOU)?,
            moderation_threshold: {
                let raw: f64 = src.parse_or("MODERATION_THRESHOLD", DEFAULT_MODERATION_THRESHOLD)?;
                Threshold::new(raw).map_err(|e| {
                    ConfigError::invalid("MODERATION_THRESHOLD", &raw.to_string(), e.to_string())
                })?
            },
            safe_categories: {
                let raw = src.string_or("MODERATION_SAFE_CATEGORIES", DEFAULT_SAFE_CATEGORIES);
                let list: Vec<String> = split_list(&raw)
                    .into_iter()
                    .map(|s| s.to_lowercase())
                    .collect();
                if list.is_empty() {
                    return Err(ConfigError::invalid(
                        "MODERATION_SAFE_CATEGORIES",
                        &raw,
                        "at least one category is required",
                    ));
                }
                list
            },
        };

        let upload = UploadConfig {
            max_file_size: src.positive("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            allowed_extensions: {
                let raw = src.string_or("ALLOWED_EXTENSIONS", DEFAULT_ALLOWED_EXTENSIONS);
                let list: Vec<String> = split_list(&raw)
                    .into_iter()
                    .map(|s| s.trim_start_matches('.').to_lowercase())
                    .collect();
                if list.is_empty() {
                    return Err(ConfigError::invalid(
                        "ALLOWED_EXTENSIONS",
                        &raw,
                        "at least one extension is required",
                    ));
                }
                if let Some(unknown) = list.iter().find(|e| ImageKind::from_extension(e).is_none())
                {
                    return Err(ConfigError::invalid(
                        "ALLOWED_EXTENSIONS",
                        &raw,
                        format!("unknown image extension '{}'", unknown),
                    ));
                }
                list
            },
            max_image_dimension: src.positive("MAX_IMAGE_DIMENSION", DEFAULT_MAX_IMAGE_DIMENSION)?,
            body_limit_slack: src.parse_or("REQUEST_BODY_LIMIT_SLACK", DEFAULT_BODY_LIMIT_SLACK)?,
        };

        let rate_limit = RateLimitConfig {
            enabled: src.boolean("RATE_LIMIT_ENABLED", true)?,
            requests: src.positive("RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS)?,
            window: Duration::from_secs(
                src.positive("RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?,
            ),
            trusted_proxy_count: src.parse_or("TRUSTED_PROXY_COUNT", DEFAULT_TRUSTED_PROXY_COUNT)?,
        };

        let observability = ObservabilityConfig {
            log_level: parse_log_level(&src.string_or("LOG_LEVEL", "info"))?,
            log_format: match src.string_or("LOG_FORMAT", "json").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" | "compact" => LogFormat::Pretty,
                other => {
                    return Err(ConfigError::invalid(
                        "LOG_FORMAT",
                        other,
                        "expected 'json' or 'pretty'",
                    ))
                }
            },
            metrics_enabled: src.boolean("METRICS_ENABLED", true)?,
        };

        let inference = InferenceConfig {
            timeout: Duration::from_secs(
                src.positive("INFERENCE_TIMEOUT_SECS", DEFAULT_INFERENCE_TIMEOUT_SECS)?,
            ),
            max_concurrency: src
                .positive("INFERENCE_MAX_CONCURRENCY", DEFAULT_INFERENCE_MAX_CONCURRENCY)?,
            queue_depth: src.parse_or("INFERENCE_QUEUE_DEPTH", DEFAULT_INFERENCE_QUEUE_DEPTH)?,
        };

        let config = Config {
            server,
            models,
            upload,
            rate_limit,
            observability,
            inference,
        };
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that cannot be expressed per key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.server.cors_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::Inconsistent(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Transport-level body cap: the file limit plus room for the multipart envelope.
    pub fn request_body_limit(&self) -> usize {
        self.upload
            .max_file_size
            .saturating_add(self.upload.body_limit_slack)
    }
}

struct Source<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Source<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn non_empty_or(&self, key: &'static str, default: &str) -> Result<String, ConfigError> {
        let value = self.string_or(key, default);
        if value.is_empty() {
            return Err(ConfigError::invalid(key, &value, "must not be empty"));
        }
        Ok(value)
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, &raw, e.to_string())),
            None => Ok(default),
        }
    }

    fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let value = self.parse_or(key, default)?;
        if value <= T::default() {
            return Err(ConfigError::invalid(
                key,
                &value.to_string(),
                "must be greater than zero",
            ));
        }
        Ok(value)
    }

    fn unit_interval(&self, key: &'static str, default: f64) -> Result<f64, ConfigError> {
        let value: f64 = self.parse_or(key, default)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::invalid(
                key,
                &value.to_string(),
                "must be between 0 and 1",
            ));
        }
        Ok(value)
    }

    fn boolean(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(key, &raw, "expected a boolean")),
            },
        }
    }

    fn url(&self, key: &'static str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) if raw.starts_with("http://") || raw.starts_with("https://") => {
                Ok(Some(raw.trim_end_matches('/').to_string()))
            }
            Some(raw) => Err(ConfigError::invalid(key, &raw, "expected an http(s) URL")),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_log_level(raw: &str) -> Result<String, ConfigError> {
    let level = match raw.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        _ => {
            return Err(ConfigError::invalid(
                "LOG_LEVEL",
                raw,
                "expected one of trace, debug, info, warn, error",
            ))
        }
    };
    Ok(level.to_string())
}
