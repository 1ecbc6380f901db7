use config::{Config, ConfigError, Environment, File};
use notify_email::EmailConfig;
use notify_sms::SmsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Environment variables understood for compatibility with existing deployments,
/// mapped to their configuration keys. They take precedence over every other source.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("HELLOSMS_USERNAME", "sms.username"),
    ("HELLOSMS_PASSWORD", "sms.password"),
    ("HELLOSMS_SENDER", "sms.sender"),
    ("HELLOSMS_TIMEOUT", "sms.timeout_secs"),
    ("HELLOSMS_MAX_RETRIES", "sms.max_retries"),
    ("HELLOSMS_API_URL", "sms.api_url"),
    ("HELLOSMS_MAX_LENGTH", "sms.max_message_length"),
    ("HELLOSMS_RATE_LIMIT", "sms.rate_limit"),
    ("SMTP_SERVER", "email.smtp_server"),
    ("SMTP_PORT", "email.smtp_port"),
    ("SMTP_USERNAME", "email.username"),
    ("SMTP_PASSWORD", "email.password"),
    ("EMAIL_SENDER", "email.sender"),
    ("SMTP_MAX_RETRIES", "email.max_retries"),
    ("SMTP_RETRY_DELAY", "email.retry_delay_secs"),
    ("SMTP_ACCEPT_INVALID_CERTS", "email.accept_invalid_certs"),
];

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// SMS channel configuration
    pub sms: SmsConfig,
    /// Email channel configuration
    pub email: EmailConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive (default: notifykit, notify_sms, notify_email and audit at info)
    pub level: String,
    /// Directory for the daily log files (default: logs)
    pub directory: String,
    /// File name prefix; the date is appended on rotation (default: notify-relay.log)
    pub file_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::DEFAULT_LOG_FILTER.to_string(),
            directory: "logs".to_string(),
            file_name: "notify-relay.log".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(env::vars().collect())
    }

    /// Load configuration from files and the given environment snapshot
    pub fn load_from(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let run_mode = vars
            .get("RUN_MODE")
            .cloned()
            .unwrap_or_else(|| "development".into());

        let mut builder = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with NOTIFY__)
            .add_source(
                Environment::with_prefix("NOTIFY")
                    .separator("__")
                    .source(Some(vars.clone())),
            );

        for (var, key) in LEGACY_ENV {
            builder = builder.set_override_option(*key, vars.get(*var).cloned())?;
        }

        builder.build()?.try_deserialize()
    }
}
