//! Configuration management for the routing proxy.

use std::{net::SocketAddr, path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Uri};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use pokeproxy_core::rules::{Predicate, Rule, RuleConfig};
use pokeproxy_delivery::ClientConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::middleware::rate_limit::RateLimit;

const CONFIG_FILE: &str = "pokeproxy.toml";

/// How matched rules are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Forward to the first matching rule and pass its response through.
    #[default]
    First,
    /// Forward to every matching rule and return an aggregate response.
    All,
}

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`pokeproxy.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// # Example
///
/// ```no_run
/// use pokeproxy_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Largest accepted request body in bytes.
    ///
    /// Environment variable: `MAX_PAYLOAD_BYTES`
    #[serde(default = "default_max_payload_bytes", alias = "MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: usize,

    // Routing
    /// Path to the JSON rules file.
    ///
    /// Environment variable: `POKEPROXY_CONFIG`
    #[serde(default, alias = "POKEPROXY_CONFIG")]
    pub pokeproxy_config: Option<String>,
    /// Base64 HMAC secret shared with the sender.
    ///
    /// Environment variable: `ENC_SECRET`
    #[serde(default, alias = "ENC_SECRET", skip_serializing)]
    pub enc_secret: Option<String>,
    /// First-match or all-matches dispatch.
    ///
    /// Environment variable: `MATCH_MODE`
    #[serde(default, alias = "MATCH_MODE")]
    pub match_mode: MatchMode,

    // Delivery
    /// Total timeout for one delivery in seconds.
    ///
    /// Environment variable: `DELIVERY_TIMEOUT_SECONDS`
    #[serde(default = "default_delivery_timeout", alias = "DELIVERY_TIMEOUT_SECONDS")]
    pub delivery_timeout_seconds: u64,
    /// Connect timeout for one delivery in seconds.
    ///
    /// Environment variable: `DELIVERY_CONNECT_TIMEOUT_SECONDS`
    #[serde(
        default = "default_delivery_connect_timeout",
        alias = "DELIVERY_CONNECT_TIMEOUT_SECONDS"
    )]
    pub delivery_connect_timeout_seconds: u64,

    // Rate limiting
    /// Quota for `/stream`, e.g. `100/minute`.
    ///
    /// Environment variable: `STREAM_RATE_LIMIT`
    #[serde(default = "default_stream_rate_limit", alias = "STREAM_RATE_LIMIT")]
    pub stream_rate_limit: String,
    /// Quota for every other route.
    ///
    /// Environment variable: `DEFAULT_RATE_LIMIT`
    #[serde(default = "default_rate_limit", alias = "DEFAULT_RATE_LIMIT")]
    pub default_rate_limit: String,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to delivery client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.delivery_timeout_seconds),
            connect_timeout: Duration::from_secs(self.delivery_connect_timeout_seconds),
            ..ClientConfig::default()
        }
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Parsed `/stream` quota.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota string is malformed.
    pub fn stream_quota(&self) -> Result<RateLimit> {
        self.stream_rate_limit.parse().context("Invalid stream_rate_limit")
    }

    /// Parsed default quota.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota string is malformed.
    pub fn default_quota(&self) -> Result<RateLimit> {
        self.default_rate_limit.parse().context("Invalid default_rate_limit")
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be greater than 0");
        }

        if self.delivery_timeout_seconds == 0 || self.delivery_connect_timeout_seconds == 0 {
            anyhow::bail!("delivery timeouts must be greater than 0");
        }

        if self.delivery_connect_timeout_seconds > self.delivery_timeout_seconds {
            anyhow::bail!("delivery_connect_timeout_seconds cannot exceed delivery_timeout_seconds");
        }

        self.stream_quota()?;
        self.default_quota()?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_payload_bytes: default_max_payload_bytes(),
            pokeproxy_config: None,
            enc_secret: None,
            match_mode: MatchMode::default(),
            delivery_timeout_seconds: default_delivery_timeout(),
            delivery_connect_timeout_seconds: default_delivery_connect_timeout(),
            stream_rate_limit: default_stream_rate_limit(),
            default_rate_limit: default_rate_limit(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024
}

fn default_delivery_timeout() -> u64 {
    pokeproxy_delivery::DEFAULT_TIMEOUT_SECONDS
}

fn default_delivery_connect_timeout() -> u64 {
    pokeproxy_delivery::DEFAULT_CONNECT_TIMEOUT_SECONDS
}

fn default_stream_rate_limit() -> String {
    "100/minute".to_string()
}

fn default_rate_limit() -> String {
    "120/minute".to_string()
}

fn default_log_level() -> String {
    "info,pokeproxy=debug,tower_http=debug".to_string()
}

/// On-disk rules file.
#[derive(Debug, Clone, Deserialize)]
struct RulesFile {
    rules: Vec<RuleConfig>,
}

/// Loads and validates the routing rules file.
///
/// Every rule needs an `http` or `https` URL and a reason usable as a header
/// value, and every predicate must parse and reference a known field. All problems are reported together.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or lists every
/// invalid rule.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file {}", path.display()))?;
    let file: RulesFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse rules file {}", path.display()))?;

    let problems = validate_rules(&file.rules);
    if !problems.is_empty() {
        anyhow::bail!("Invalid rules in {}:\n  {}", path.display(), problems.join("\n  "));
    }

    info!(path = %path.display(), count = file.rules.len(), "Loaded routing rules");
    Ok(file.rules.into_iter().map(Rule::from).collect())
}

fn validate_rules(rules: &[RuleConfig]) -> Vec<String> {
    let mut problems = Vec::new();

    for (i, rule) in rules.iter().enumerate() {
        let n = i + 1;
        match rule.url.parse::<Uri>() {
            Ok(uri) if matches!(uri.scheme_str(), Some("http" | "https")) => {},
            _ => problems.push(format!("rule #{n}: invalid url '{}'", rule.url)),
        }

        if HeaderValue::from_str(&rule.reason).is_err() {
            problems.push(format!("rule #{n}: reason {:?} is not a valid header value", rule.reason));
        }

        for (j, predicate) in rule.match_rules.iter().enumerate() {
            if let Err(e) = Predicate::compile(predicate) {
                problems.push(format!("rule #{n}, match #{}: {e}", j + 1));
            }
        }
    }

    problems
}
