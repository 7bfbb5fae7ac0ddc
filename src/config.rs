use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::optimizer::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
    pub recommender: RecommenderConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
            recommender: RecommenderConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PACKFIT_API_HOST";
    const PORT_VAR: &'static str = "PACKFIT_API_PORT";

    fn from_env() -> Self {
        let host_value = env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    error = %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(var = Self::PORT_VAR, "port must not be 0, using {}", Self::DEFAULT_PORT);
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        var = Self::PORT_VAR,
                        value = %raw,
                        error = %err,
                        "could not parse port, using {}",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Defaults for optimization requests.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
    apply_payload_restriction: bool,
    default_quantity: u64,
}

impl OptimizerConfig {
    pub const DEFAULT_APPLY_PAYLOAD_RESTRICTION: bool = true;
    pub const DEFAULT_QUANTITY: u64 = 500;
    const GENERAL_EPSILON_VAR: &'static str = "PACKFIT_GENERAL_EPSILON";
    const APPLY_PAYLOAD_VAR: &'static str = "PACKFIT_APPLY_PAYLOAD_RESTRICTION";
    const DEFAULT_QUANTITY_VAR: &'static str = "PACKFIT_DEFAULT_QUANTITY";

    fn from_env() -> Self {
        let general_epsilon = load_f64_with_warning(
            Self::GENERAL_EPSILON_VAR,
            PackingConfig::DEFAULT_GENERAL_EPSILON,
            |value| value > 0.0 && value < 1e-3,
            "must be between 0 and 0.001",
            "adjusted tolerance may change unit counts at exact multiples",
        );

        let apply_payload_restriction = env_string(Self::APPLY_PAYLOAD_VAR)
            .and_then(|raw| parse_bool(&raw, Self::APPLY_PAYLOAD_VAR))
            .unwrap_or(Self::DEFAULT_APPLY_PAYLOAD_RESTRICTION);

        let default_quantity = load_u64_with_warning(
            Self::DEFAULT_QUANTITY_VAR,
            Self::DEFAULT_QUANTITY,
            |value| value > 0,
            "must be greater than 0",
        );

        Self {
            packing: PackingConfig::builder()
                .general_epsilon(general_epsilon)
                .build(),
            apply_payload_restriction,
            default_quantity,
        }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Whether requests that omit the flag honor payload capacity.
    pub fn apply_payload_restriction(&self) -> bool {
        self.apply_payload_restriction
    }

    /// Shipment quantity used when a request omits it.
    pub fn default_quantity(&self) -> u64 {
        self.default_quantity
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            packing: PackingConfig::default(),
            apply_payload_restriction: Self::DEFAULT_APPLY_PAYLOAD_RESTRICTION,
            default_quantity: Self::DEFAULT_QUANTITY,
        }
    }
}

/// Connection settings for the box recommendation service.
///
/// Without an endpoint every recommendation is the static fallback.
#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    endpoint: Option<String>,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
}

impl RecommenderConfig {
    pub const DEFAULT_MODEL: &'static str = "gemini-1.5-pro";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
    const URL_VAR: &'static str = "PACKFIT_RECOMMENDER_URL";
    const API_KEY_VAR: &'static str = "PACKFIT_RECOMMENDER_API_KEY";
    const MODEL_VAR: &'static str = "PACKFIT_RECOMMENDER_MODEL";
    const TIMEOUT_VAR: &'static str = "PACKFIT_RECOMMENDER_TIMEOUT_SECS";

    fn from_env() -> Self {
        let endpoint = env_string(Self::URL_VAR);
        if endpoint.is_none() {
            info!("{} not set, box recommendations use the fallback", Self::URL_VAR);
        }

        Self {
            endpoint,
            api_key: env_string(Self::API_KEY_VAR),
            model: env_string(Self::MODEL_VAR).unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            timeout_secs: load_u64_with_warning(
                Self::TIMEOUT_VAR,
                Self::DEFAULT_TIMEOUT_SECS,
                |value| (1..=300).contains(&value),
                "must be between 1 and 300",
            ),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: Self::DEFAULT_MODEL.to_string(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(var = name, error = %err, "environment access failed, using default value");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                var = var_name,
                value = other,
                "could not interpret value as boolean, using default value"
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(var = var_name, value = %raw, "{invalid_hint}, using {default}");
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        warn!(var = var_name, value, "{warning}");
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    var = var_name,
                    value = %raw,
                    error = %err,
                    "could not parse number, using {default}"
                );
                default
            }
        },
        None => default,
    }
}

fn load_u64_with_warning(
    var_name: &str,
    default: u64,
    validator: impl Fn(u64) -> bool,
    invalid_hint: &str,
) -> u64 {
    let Some(raw) = env_string(var_name) else {
        return default;
    };
    match raw.parse::<u64>() {
        Ok(value) if validator(value) => value,
        Ok(_) => {
            warn!(var = var_name, value = %raw, "{invalid_hint}, using {default}");
            default
        }
        Err(err) => {
            warn!(
                var = var_name,
                value = %raw,
                error = %err,
                "could not parse integer, using {default}"
            );
            default
        }
    }
}
