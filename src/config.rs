use std::env;
use std::string::String;

const DEFAULT_STATSD_HOST: &str = "127.0.0.1";
const DEFAULT_STATSD_PORT: &str = "8125";
const DEFAULT_METRIC_PREFIX: &str = "sendgrid.event.";
const DEFAULT_SERVER_PORT: &str = "8080";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub statsd_host: String,
    pub statsd_port: u16,
    pub metric_prefix: String,
    pub server_port: u16,
    pub basic_auth_username: String,
    pub basic_auth_password: String,
    // clamped to [0, 1]
    pub sample_rate: f64,
}

/// Username/password pair required on `/webhook`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// empty values count as unset
fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn load_from_env() -> Result<Config, String> {
        let statsd_port = var_or("DOGSTATSD_PORT", DEFAULT_STATSD_PORT)
            .parse::<u16>()
            .map_err(|e| format!("Error parsing DOGSTATSD_PORT to u16 - {}", e))?;
        let server_port = var_or("PORT", DEFAULT_SERVER_PORT)
            .parse::<u16>()
            .map_err(|e| format!("Error parsing PORT to u16 - {}", e))?;
        let sample_rate = var_or("SAMPLE_RATE", "1.0")
            .parse::<f64>()
            .map_err(|e| format!("Error parsing SAMPLE_RATE to f64 - {}", e))?;
        if sample_rate.is_nan() {
            return Err("SAMPLE_RATE must be a number between 0 and 1".to_string());
        }

        Ok(Config {
            statsd_host: var_or("DOGSTATSD_HOST", DEFAULT_STATSD_HOST),
            statsd_port,
            metric_prefix: var_or("METRIC_PREFIX", DEFAULT_METRIC_PREFIX),
            server_port,
            basic_auth_username: env::var("BASIC_AUTH_USERNAME").unwrap_or_default(),
            basic_auth_password: env::var("BASIC_AUTH_PASSWORD").unwrap_or_default(),
            sample_rate: sample_rate.clamp(0.0, 1.0),
        })
    }

    pub fn statsd_addr(&self) -> String {
        format!("{}:{}", self.statsd_host, self.statsd_port)
    }

    /// Basic auth is enforced only when both username and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.basic_auth_username.is_empty() || self.basic_auth_password.is_empty() {
            return None;
        }
        Some(Credentials {
            username: self.basic_auth_username.clone(),
            password: self.basic_auth_password.clone(),
        })
    }
}
