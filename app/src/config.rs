use brsense_core::DecoderConfig;
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;

/// Globalstar gateway addresses plus loopback
pub const DEFAULT_ALLOWED_IPS: [&str; 5] = [
    "3.228.87.237",
    "34.231.245.76",
    "3.135.136.171",
    "3.133.245.206",
    "127.0.0.1",
];

pub struct Config {
    database_url: Option<String>,
    server_port: u16,
    log_level: String,
    otel_stdout: bool,
    uplink_shared_token: Option<String>,
    uplink_allowed_ips: Vec<String>,
    uplink_trusted_proxies: Vec<String>,
    max_uplink_bytes: u64,
    db_max_connections: u32,
    decoder_timezone: Tz,
    warnings: Vec<String>,
}

impl Config {
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn otel_stdout(&self) -> bool {
        self.otel_stdout
    }

    pub fn uplink_shared_token(&self) -> Option<&str> {
        self.uplink_shared_token.as_deref()
    }

    pub fn uplink_allowed_ips(&self) -> &[String] {
        &self.uplink_allowed_ips
    }

    /// Peers whose `cf-connecting-ip`/`x-forwarded-for` headers are believed
    pub fn uplink_trusted_proxies(&self) -> &[String] {
        &self.uplink_trusted_proxies
    }

    pub fn max_uplink_bytes(&self) -> u64 {
        self.max_uplink_bytes
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            timezone: self.decoder_timezone,
            ..DecoderConfig::default()
        }
    }

    /// Values that were present but unusable. Collected while loading, since
    /// logging is not set up yet at that point.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let parsed = |key: &str, default: String| -> String {
            match lookup(key).map(|v| v.trim().to_owned()) {
                Some(value) if !value.is_empty() => value,
                _ => default,
            }
        };

        let database_url = Some(parsed("DATABASE_URL", String::new())).filter(|v| !v.is_empty());
        let log_level = parsed("LOG_LEVEL", "info".to_owned());
        let uplink_shared_token =
            Some(parsed("UPLINK_SHARED_TOKEN", String::new())).filter(|v| !v.is_empty());
        let uplink_allowed_ips = parse_list(&lookup, "UPLINK_ALLOWED_IPS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_IPS.iter().map(|s| s.to_string()).collect());
        let uplink_trusted_proxies =
            parse_list(&lookup, "UPLINK_TRUSTED_PROXIES").unwrap_or_default();

        let server_port = parse_or(&lookup, "SERVER_PORT", 8000, &mut warnings);
        let otel_stdout = parse_or(&lookup, "OTEL_STDOUT", false, &mut warnings);
        let max_uplink_bytes = parse_or(&lookup, "MAX_UPLINK_BYTES", 64 * 1024, &mut warnings);
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5, &mut warnings);
        let decoder_timezone = parse_or(&lookup, "DECODER_TIMEZONE", Tz::UTC, &mut warnings);

        Config {
            database_url,
            server_port,
            log_level,
            otel_stdout,
            uplink_shared_token,
            uplink_allowed_ips,
            uplink_trusted_proxies,
            max_uplink_bytes,
            db_max_connections,
            decoder_timezone,
            warnings,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T, warnings: &mut Vec<String>) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            warnings.push(format!("Invalid {}={}, using default", key, raw));
            default
        }),
        _ => default,
    }
}

fn parse_list<F>(lookup: &F, key: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(list) if !list.trim().is_empty() => Some(
            list.split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv::dotenv().ok();
    Config::from_lookup(|key| env::var(key).ok())
});
