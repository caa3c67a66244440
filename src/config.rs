use crate::power::{PowerSpecs, Tariff};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DbConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub power: PowerSpecs,
    #[serde(default)]
    pub tariff: Tariff,
    /// Optional Kafka/Redpanda ingress; only used with the `redpanda` feature
    #[serde(default)]
    pub redpanda: Option<RedpandaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// "memory" | "postgres"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_backend() -> String {
    "memory".into()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for a single ledger call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Readings further apart than this are not integrated
    #[serde(default = "default_max_gap_hours")]
    pub max_gap_hours: f64,
    /// Integrate the first reading after a rollover even across a large gap
    #[serde(default = "default_new_day_override")]
    pub new_day_override: bool,
    #[serde(default = "default_ingress_buffer")]
    pub ingress_buffer: usize,
}

fn default_history_capacity() -> usize {
    20
}

fn default_max_gap_hours() -> f64 {
    1.0
}

fn default_new_day_override() -> bool {
    true
}

fn default_ingress_buffer() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            max_gap_hours: default_max_gap_hours(),
            new_day_override: default_new_day_override(),
            ingress_buffer: default_ingress_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    pub brokers: String,
    pub topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Offset reset strategy: "earliest", "latest", or "none"
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
}

fn default_group_id() -> String {
    "motor-energy-ledger".into()
}

fn default_auto_offset_reset() -> String {
    "latest".into()
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Afterwards, if DATABASE_URL env is set, override `database.url`.
    /// If REDPANDA_BROKERS env is set, override `redpanda.brokers`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }
        if let Ok(brokers) = std::env::var("REDPANDA_BROKERS") {
            if let Some(redpanda) = cfg.redpanda.as_mut() {
                redpanda.brokers = brokers;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(
            self.ledger.backend == "memory" || self.ledger.backend == "postgres",
            "ledger.backend must be 'memory' or 'postgres', got '{}'",
            self.ledger.backend
        );
        if self.ledger.backend == "postgres" {
            anyhow::ensure!(
                !self.database.url.is_empty(),
                "ledger backend 'postgres' requires database.url (or DATABASE_URL)"
            );
        }
        anyhow::ensure!(
            self.ledger.retry.max_attempts >= 1,
            "ledger.retry.max_attempts must be at least 1"
        );
        anyhow::ensure!(
            self.engine.history_capacity >= 1,
            "engine.history_capacity must be at least 1"
        );
        anyhow::ensure!(
            self.engine.ingress_buffer >= 1,
            "engine.ingress_buffer must be at least 1"
        );
        anyhow::ensure!(
            self.engine.max_gap_hours > 0.0,
            "engine.max_gap_hours must be positive"
        );
        anyhow::ensure!(self.power.max_pwm > 0.0, "power.max_pwm must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.power.min_effective_duty_fraction),
            "power.min_effective_duty_fraction must be within [0, 1]"
        );
        anyhow::ensure!(
            self.power.max_power_watts >= 0.0,
            "power.max_power_watts must not be negative"
        );
        anyhow::ensure!(
            self.tariff.per_kwh >= 0.0,
            "tariff.per_kwh must not be negative"
        );
        if let Some(redpanda) = &self.redpanda {
            anyhow::ensure!(
                !redpanda.brokers.is_empty() && !redpanda.topic.is_empty(),
                "redpanda.brokers and redpanda.topic cannot be empty"
            );
        }
        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$".
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
            }
            Some(open @ ('(' | '{')) => {
                it.next();
                let close = if open == '(' { ')' } else { '}' };
                let var = read_until(&mut it, close)
                    .with_context(|| format!("unterminated env placeholder: missing '{close}'"))?;
                let val = std::env::var(&var)
                    .with_context(|| format!("missing environment variable: {}", var))?;
                out.push_str(&val);
            }
            _ => out.push('$'),
        }
    }

    Ok(out)
}

/// Read characters until `end`, consuming the closing delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
