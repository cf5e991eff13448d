//! Core runtime types: configuration and logging setup

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ================================
// Configuration Types
// ================================

/// Compute units granted per declared instruction when sizing the budget
pub const DEFAULT_INSTRUCTION_COMPUTE_UNITS: u64 = 200_000;

/// Hard ceiling on a single transaction's compute budget
pub const MAX_COMPUTE_UNIT_LIMIT: u64 = 1_400_000;

/// Maximum number of declared instructions accepted in one transaction
pub const MAX_DECLARED_INSTRUCTIONS: usize = 64;

/// Flat cost charged when a script instruction hands control to the engine
pub const SCRIPT_INVOCATION_COMPUTE_UNITS: u64 = 1_000;

const ENV_PREFIX: &str = "SCRIPT_RUNTIME_";

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on the declared instruction vector length
    pub max_declared_instructions: usize,

    /// Per-instruction share of the compute budget
    pub default_instruction_compute_units: u64,

    /// Ceiling applied to the computed budget
    pub max_compute_unit_limit: u64,

    /// Cost of entering a script body
    pub script_invocation_compute_units: u64,

    /// Reject instructions whose written accounts change total lamports
    pub enforce_lamport_balance: bool,

    /// Filter used by `init_tracing` when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_declared_instructions: MAX_DECLARED_INSTRUCTIONS,
            default_instruction_compute_units: DEFAULT_INSTRUCTION_COMPUTE_UNITS,
            max_compute_unit_limit: MAX_COMPUTE_UNIT_LIMIT,
            script_invocation_compute_units: SCRIPT_INVOCATION_COMPUTE_UNITS,
            enforce_lamport_balance: true,
            log_filter: "info".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from `SCRIPT_RUNTIME_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the limits are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_declared_instructions == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_declared_instructions must be positive".to_string(),
            ));
        }
        if self.max_compute_unit_limit == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_compute_unit_limit must be positive".to_string(),
            ));
        }
        if self.default_instruction_compute_units > self.max_compute_unit_limit {
            return Err(ConfigError::InvalidLimit(format!(
                "default_instruction_compute_units ({}) exceeds max_compute_unit_limit ({})",
                self.default_instruction_compute_units, self.max_compute_unit_limit
            )));
        }
        Ok(())
    }

    /// Compute budget for a transaction declaring `declared` instructions
    pub fn compute_unit_limit(&self, declared: usize) -> u64 {
        (declared as u64)
            .saturating_mul(self.default_instruction_compute_units)
            .min(self.max_compute_unit_limit)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_declared_instructions: parse_var(
                &lookup,
                "MAX_DECLARED_INSTRUCTIONS",
                defaults.max_declared_instructions,
            )?,
            default_instruction_compute_units: parse_var(
                &lookup,
                "DEFAULT_INSTRUCTION_COMPUTE_UNITS",
                defaults.default_instruction_compute_units,
            )?,
            max_compute_unit_limit: parse_var(
                &lookup,
                "MAX_COMPUTE_UNIT_LIMIT",
                defaults.max_compute_unit_limit,
            )?,
            script_invocation_compute_units: parse_var(
                &lookup,
                "SCRIPT_INVOCATION_COMPUTE_UNITS",
                defaults.script_invocation_compute_units,
            )?,
            enforce_lamport_balance: parse_var(
                &lookup,
                "ENFORCE_LAMPORT_BALANCE",
                defaults.enforce_lamport_balance,
            )?,
            log_filter: lookup(&format!("{ENV_PREFIX}LOG_FILTER")).unwrap_or(defaults.log_filter),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    let key = format!("{ENV_PREFIX}{name}");
    match lookup(&key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
        None => Ok(default),
    }
}

// ================================
// Logging
// ================================

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured filter. Returns false when a global subscriber was already
/// installed, which leaves that subscriber in place.
pub fn init_tracing(config: &ExecutorConfig) -> bool {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone());
    match tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        Ok(()) => true,
        Err(err) => {
            debug!("Keeping existing tracing subscriber: {}", err);
            false
        }
    }
}

// ================================
// Error Types
// ================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}
