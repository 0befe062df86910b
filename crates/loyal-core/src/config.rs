//! Configuration for the ledger harness and the programs
//!
//! Loaded from TOML, then overridden from `LOYAL_*` environment variables,
//! then validated. The oracle signer lives here rather than in ambient
//! global state; programs copy it into their on-ledger `Identity` record
//! exactly once, at initialization.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

use crate::errors::{LoyalError, Result};
use crate::identifiers::{Address, ValidatorId};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "LOYAL_";

/// Default upper bound on a stored oracle response
pub const DEFAULT_MAX_RESPONSE_LEN: usize = 4096;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyalConfig {
    /// Settlement-layer harness settings
    pub ledger: LedgerConfig,
    /// Oracle protocol settings
    pub oracle: OracleConfig,
    /// Delegation defaults
    pub delegation: DelegationConfig,
}

/// Settlement-layer harness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Logical time that elapses per processed transaction
    pub slot_duration_ms: u64,
    /// Maximum nesting of cross-program invocations
    pub max_cpi_depth: usize,
    /// Rollup validators accepting delegations
    pub validators: Vec<ValidatorConfig>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            slot_duration_ms: 400,
            max_cpi_depth: 4,
            validators: vec![
                ValidatorConfig::new("devnet-eu.magicblock.app", "eu", 40),
                ValidatorConfig::new("devnet-us.magicblock.app", "us", 90),
                ValidatorConfig::new("devnet-as.magicblock.app", "asia", 160),
            ],
        }
    }
}

/// One rollup validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Public name; the validator id is derived from it
    pub name: String,
    /// Region label
    pub region: String,
    /// Expected round-trip latency from clients
    pub latency_ms: u64,
}

impl ValidatorConfig {
    /// Create a validator entry
    pub fn new(name: impl Into<String>, region: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            latency_ms,
        }
    }

    /// Identifier derived from the validator name
    pub fn id(&self) -> ValidatorId {
        ValidatorId::from_label(&self.name)
    }
}

/// How an edit to a pending interaction treats the previous callback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Replace text (if supplied) and the callback target, drop any partial
    /// response, and reset status to pending
    #[default]
    ReplaceTarget,
    /// Replace text only; callback target and partial response are kept
    TextOnly,
}

/// Oracle protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Off-ledger signer trusted to deliver callbacks
    #[serde(
        serialize_with = "serialize_opt_address",
        deserialize_with = "deserialize_opt_address"
    )]
    pub signer: Option<Address>,
    /// Maximum response size in bytes
    pub max_response_len: usize,
    /// Edit semantics for pending interactions
    pub edit_policy: EditPolicy,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            signer: None,
            max_response_len: DEFAULT_MAX_RESPONSE_LEN,
            edit_policy: EditPolicy::default(),
        }
    }
}

/// Delegation defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Checkpoint interval used when a delegation does not specify one;
    /// zero disables periodic checkpoints
    pub default_commit_frequency_ms: u64,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            default_commit_frequency_ms: 30_000,
        }
    }
}

fn serialize_opt_address<S: Serializer>(
    value: &Option<Address>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(address) => serializer.serialize_some(&address.to_string()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_opt_address<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Address>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

impl LoyalConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from file, apply process environment overrides, and validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from `(key, value)` pairs carrying the `LOYAL_` prefix
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "ORACLE_SIGNER" => self.oracle.signer = Some(value.parse()?),
                "SLOT_DURATION_MS" => self.ledger.slot_duration_ms = parse_number(&key, &value)?,
                "MAX_CPI_DEPTH" => self.ledger.max_cpi_depth = parse_number(&key, &value)?,
                "MAX_RESPONSE_LEN" => self.oracle.max_response_len = parse_number(&key, &value)?,
                "DEFAULT_COMMIT_FREQUENCY_MS" => {
                    self.delegation.default_commit_frequency_ms = parse_number(&key, &value)?;
                }
                _ => tracing::debug!(key = %key, "ignoring unknown configuration override"),
            }
        }
        Ok(())
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.ledger.max_cpi_depth == 0 {
            return Err(LoyalError::config("ledger.max_cpi_depth must be at least 1"));
        }
        if self.oracle.max_response_len == 0 {
            return Err(LoyalError::config("oracle.max_response_len must be positive"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for validator in &self.ledger.validators {
            if !seen.insert(validator.id()) {
                return Err(LoyalError::config(format!(
                    "duplicate validator: {}",
                    validator.name
                )));
            }
        }
        Ok(())
    }

    /// The configured oracle signer, required by the programs
    pub fn oracle_signer(&self) -> Result<Address> {
        self.oracle
            .signer
            .ok_or_else(|| LoyalError::config("oracle.signer is not set"))
    }

    /// Validator with the lowest expected latency, used when a delegation
    /// does not name one
    pub fn fastest_validator(&self) -> Option<&ValidatorConfig> {
        self.ledger.validators.iter().min_by_key(|v| v.latency_ms)
    }

    /// Builder-style setter for the oracle signer
    pub fn with_oracle_signer(mut self, signer: Address) -> Self {
        self.oracle.signer = Some(signer);
        self
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| LoyalError::config(format!("{key}: expected a number, got {value:?}")))
}
