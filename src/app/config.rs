// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::parse_id_list;
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::services::strategy::CycleSettings;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,

    // Connection & identity
    /// Falls back to `RPC_RISE` when unset.
    #[serde(default)]
    pub rpc_url: String,
    /// Falls back to `PRIVATE_KEY` when unset.
    #[serde(default)]
    pub wallet_key: String,
    pub weth_address: Address,
    #[serde(default = "default_network_name")]
    pub network_name: String,

    // Transaction
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,

    // Swap loop
    #[serde(default = "default_swap_amount_min_eth")]
    pub swap_amount_min_eth: f64,
    #[serde(default = "default_swap_amount_max_eth")]
    pub swap_amount_max_eth: f64,
    #[serde(default = "default_cycle_delay_min_secs")]
    pub cycle_delay_min_secs: u64,
    #[serde(default = "default_cycle_delay_max_secs")]
    pub cycle_delay_max_secs: u64,
    /// Comma/space separated string or a list.
    #[serde(default = "default_strategies", deserialize_with = "deserialize_id_list")]
    pub strategies: Vec<String>,
}

fn default_false() -> bool {
    false
}
fn default_network_name() -> String {
    constants::DEFAULT_NETWORK_NAME.to_string()
}
fn default_gas_limit() -> u64 {
    constants::DEFAULT_GAS_LIMIT
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_swap_amount_min_eth() -> f64 {
    constants::DEFAULT_SWAP_AMOUNT_MIN_ETH
}
fn default_swap_amount_max_eth() -> f64 {
    constants::DEFAULT_SWAP_AMOUNT_MAX_ETH
}
fn default_cycle_delay_min_secs() -> u64 {
    constants::DEFAULT_CYCLE_DELAY_MIN_SECS
}
fn default_cycle_delay_max_secs() -> u64 {
    constants::DEFAULT_CYCLE_DELAY_MAX_SECS
}
fn default_strategies() -> Vec<String> {
    constants::DEFAULT_STRATEGIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, SeqAccess, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of strategy ids or a comma-separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(parse_id_list(v))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<String>()? {
                out.extend(parse_id_list(&elem));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

fn invalid(field: &str, message: impl Into<String>) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = path {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Precedence: CLI (in main) > env/.env > config file.
        builder = builder.add_source(Environment::default());

        let mut settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.apply_env_aliases();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_aliases(&mut self) {
        if self.rpc_url.trim().is_empty()
            && let Ok(url) = std::env::var("RPC_RISE")
        {
            self.rpc_url = url;
        }
        if self.wallet_key.trim().is_empty()
            && let Ok(key) = std::env::var("PRIVATE_KEY")
        {
            self.wallet_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config(
                "WALLET_KEY (or PRIVATE_KEY) is missing".to_string(),
            ));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(AppError::Config("RPC_URL (or RPC_RISE) is missing".to_string()));
        }
        Url::parse(self.rpc_url.trim())
            .map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        if self.gas_limit == 0 {
            return Err(invalid("gas_limit", "must be greater than zero"));
        }
        if !(self.swap_amount_min_eth.is_finite() && self.swap_amount_min_eth > 0.0) {
            return Err(invalid("swap_amount_min_eth", "must be a positive amount"));
        }
        if !self.swap_amount_max_eth.is_finite()
            || self.swap_amount_max_eth < self.swap_amount_min_eth
        {
            return Err(invalid(
                "swap_amount_max_eth",
                "must not be below swap_amount_min_eth",
            ));
        }
        if self.cycle_delay_max_secs < self.cycle_delay_min_secs {
            return Err(invalid(
                "cycle_delay_max_secs",
                "must not be below cycle_delay_min_secs",
            ));
        }
        if self.strategies.is_empty() {
            return Err(invalid("strategies", "at least one strategy id is required"));
        }
        let mut seen = HashSet::new();
        for id in &self.strategies {
            if !seen.insert(id.as_str()) {
                return Err(invalid("strategies", format!("duplicate id `{id}`")));
            }
        }
        Ok(())
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms.max(1))
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            network_name: self.network_name.clone(),
            gas_limit: self.gas_limit,
            amount_min_eth: self.swap_amount_min_eth,
            amount_max_eth: self.swap_amount_max_eth,
            delay_min: Duration::from_secs(self.cycle_delay_min_secs),
            delay_max: Duration::from_secs(self.cycle_delay_max_secs),
        }
    }
}
