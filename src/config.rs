use serde::{Deserialize, Serialize};
use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

use crate::model::{
    constants::{
        AGREE_WINDOW_SECS, DEFAULT_RATING, KICK_DELAY_SECS, LOADED_NOTICE_DELAY_SECS, LOOKUP_API_ROOT,
        LOOKUP_TIMEOUT_SECS, MAX_NAME_RETRIES, MINIMUM_SUGGESTION_DIFFERENCE, NAME_RETRY_DELAY_MS,
        SHUFFLE_BALANCE_DELAY_SECS
    },
    requirements::RatingLimits,
    resolver::ResolverSettings
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String }
}

/// Options recognised by the balancing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// 0 disables the lower bound
    pub minimum_rating: i32,
    /// 0 disables the upper bound
    pub maximum_rating: i32,
    pub default_rating: i32,
    /// Reject shuffle votes while the number of players is odd
    pub veto_uneven_shuffle: bool,
    /// Balance automatically after a shuffle vote passes
    pub auto_balance: bool,
    /// Let participants outside the rating limits stay as spectators
    pub allow_spectators: bool,
    /// Suggestions improving the average gap by less than this are not shown
    pub minimum_suggestion_difference: i32,
    /// Rating service root, e.g. http://www.qlranks.com
    pub api_root: String,
    pub lookup_timeout: Duration,
    pub max_name_retries: u32,
    pub name_retry_delay: Duration,
    pub agree_window: Duration,
    pub shuffle_balance_delay: Duration,
    pub loaded_notice_delay: Duration,
    pub kick_delay: Duration
}

impl BalanceConfig {
    /// Reads `BALANCE_*` variables, keeping the default for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            minimum_rating: env_or("BALANCE_MINIMUM_RATING", defaults.minimum_rating)?,
            maximum_rating: env_or("BALANCE_MAXIMUM_RATING", defaults.maximum_rating)?,
            default_rating: env_or("BALANCE_DEFAULT_RATING", defaults.default_rating)?,
            veto_uneven_shuffle: env_flag("BALANCE_VETO_UNEVEN_SHUFFLE", defaults.veto_uneven_shuffle)?,
            auto_balance: env_flag("BALANCE_AUTO_BALANCE", defaults.auto_balance)?,
            allow_spectators: env_flag("BALANCE_ALLOW_SPECTATORS", defaults.allow_spectators)?,
            minimum_suggestion_difference: env_or(
                "BALANCE_MINIMUM_SUGGESTION_DIFFERENCE",
                defaults.minimum_suggestion_difference
            )?,
            api_root: env::var("BALANCE_API_ROOT").unwrap_or(defaults.api_root),
            lookup_timeout: Duration::from_secs(env_or(
                "BALANCE_LOOKUP_TIMEOUT_SECS",
                defaults.lookup_timeout.as_secs()
            )?),
            ..defaults
        })
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            max_name_retries: self.max_name_retries,
            retry_delay: self.name_retry_delay
        }
    }

    pub fn limits(&self) -> RatingLimits {
        RatingLimits {
            minimum: self.minimum_rating,
            maximum: self.maximum_rating,
            allow_spectators: self.allow_spectators
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            minimum_rating: 0,
            maximum_rating: 0,
            default_rating: DEFAULT_RATING,
            veto_uneven_shuffle: true,
            auto_balance: true,
            allow_spectators: true,
            minimum_suggestion_difference: MINIMUM_SUGGESTION_DIFFERENCE,
            api_root: LOOKUP_API_ROOT.to_string(),
            lookup_timeout: Duration::from_secs(LOOKUP_TIMEOUT_SECS),
            max_name_retries: MAX_NAME_RETRIES,
            name_retry_delay: Duration::from_millis(NAME_RETRY_DELAY_MS),
            agree_window: Duration::from_secs(AGREE_WINDOW_SECS as u64),
            shuffle_balance_delay: Duration::from_secs(SHUFFLE_BALANCE_DELAY_SECS),
            loaded_notice_delay: Duration::from_secs(LOADED_NOTICE_DELAY_SECS),
            kick_delay: Duration::from_secs(KICK_DELAY_SECS)
        }
    }
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default)
    }
}

/// Accepts 1/0 as well as true/false.
fn env_flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value })
        },
        Err(_) => Ok(default)
    }
}
