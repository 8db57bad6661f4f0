use super::parse_bool_env;
use anyhow::Result;
use std::env;

pub const DEFAULT_FINE_AMOUNT: u64 = 600;
pub const DEFAULT_REWARD_AMOUNT: u64 = 500;

/// Settings that shape the report workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Amount recorded as `fineCollected` when a fine is issued
    pub fine_amount: u64,
    /// Amount recorded as `rewardDisbursed` when a fine is issued
    pub reward_amount: u64,
    /// Reject submissions with blank title/description/location/category
    pub require_fields: bool,
    /// Allow `force` status updates that bypass the transition table
    pub allow_status_override: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            fine_amount: DEFAULT_FINE_AMOUNT,
            reward_amount: DEFAULT_REWARD_AMOUNT,
            require_fields: true,
            allow_status_override: false,
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let fine_amount = amount_from_env("FINE_AMOUNT", defaults.fine_amount)?;
        let reward_amount = amount_from_env("REWARD_AMOUNT", defaults.reward_amount)?;

        Ok(Self {
            fine_amount,
            reward_amount,
            require_fields: parse_bool_env("REQUIRE_REPORT_FIELDS", defaults.require_fields),
            allow_status_override: parse_bool_env(
                "ALLOW_STATUS_OVERRIDE",
                defaults.allow_status_override,
            ),
        })
    }
}

fn amount_from_env(var_name: &str, default: u64) -> Result<u64> {
    match env::var(var_name) {
        Ok(raw) => parse_amount(var_name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_amount(var_name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        anyhow::anyhow!(
            "{} must be a non-negative whole number, got '{}'",
            var_name,
            raw
        )
    })
}
