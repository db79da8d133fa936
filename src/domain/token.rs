//! Token holders, conversion rate and backend receipts

use crate::error::{CoreError, CoreResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A utility-token holder as last reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub utility_balance: u64,
}

impl Holder {
    pub fn new(address: impl Into<String>, utility_balance: u64) -> Self {
        Self {
            address: address.into(),
            display_name: None,
            utility_balance,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Number of utility tokens required to mint one security token.
///
/// Only values in `[1, 1000]` can be constructed; anything else is
/// rejected rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct ConversionRate(u32);

impl ConversionRate {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 1000;
    pub const DEFAULT: ConversionRate = ConversionRate(10);

    pub fn new(rate: i64) -> CoreResult<Self> {
        if rate < Self::MIN as i64 || rate > Self::MAX as i64 {
            return Err(CoreError::InvalidRate { rate });
        }
        Ok(Self(rate as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Security tokens minted for a whole utility balance
    pub fn security_for(self, utility_balance: u64) -> u64 {
        utility_balance / u64::from(self.0)
    }
}

impl TryFrom<i64> for ConversionRate {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConversionRate> for u32 {
    fn from(rate: ConversionRate) -> Self {
        rate.0
    }
}

impl fmt::Display for ConversionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Amount issued to one address by an executed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub address: String,
    pub utility_spent: u64,
    pub security_issued: u64,
}

/// Backend confirmation of an executed conversion batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReceipt {
    pub batch_id: Uuid,
    pub rate: ConversionRate,
    pub issued: Vec<IssuedAmount>,
    pub executed_at: DateTime<Utc>,
}

impl ConversionReceipt {
    pub fn total_security_issued(&self) -> u128 {
        self.issued.iter().map(|i| u128::from(i.security_issued)).sum()
    }

    pub fn total_utility_spent(&self) -> u128 {
        self.issued.iter().map(|i| u128::from(i.utility_spent)).sum()
    }
}
