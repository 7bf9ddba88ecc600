use crate::aggregation::ThresholdMode;
use crate::monitor::error::MonitorError;
use crate::trigger::ExecutorConfig;
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Canonical account identifier.
///
/// Every account key coming off the wire (plain string, parsed-account object,
/// loaded address) is converted into this type once, at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parse a base58 account key, returning `None` if it is not a valid pubkey
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Pubkey::from_str(trimmed).ok().map(|_| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn eq_ignore_case(&self, other: &AccountId) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl FromStr for AccountId {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| MonitorError::ParseError(format!("Invalid account identifier: {}", s)))
    }
}

impl TryFrom<String> for AccountId {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl From<Pubkey> for AccountId {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The token mint a session is monitoring
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedAsset {
    pub mint: AccountId,
}

impl TrackedAsset {
    pub fn new(mint: AccountId) -> Self {
        Self { mint }
    }

    /// Whether any log line of a notification mentions the mint
    pub fn is_mentioned_in(&self, logs: &[String]) -> bool {
        logs.iter().any(|line| line.contains(self.mint.as_str()))
    }
}

impl fmt::Display for TrackedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.mint.fmt(f)
    }
}

/// Accounts controlled by the operator. Comparison is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedAccountSet {
    accounts: HashSet<String>,
}

impl OwnedAccountSet {
    pub fn new<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountId>,
    {
        Self {
            accounts: accounts
                .into_iter()
                .map(|id| id.as_str().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts.contains(&account.as_str().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    /// +1 for buys, -1 for sells
    pub fn sign(&self) -> f64 {
        match self {
            TradeDirection::Buy => 1.0,
            TradeDirection::Sell => -1.0,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

/// A buy or sell of the tracked asset, net of estimated fees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTrade {
    pub signature: String,
    pub direction: TradeDirection,
    /// First signer of the transaction
    pub actor: AccountId,
    pub is_owned: bool,
    /// Fee-adjusted amount in SOL
    pub net_amount: f64,
    /// Absolute native balance change of the actor in SOL
    pub raw_amount: f64,
    /// Unix milliseconds at which the trade was classified
    pub timestamp_ms: i64,
}

impl ClassifiedTrade {
    pub fn signed_amount(&self) -> f64 {
        self.direction.sign() * self.net_amount
    }

    pub fn solscan_url(&self) -> String {
        format!("https://solscan.io/tx/{}", self.signature)
    }
}

/// Advisory processing priority for a notification.
///
/// High means the notification's log text already mentions the tracked asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
        }
    }
}

pub mod program_ids {
    /// Pump.fun bonding curve program
    pub const PUMP_FUN: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// HTTP RPC endpoint used to resolve signatures
    pub rpc_endpoint: String,

    /// WebSocket endpoint URL. Derived from `rpc_endpoint` when absent.
    pub websocket_endpoint: Option<String>,

    /// Program whose logs are subscribed to
    pub program_id: String,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Flat delay before a reconnect attempt
    pub reconnect_delay_ms: u64,

    /// Maximum number of consecutive reconnection attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Number of resolved signatures remembered for deduplication
    pub dedup_capacity: usize,

    /// Timeout for a single fetch attempt
    pub fetch_timeout_ms: u64,

    /// Consistency level tried first when resolving a signature
    pub fast_commitment: CommitmentLevel,

    /// Consistency level used for the single escalation
    pub strong_commitment: CommitmentLevel,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            websocket_endpoint: None,
            program_id: program_ids::PUMP_FUN.to_string(),
            connection_timeout_secs: 30,
            reconnect_delay_ms: 2_000,
            max_reconnect_attempts: 5,
            dedup_capacity: 1_000,
            fetch_timeout_ms: 3_000,
            fast_commitment: CommitmentLevel::Confirmed,
            strong_commitment: CommitmentLevel::Finalized,
        }
    }
}

/// Longest accepted window: one day
pub const MAX_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub mode: ThresholdMode,

    /// Sliding window length in seconds, at most [`MAX_WINDOW_SECS`]
    pub window_secs: u64,

    /// Suppress executor invocation while still emitting events
    pub simulate: bool,

    pub executor: ExecutorConfig,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Simple { threshold: 5.0 },
            window_secs: 60,
            simulate: true,
            executor: ExecutorConfig::default(),
        }
    }
}
