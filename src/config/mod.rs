use crate::aggregation::{StagedThresholds, ThresholdMode};
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::monitor::websocket::resolve_websocket_endpoint;
use crate::trigger::ExecutorConfig;
use crate::types::{
    AccountId, MAX_WINDOW_SECS, MonitorConfig, OwnedAccountSet, TrackedAsset, TriggerConfig,
};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::path::Path;
use std::str::FromStr;
use tracing::{Level, info};

const ASSET_PLACEHOLDER: &str = "YOUR_TOKEN_MINT_HERE";

/// Everything the binary needs to run one session
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub trigger: TriggerConfig,
    pub tracked_asset: Option<TrackedAsset>,
    pub owned_accounts: OwnedAccountSet,
    pub log_level: Level,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawConfig {
    monitor: RawMonitorConfig,
    session: Option<RawSessionConfig>,
    trigger: Option<RawTriggerConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawMonitorConfig {
    rpc_endpoint: String,
    websocket_endpoint: Option<String>,
    program_id: Option<String>,
    connection_timeout_secs: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    dedup_capacity: Option<usize>,
    fetch_timeout_ms: Option<u64>,
    fast_commitment: Option<CommitmentLevel>,
    strong_commitment: Option<CommitmentLevel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawSessionConfig {
    tracked_asset: Option<String>,
    owned_accounts: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawTriggerConfig {
    /// Simple mode threshold; ignored when `staged_thresholds` is set
    threshold: Option<f64>,
    staged_thresholds: Option<Vec<f64>>,
    window_secs: Option<u64>,
    simulate: Option<bool>,
    executor: Option<ExecutorConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> MonitorResult<AppConfig> {
    info!("Loading configuration from {:?}", path.as_ref());

    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .build()
        .map_err(|e| MonitorError::ConfigError(format!("Failed to load config: {}", e)))?;

    let raw: RawConfig = config
        .try_deserialize()
        .map_err(|e| MonitorError::ConfigError(format!("Failed to parse config: {}", e)))?;

    let app_config = validate(raw)?;

    info!("Configuration loaded successfully");
    info!("RPC endpoint: {}", app_config.monitor.rpc_endpoint);
    if let Some(asset) = &app_config.tracked_asset {
        info!("Tracked asset: {}", asset);
    }

    Ok(app_config)
}

fn validate(raw: RawConfig) -> MonitorResult<AppConfig> {
    let defaults = MonitorConfig::default();
    let monitor = raw.monitor;

    if !monitor.rpc_endpoint.starts_with("http://") && !monitor.rpc_endpoint.starts_with("https://")
    {
        return Err(MonitorError::ConfigError(format!(
            "Invalid RPC endpoint (must start with http:// or https://): {}",
            monitor.rpc_endpoint
        )));
    }

    let program_id = match monitor.program_id {
        Some(program_id) => parse_account("program_id", &program_id)?.to_string(),
        None => defaults.program_id,
    };

    let monitor_config = MonitorConfig {
        rpc_endpoint: monitor.rpc_endpoint,
        websocket_endpoint: monitor.websocket_endpoint,
        program_id,
        connection_timeout_secs: monitor
            .connection_timeout_secs
            .unwrap_or(defaults.connection_timeout_secs),
        reconnect_delay_ms: monitor.reconnect_delay_ms.unwrap_or(defaults.reconnect_delay_ms),
        max_reconnect_attempts: monitor
            .max_reconnect_attempts
            .unwrap_or(defaults.max_reconnect_attempts),
        dedup_capacity: monitor.dedup_capacity.unwrap_or(defaults.dedup_capacity),
        fetch_timeout_ms: monitor.fetch_timeout_ms.unwrap_or(defaults.fetch_timeout_ms),
        fast_commitment: monitor.fast_commitment.unwrap_or(defaults.fast_commitment),
        strong_commitment: monitor.strong_commitment.unwrap_or(defaults.strong_commitment),
    };

    // Also checks the ws:// / wss:// scheme of an explicit endpoint
    resolve_websocket_endpoint(&monitor_config)?;

    for level in [monitor_config.fast_commitment, monitor_config.strong_commitment] {
        let commitment = CommitmentConfig { commitment: level };
        if !commitment.is_at_least_confirmed() {
            return Err(MonitorError::ConfigError(format!(
                "Fetch commitment must be confirmed or finalized, got {:?}",
                level
            )));
        }
    }

    let session = raw.session.unwrap_or_default();
    let tracked_asset = session
        .tracked_asset
        .map(|mint| parse_account("tracked_asset", &mint).map(TrackedAsset::new))
        .transpose()?;

    let owned = session
        .owned_accounts
        .unwrap_or_default()
        .iter()
        .map(|account| parse_account("owned_accounts", account))
        .collect::<MonitorResult<Vec<_>>>()?;

    let trigger = raw.trigger.unwrap_or_default();
    let trigger_defaults = TriggerConfig::default();

    let mode = match trigger.staged_thresholds {
        Some(values) => {
            let [stage1, stage2, stage3] = values.as_slice() else {
                return Err(MonitorError::ConfigError(format!(
                    "staged_thresholds needs exactly three values, got {}",
                    values.len()
                )));
            };
            ThresholdMode::Staged {
                thresholds: StagedThresholds::new(*stage1, *stage2, *stage3)?,
            }
        }
        None => match trigger.threshold {
            Some(threshold) => ThresholdMode::Simple { threshold },
            None => trigger_defaults.mode,
        },
    };
    mode.validate()?;

    let window_secs = trigger.window_secs.unwrap_or(trigger_defaults.window_secs);
    if window_secs == 0 || window_secs > MAX_WINDOW_SECS {
        return Err(MonitorError::ConfigError(format!(
            "window_secs must be between 1 and {}",
            MAX_WINDOW_SECS
        )));
    }

    let trigger_config = TriggerConfig {
        mode,
        window_secs,
        simulate: trigger.simulate.unwrap_or(trigger_defaults.simulate),
        executor: trigger.executor.unwrap_or(trigger_defaults.executor),
    };

    let level = raw
        .logging
        .and_then(|logging| logging.level)
        .unwrap_or_else(|| "info".to_string());
    let log_level = Level::from_str(&level)
        .map_err(|_| MonitorError::ConfigError(format!("Invalid log level: {}", level)))?;

    Ok(AppConfig {
        monitor: monitor_config,
        trigger: trigger_config,
        tracked_asset,
        owned_accounts: OwnedAccountSet::new(owned),
        log_level,
    })
}

fn parse_account(field: &str, value: &str) -> MonitorResult<AccountId> {
    AccountId::parse(value).ok_or_else(|| {
        MonitorError::ConfigError(format!("Invalid {} address: {}", field, value))
    })
}

fn default_raw_config() -> RawConfig {
    let monitor = MonitorConfig::default();
    let trigger = TriggerConfig::default();

    let (threshold, staged_thresholds) = match trigger.mode {
        ThresholdMode::Simple { threshold } => (Some(threshold), None),
        ThresholdMode::Staged { thresholds } => (None, Some(thresholds.values().to_vec())),
    };

    RawConfig {
        monitor: RawMonitorConfig {
            rpc_endpoint: monitor.rpc_endpoint,
            websocket_endpoint: monitor.websocket_endpoint,
            program_id: Some(monitor.program_id),
            connection_timeout_secs: Some(monitor.connection_timeout_secs),
            reconnect_delay_ms: Some(monitor.reconnect_delay_ms),
            max_reconnect_attempts: Some(monitor.max_reconnect_attempts),
            dedup_capacity: Some(monitor.dedup_capacity),
            fetch_timeout_ms: Some(monitor.fetch_timeout_ms),
            fast_commitment: Some(monitor.fast_commitment),
            strong_commitment: Some(monitor.strong_commitment),
        },
        session: Some(RawSessionConfig {
            tracked_asset: Some(ASSET_PLACEHOLDER.to_string()),
            owned_accounts: Some(Vec::new()),
        }),
        trigger: Some(RawTriggerConfig {
            threshold,
            staged_thresholds,
            window_secs: Some(trigger.window_secs),
            simulate: Some(trigger.simulate),
            executor: Some(trigger.executor),
        }),
        logging: Some(LoggingConfig {
            level: Some("info".to_string()),
        }),
    }
}

/// Create a default configuration file
pub fn create_default_config<P: AsRef<Path>>(path: P) -> MonitorResult<()> {
    let body = toml::to_string_pretty(&default_raw_config())
        .map_err(|e| MonitorError::ConfigError(format!("Failed to render config: {}", e)))?;

    let header = r#"# volume-sentinel configuration
#
# [monitor]  websocket_endpoint is derived from rpc_endpoint when omitted
#            (https -> wss, http -> ws). Fetch commitments must be
#            "confirmed" or "finalized".
# [session]  tracked_asset is the token mint to watch; owned_accounts are
#            your own wallets, whose trades never count toward volume.
# [trigger]  set `threshold` for a single trigger, or
#            `staged_thresholds = [a, b, c]` (strictly ascending) for three.
#            Keep `simulate = true` until the executor is tested.
# [logging]  level: trace, debug, info, warn, error

"#;

    std::fs::write(path.as_ref(), format!("{}{}", header, body))
        .map_err(|e| MonitorError::ConfigError(format!("Failed to write config file: {}", e)))?;

    info!("Created default config file at {:?}", path.as_ref());
    Ok(())
}
