pub mod aggregation;
pub mod config;
pub mod detection;
pub mod monitor;
pub mod session;
pub mod trigger;
pub mod types;

pub use aggregation::{StagedThresholds, ThresholdMode, TriggerStage, VolumeWindow};
pub use config::{AppConfig, create_default_config, load_config};
pub use detection::TradeClassifier;
pub use monitor::{MonitorError, MonitorResult, TransactionSource};
pub use session::{MonitorSession, SessionEvent};
pub use trigger::{CommandExecutor, TradeExecutor, TriggerOutcome};
pub use types::{
    AccountId, ClassifiedTrade, MonitorConfig, OwnedAccountSet, TrackedAsset, TradeDirection,
    TriggerConfig,
};
