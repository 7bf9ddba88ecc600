use crate::aggregation::TriggerStage;
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::TrackedAsset;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

/// External sell command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program to run
    pub program: String,

    /// Leading arguments, placed before the positional ones
    pub args: Vec<String>,

    /// Priority level passed as the last positional argument
    pub priority: String,

    /// Passed in place of a stage number in simple mode
    pub wait_time_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "./sell.sh".to_string(),
            args: Vec::new(),
            priority: "high".to_string(),
            wait_time_secs: 0,
        }
    }
}

/// What to sell, and why
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    pub asset: TrackedAsset,
    pub stage: TriggerStage,
    pub net_volume: f64,
}

/// Runs the configured sell action
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, request: &TriggerRequest) -> MonitorResult<()>;
}

/// Invokes an out-of-process command; exit code 0 is success
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Leading args, then: asset, stage number or wait time, priority
    pub fn command_args(&self, request: &TriggerRequest) -> Vec<String> {
        let stage_arg = match request.stage {
            TriggerStage::Stage(n) => n.to_string(),
            TriggerStage::Default => self.config.wait_time_secs.to_string(),
        };

        let mut args = self.config.args.clone();
        args.push(request.asset.mint.to_string());
        args.push(stage_arg);
        args.push(self.config.priority.clone());
        args
    }
}

#[async_trait]
impl TradeExecutor for CommandExecutor {
    async fn execute(&self, request: &TriggerRequest) -> MonitorResult<()> {
        let args = self.command_args(request);
        info!("Running executor: {} {}", self.config.program, args.join(" "));

        let output = Command::new(&self.config.program)
            .args(&args)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Executor stdout: {}", stdout.trim());
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(MonitorError::ExecutorFailed(format!(
            "{} exited with {}: {}",
            self.config.program,
            output.status,
            stderr.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;
    use solana_sdk::pubkey::Pubkey;

    fn request(stage: TriggerStage) -> TriggerRequest {
        TriggerRequest {
            asset: TrackedAsset::new(AccountId::from(Pubkey::new_unique())),
            stage,
            net_volume: 7.5,
        }
    }

    fn executor(program: &str) -> CommandExecutor {
        CommandExecutor::new(ExecutorConfig {
            program: program.to_string(),
            args: vec!["sell.js".to_string()],
            priority: "turbo".to_string(),
            wait_time_secs: 3,
        })
    }

    #[test]
    fn test_positional_arguments() {
        let exec = executor("node");

        let staged = request(TriggerStage::Stage(2));
        assert_eq!(
            exec.command_args(&staged),
            vec![
                "sell.js".to_string(),
                staged.asset.mint.to_string(),
                "2".to_string(),
                "turbo".to_string()
            ]
        );

        let simple = request(TriggerStage::Default);
        assert_eq!(exec.command_args(&simple)[2], "3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_maps_to_result() {
        assert!(executor("true").execute(&request(TriggerStage::Default)).await.is_ok());

        let err = executor("false")
            .execute(&request(TriggerStage::Default))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::ExecutorFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let result = executor("/nonexistent/volume-sentinel-sell")
            .execute(&request(TriggerStage::Stage(1)))
            .await;
        assert!(matches!(result, Err(MonitorError::Io(_))));
    }
}
