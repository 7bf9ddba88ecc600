use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use volume_sentinel::{
    CommandExecutor, MonitorSession, SessionEvent, TriggerOutcome, create_default_config,
    load_config,
};

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Subscribed { subscription_id } => {
            info!("📡 Subscribed (id {})", subscription_id);
        }
        SessionEvent::SubscriptionRejected { reason } => {
            error!("Subscription rejected: {}. Restart to retry.", reason);
        }
        SessionEvent::Reconnecting { attempt } => {
            warn!("Reconnecting (attempt {})", attempt);
        }
        SessionEvent::TradeRecorded(trade) => {
            info!(
                "{} {} {:.4} SOL by {}{}",
                if trade.is_owned { "👤" } else { "🎯" },
                trade.direction,
                trade.net_amount,
                trade.actor,
                if trade.is_owned { " (owned, not counted)" } else { "" }
            );
            info!("   {}", trade.solscan_url());
        }
        SessionEvent::VolumeUpdated {
            net_volume,
            entries,
        } => {
            info!("📊 Net volume {:.4} SOL over {} trades", net_volume, entries);
        }
        SessionEvent::ThresholdCrossed { stage, net_volume } => {
            info!("🚨 {} crossed at {:.4} SOL", stage, net_volume);
        }
        SessionEvent::TriggerCompleted { stage, outcome } => match outcome {
            TriggerOutcome::Executed => info!("✅ {} sell executed", stage),
            TriggerOutcome::Simulated => info!("🧪 {} sell simulated", stage),
            TriggerOutcome::Failed(reason) => error!("❌ {} sell failed: {}", stage, reason),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    if !Path::new(&config_path).exists() {
        init_logging(Level::INFO);
        info!("No config found, creating default config file...");
        create_default_config(&config_path)?;
        info!("Please edit {} with the token mint to track", config_path);
        return Ok(());
    }

    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_logging(Level::INFO);
            error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    init_logging(config.log_level);

    info!("Starting Solana volume sentinel");

    let asset = config
        .tracked_asset
        .clone()
        .context("session.tracked_asset is not set in the config")?;

    let rpc_client = Arc::new(RpcClient::new(config.monitor.rpc_endpoint.clone()));
    let executor = Arc::new(CommandExecutor::new(config.trigger.executor.clone()));
    let session = MonitorSession::new(
        config.monitor.clone(),
        config.trigger.clone(),
        rpc_client,
        executor,
    )?;

    let mut events = session
        .subscribe_events()
        .context("event stream already taken")?;
    let event_handle = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    if session.trigger_config().simulate {
        warn!("SIMULATION MODE: the sell executor will not be invoked");
    }
    info!("Trigger mode: {:?}", session.trigger_config().mode);
    info!("Window: {}s", session.trigger_config().window_secs);

    session
        .start(asset, config.owned_accounts.clone())
        .await
        .context("failed to start monitoring")?;

    info!("Monitor is running. Press Ctrl+C to stop.");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut health = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = health.tick() => {
                if !session.is_streaming() {
                    error!("Stream ended and will not reconnect");
                    break;
                }
            }
        }
    }

    let snapshot = session.snapshot();
    let stats = session.dedup_stats();
    session.stop().await;

    info!("📊 FINAL STATS:");
    info!("   Net volume in window: {:.4} SOL", snapshot.net_volume);
    info!("   Trades in window:     {}", snapshot.entries);
    info!("   Stages fired:         {:?}", snapshot.fired);
    info!(
        "   Signatures checked:   {} ({} duplicates)",
        stats.checked, stats.skipped
    );

    drop(session);
    if tokio::time::timeout(Duration::from_secs(1), event_handle)
        .await
        .is_err()
    {
        warn!("Pending events were not flushed");
    }

    info!("Shutting down...");
    Ok(())
}
