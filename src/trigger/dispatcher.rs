use crate::session::events::{EventSender, SessionEvent};
use crate::trigger::executor::{TradeExecutor, TriggerRequest};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// How a fired trigger ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Executed,
    Simulated,
    Failed(String),
}

/// Hands fired triggers to the executor without waiting for completion.
///
/// Double-fire protection lives in the window's one-shot flags; every call
/// to [`TriggerDispatcher::fire`] results in one invocation.
pub struct TriggerDispatcher {
    executor: Arc<dyn TradeExecutor>,
    simulate: bool,
    events: EventSender,
}

impl TriggerDispatcher {
    pub fn new(executor: Arc<dyn TradeExecutor>, simulate: bool, events: EventSender) -> Self {
        Self {
            executor,
            simulate,
            events,
        }
    }

    pub fn fire(&self, request: TriggerRequest) -> JoinHandle<TriggerOutcome> {
        let executor = Arc::clone(&self.executor);
        let events = self.events.clone();
        let simulate = self.simulate;

        tokio::spawn(async move {
            let stage = request.stage;

            let outcome = if simulate {
                info!(
                    "[SIMULATION] Would sell {} ({}, net volume {:.4} SOL)",
                    request.asset, stage, request.net_volume
                );
                TriggerOutcome::Simulated
            } else {
                info!(
                    "🚨 Firing sell for {} ({}, net volume {:.4} SOL)",
                    request.asset, stage, request.net_volume
                );
                match executor.execute(&request).await {
                    Ok(()) => {
                        info!("✅ Sell executor completed for {}", stage);
                        TriggerOutcome::Executed
                    }
                    Err(e) => {
                        error!("❌ Sell executor failed for {}: {}", stage, e);
                        TriggerOutcome::Failed(e.to_string())
                    }
                }
            };

            let event = SessionEvent::TriggerCompleted {
                stage,
                outcome: outcome.clone(),
            };
            if events.send(event).is_err() {
                debug!("No event receiver for trigger completion");
            }

            outcome
        })
    }
}
