use crate::aggregation::TriggerStage;
use crate::trigger::dispatcher::TriggerOutcome;
use crate::types::ClassifiedTrade;
use tokio::sync::mpsc;
use tracing::debug;

/// Observable progress of a monitoring session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Subscribed { subscription_id: u64 },
    SubscriptionRejected { reason: String },
    Reconnecting { attempt: u32 },
    /// Every classified trade, owned ones included
    TradeRecorded(ClassifiedTrade),
    VolumeUpdated { net_volume: f64, entries: usize },
    ThresholdCrossed { stage: TriggerStage, net_volume: f64 },
    TriggerCompleted {
        stage: TriggerStage,
        outcome: TriggerOutcome,
    },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub(crate) fn emit(events: &EventSender, event: SessionEvent) {
    if events.send(event).is_err() {
        debug!("Session event dropped: no receiver");
    }
}
