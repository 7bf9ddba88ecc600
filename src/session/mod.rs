//! A monitoring session: one tracked asset, one stream, one window

pub mod events;

pub use events::{EventReceiver, EventSender, SessionEvent};

use crate::aggregation::{AggregationSnapshot, VolumeWindow};
use crate::detection::TradeClassifier;
use crate::monitor::dedup::DedupStats;
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::monitor::fetcher::{TransactionFetcher, TransactionSource};
use crate::monitor::listener::{NotificationSink, StreamListener};
use crate::trigger::{TradeExecutor, TriggerDispatcher, TriggerRequest};
use crate::types::{
    MAX_WINDOW_SECS, MonitorConfig, OwnedAccountSet, Priority, TrackedAsset, TriggerConfig,
};
use events::emit;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct SessionState {
    asset: Option<TrackedAsset>,
    owned: Arc<OwnedAccountSet>,
    window: VolumeWindow,
}

struct SessionInner {
    monitor_config: MonitorConfig,
    trigger_config: TriggerConfig,
    /// Bumped on every start/stop; pipelines from older generations are discarded
    generation: AtomicU64,
    state: Mutex<SessionState>,
    fetcher: TransactionFetcher,
    classifier: TradeClassifier,
    dispatcher: TriggerDispatcher,
    events: EventSender,
}

/// Tracks one asset at a time and fires sell triggers on external buying pressure.
///
/// Sessions are independent: several can run side by side, each with its own
/// stream, dedup cache and window.
pub struct MonitorSession {
    inner: Arc<SessionInner>,
    listener: Mutex<Option<StreamListener>>,
    event_rx: Mutex<Option<EventReceiver>>,
}

impl MonitorSession {
    pub fn new(
        monitor_config: MonitorConfig,
        trigger_config: TriggerConfig,
        source: Arc<dyn TransactionSource>,
        executor: Arc<dyn TradeExecutor>,
    ) -> MonitorResult<Self> {
        trigger_config.mode.validate()?;
        if trigger_config.window_secs == 0 || trigger_config.window_secs > MAX_WINDOW_SECS {
            return Err(MonitorError::ConfigError(format!(
                "Window length must be between 1 and {} seconds",
                MAX_WINDOW_SECS
            )));
        }

        let (events, event_rx) = mpsc::unbounded_channel();
        let window_ms = trigger_config.window_secs as i64 * 1_000;

        let inner = SessionInner {
            fetcher: TransactionFetcher::new(source, &monitor_config),
            classifier: TradeClassifier::new(),
            dispatcher: TriggerDispatcher::new(executor, trigger_config.simulate, events.clone()),
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                asset: None,
                owned: Arc::new(OwnedAccountSet::default()),
                window: VolumeWindow::new(trigger_config.mode, window_ms),
            }),
            monitor_config,
            trigger_config,
            events,
        };

        Ok(Self {
            inner: Arc::new(inner),
            listener: Mutex::new(None),
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    /// Take the event stream; `None` if it was already taken
    pub fn subscribe_events(&self) -> Option<EventReceiver> {
        self.event_rx.lock().take()
    }

    /// Track `asset` and start the log subscription, superseding any previous run
    pub async fn start(&self, asset: TrackedAsset, owned: OwnedAccountSet) -> MonitorResult<()> {
        self.stop().await;

        info!("Starting session for {}", asset);
        self.track(asset, owned);

        let sink: Arc<dyn NotificationSink> = Arc::new(SessionSink(Arc::downgrade(&self.inner)));
        let events = self.inner.events.clone();
        match StreamListener::start(&self.inner.monitor_config, sink, events).await {
            Ok(listener) => {
                *self.listener.lock() = Some(listener);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start stream: {}", e);
                self.inner.disarm();
                Err(e)
            }
        }
    }

    /// Arm the pipeline for `asset` without opening a stream.
    ///
    /// Signatures can then be fed through [`Self::handle_signature`].
    pub fn track(&self, asset: TrackedAsset, owned: OwnedAccountSet) {
        self.inner.arm(asset, owned);
    }

    /// Stop the stream and invalidate every in-flight pipeline
    pub async fn stop(&self) {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.stop().await;
        }
        self.inner.disarm();
    }

    /// Entry point for a notified signature.
    ///
    /// Returns the spawned pipeline, or `None` if the signature was a
    /// duplicate or no asset is tracked.
    pub fn handle_signature(&self, signature: String, logs: Vec<String>) -> Option<JoinHandle<()>> {
        self.inner.handle_signature(signature, logs)
    }

    pub fn update_owned_accounts(&self, owned: OwnedAccountSet) {
        let mut state = self.inner.state.lock();
        debug!("Owned accounts updated ({} accounts)", owned.len());
        state.owned = Arc::new(owned);
    }

    pub fn tracked_asset(&self) -> Option<TrackedAsset> {
        self.inner.state.lock().asset.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    pub fn snapshot(&self) -> AggregationSnapshot {
        self.inner.state.lock().window.snapshot()
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.inner.fetcher.dedup_stats()
    }

    pub fn trigger_config(&self) -> &TriggerConfig {
        &self.inner.trigger_config
    }
}

impl SessionInner {
    fn arm(&self, asset: TrackedAsset, owned: OwnedAccountSet) {
        let mut state = self.state.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.window.reset(self.trigger_config.mode);
        state.asset = Some(asset);
        state.owned = Arc::new(owned);
    }

    fn disarm(&self) {
        let mut state = self.state.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.window.reset(self.trigger_config.mode);
        if let Some(asset) = state.asset.take() {
            info!("Stopped tracking {}", asset);
        }
    }

    fn handle_signature(
        self: &Arc<Self>,
        signature: String,
        logs: Vec<String>,
    ) -> Option<JoinHandle<()>> {
        let (generation, priority) = {
            let state = self.state.lock();
            let asset = state.asset.as_ref()?;
            let priority = if asset.is_mentioned_in(&logs) {
                Priority::High
            } else {
                Priority::Normal
            };
            (self.generation.load(Ordering::SeqCst), priority)
        };

        if !self.fetcher.should_process(&signature) {
            return None;
        }

        let inner = Arc::clone(self);
        Some(tokio::spawn(async move {
            inner.process(signature, priority, generation).await;
        }))
    }

    async fn process(&self, signature: String, priority: Priority, generation: u64) {
        let Some(tx) = self.fetcher.fetch(&signature, priority).await else {
            return;
        };

        let (asset, owned) = {
            let state = self.state.lock();
            if !self.is_current(generation) {
                debug!("Discarding {} from a superseded session", signature);
                return;
            }
            let Some(asset) = state.asset.clone() else {
                return;
            };
            (asset, Arc::clone(&state.owned))
        };

        let Some(trade) = self.classifier.classify(&tx, &asset, &owned) else {
            debug!("{} is not a trade of {}", signature, asset);
            return;
        };

        let update = {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                debug!("Discarding {} from a superseded session", signature);
                return;
            }
            state.window.record(&trade)
        };

        info!(
            "{} {} {:.4} SOL by {} ({})",
            if trade.is_owned { "Owned" } else { "External" },
            trade.direction,
            trade.net_amount,
            trade.actor,
            trade.solscan_url()
        );
        emit(&self.events, SessionEvent::TradeRecorded(trade));

        let Some(update) = update else {
            return;
        };

        emit(
            &self.events,
            SessionEvent::VolumeUpdated {
                net_volume: update.net_volume,
                entries: update.entries,
            },
        );

        if let Some(crossing) = update.crossing {
            emit(
                &self.events,
                SessionEvent::ThresholdCrossed {
                    stage: crossing.stage,
                    net_volume: crossing.net_volume,
                },
            );
            self.dispatcher.fire(TriggerRequest {
                asset,
                stage: crossing.stage,
                net_volume: crossing.net_volume,
            });
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Listener-facing handle; does not keep a dropped session alive
struct SessionSink(Weak<SessionInner>);

impl NotificationSink for SessionSink {
    fn on_notification(&self, signature: String, logs: Vec<String>) {
        if let Some(inner) = self.0.upgrade() {
            inner.handle_signature(signature, logs);
        }
    }
}
