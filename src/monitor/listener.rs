use crate::monitor::error::MonitorResult;
use crate::monitor::websocket::{StreamFrame, WebSocketManager, parse_frame};
use crate::session::events::{EventSender, SessionEvent, emit};
use crate::types::MonitorConfig;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, warn};

/// Reconnects are never scheduled faster than this
const MIN_RECONNECT_DELAY_MS: u64 = 1_000;

/// Receives signatures from the stream; must return without blocking
pub trait NotificationSink: Send + Sync {
    fn on_notification(&self, signature: String, logs: Vec<String>);
}

#[derive(Debug, Clone, Copy)]
struct ReconnectPolicy {
    delay: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    fn from_config(config: &MonitorConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.reconnect_delay_ms.max(MIN_RECONNECT_DELAY_MS)),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

enum LoopSignal {
    Shutdown,
    Message(MonitorResult<Option<Message>>),
}

/// Owns the subscription and its receive loop
pub struct StreamListener {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamListener {
    /// Connect, subscribe and spawn the receive loop.
    ///
    /// Only the first connection attempt is reported to the caller; later
    /// failures are handled by the reconnect policy.
    pub async fn start(
        config: &MonitorConfig,
        sink: Arc<dyn NotificationSink>,
        events: EventSender,
    ) -> MonitorResult<Self> {
        let mut ws = WebSocketManager::new(config)?;
        ws.connect().await?;
        ws.subscribe_to_logs().await?;

        let policy = ReconnectPolicy::from_config(config);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(receive_loop(ws, sink, events, policy, shutdown_rx));

        info!("Listening for log notifications...");
        Ok(Self { shutdown, handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Unsubscribe (best effort), close normally and wait for the loop to exit
    pub async fn stop(self) {
        let Self { shutdown, handle } = self;
        if shutdown.send(()).is_err() {
            debug!("Receive loop already finished");
        }
        if let Err(e) = handle.await {
            warn!("Receive loop ended abnormally: {}", e);
        }
    }
}

async fn receive_loop(
    mut ws: WebSocketManager,
    sink: Arc<dyn NotificationSink>,
    events: EventSender,
    policy: ReconnectPolicy,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempts = 0u32;

    loop {
        let signal = tokio::select! {
            _ = &mut shutdown => LoopSignal::Shutdown,
            message = ws.receive_message() => LoopSignal::Message(message),
        };

        let disconnect = match signal {
            LoopSignal::Shutdown => {
                ws.unsubscribe().await;
                ws.close().await;
                info!("Listener stopped");
                return;
            }
            LoopSignal::Message(Ok(Some(Message::Text(text)))) => {
                handle_text(&mut ws, &text, sink.as_ref(), &events, &mut attempts);
                None
            }
            LoopSignal::Message(Ok(Some(Message::Ping(payload)))) => {
                ws.send_pong(payload).await.err().map(|e| e.to_string())
            }
            LoopSignal::Message(Ok(Some(Message::Close(frame)))) => match frame {
                Some(frame) if frame.code == CloseCode::Normal => {
                    info!("WebSocket closed normally by server");
                    ws.drop_connection();
                    return;
                }
                Some(frame) => Some(format!("closed with {} ({})", frame.code, frame.reason)),
                None => Some("closed without status".to_string()),
            },
            LoopSignal::Message(Ok(Some(_))) => None,
            LoopSignal::Message(Ok(None)) => Some("stream ended".to_string()),
            LoopSignal::Message(Err(e)) => Some(e.to_string()),
        };

        if let Some(reason) = disconnect {
            warn!("WebSocket connection lost: {}", reason);
            ws.drop_connection();

            if !reconnect(&mut ws, policy, &events, &mut attempts, &mut shutdown).await {
                return;
            }
        }
    }
}

fn handle_text(
    ws: &mut WebSocketManager,
    text: &str,
    sink: &dyn NotificationSink,
    events: &EventSender,
    attempts: &mut u32,
) {
    let frame = match parse_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Ignoring malformed frame: {}", e);
            return;
        }
    };

    match frame {
        StreamFrame::SubscriptionAck {
            request_id,
            subscription_id,
        } => {
            if ws.accept_ack(request_id, subscription_id) {
                *attempts = 0;
                emit(events, SessionEvent::Subscribed { subscription_id });
            }
        }
        StreamFrame::UnsubscribeAck { success, .. } => {
            debug!("Unsubscribe acknowledged: {}", success);
        }
        StreamFrame::RpcError {
            request_id,
            code,
            message,
        } => {
            error!("Stream error {}: {}", code, message);
            if ws.reject_pending(request_id) {
                error!("Subscription rejected; staying unsubscribed until restarted");
                emit(events, SessionEvent::SubscriptionRejected { reason: message });
            }
        }
        StreamFrame::LogsNotification {
            subscription_id,
            signature,
            logs,
            failed,
        } => {
            if failed {
                debug!("Skipping failed transaction {}", signature);
                return;
            }
            if let (Some(current), Some(incoming)) = (ws.subscription_id(), subscription_id) {
                if current != incoming {
                    debug!("Notification for stale subscription {}", incoming);
                    return;
                }
            }
            sink.on_notification(signature, logs);
        }
        StreamFrame::Other => {}
    }
}

/// Flat-delay reconnect; false once attempts are exhausted or on shutdown
async fn reconnect(
    ws: &mut WebSocketManager,
    policy: ReconnectPolicy,
    events: &EventSender,
    attempts: &mut u32,
    shutdown: &mut oneshot::Receiver<()>,
) -> bool {
    loop {
        if *attempts >= policy.max_attempts {
            error!(
                "Max reconnection attempts ({}) exceeded, giving up",
                policy.max_attempts
            );
            return false;
        }
        *attempts += 1;

        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            policy.delay, attempts, policy.max_attempts
        );
        emit(events, SessionEvent::Reconnecting { attempt: *attempts });

        tokio::select! {
            _ = &mut *shutdown => {
                info!("Listener stopped while reconnecting");
                return false;
            }
            _ = sleep(policy.delay) => {}
        }

        let result = match ws.connect().await {
            Ok(()) => ws.subscribe_to_logs().await.map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => return true,
            Err(e) => {
                warn!("Reconnect attempt {} failed: {}", attempts, e);
                ws.drop_connection();
            }
        }
    }
}
