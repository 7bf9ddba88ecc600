use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::MonitorConfig;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Commitment used for the log subscription itself
pub const SUBSCRIPTION_COMMITMENT: &str = "processed";

/// A decoded inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Numeric result for a request; a subscription id for `logsSubscribe`
    SubscriptionAck { request_id: u64, subscription_id: u64 },
    /// Boolean result for `logsUnsubscribe`
    UnsubscribeAck { request_id: u64, success: bool },
    RpcError {
        request_id: Option<u64>,
        code: i64,
        message: String,
    },
    LogsNotification {
        subscription_id: Option<u64>,
        signature: String,
        logs: Vec<String>,
        failed: bool,
    },
    Other,
}

/// Pick the streaming endpoint: the configured one, or one derived from the RPC URL
pub fn resolve_websocket_endpoint(config: &MonitorConfig) -> MonitorResult<String> {
    if let Some(endpoint) = &config.websocket_endpoint {
        let url = Url::parse(endpoint)
            .map_err(|e| MonitorError::ConfigError(format!("Invalid WebSocket endpoint: {}", e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(MonitorError::ConfigError(
                "WebSocket endpoint must start with ws:// or wss://".to_string(),
            ));
        }
        return Ok(endpoint.clone());
    }

    let mut url = Url::parse(&config.rpc_endpoint)
        .map_err(|e| MonitorError::ConfigError(format!("Invalid RPC endpoint: {}", e)))?;

    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(MonitorError::ConfigError(format!(
                "Cannot derive WebSocket endpoint from scheme {}",
                other
            )));
        }
    };

    url.set_scheme(scheme).map_err(|_| {
        MonitorError::ConfigError(format!("Cannot derive WebSocket endpoint from {}", url))
    })?;

    Ok(url.to_string())
}

pub fn logs_subscribe_request(request_id: u64, program_id: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": "logsSubscribe",
        "params": [
            { "mentions": [program_id] },
            { "commitment": SUBSCRIPTION_COMMITMENT }
        ]
    })
}

pub fn logs_unsubscribe_request(request_id: u64, subscription_id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": "logsUnsubscribe",
        "params": [subscription_id]
    })
}

/// Decode a text frame from the subscription socket
pub fn parse_frame(text: &str) -> MonitorResult<StreamFrame> {
    let message: Value = serde_json::from_str(text)?;
    let request_id = message.get("id").and_then(Value::as_u64);

    if let Some(err) = message.get("error") {
        return Ok(StreamFrame::RpcError {
            request_id,
            code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    if let (Some(request_id), Some(result)) = (request_id, message.get("result")) {
        if let Some(subscription_id) = result.as_u64() {
            return Ok(StreamFrame::SubscriptionAck {
                request_id,
                subscription_id,
            });
        }
        if let Some(success) = result.as_bool() {
            return Ok(StreamFrame::UnsubscribeAck {
                request_id,
                success,
            });
        }
        return Ok(StreamFrame::Other);
    }

    if message.get("method").and_then(Value::as_str) != Some("logsNotification") {
        return Ok(StreamFrame::Other);
    }

    let params = message
        .get("params")
        .ok_or_else(|| MonitorError::InvalidResponse("Notification without params".to_string()))?;
    let value = params
        .get("result")
        .and_then(|r| r.get("value"))
        .ok_or_else(|| MonitorError::InvalidResponse("Notification without value".to_string()))?;

    let signature = value
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| MonitorError::InvalidResponse("Notification without signature".to_string()))?
        .to_string();

    let logs = value
        .get("logs")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let failed = value.get("err").is_some_and(|e| !e.is_null());

    Ok(StreamFrame::LogsNotification {
        subscription_id: params.get("subscription").and_then(Value::as_u64),
        signature,
        logs,
        failed,
    })
}

/// Owns the subscription socket
pub struct WebSocketManager {
    endpoint: String,
    program_id: String,
    connect_timeout: Duration,
    ws_stream: Option<WsStream>,
    next_request_id: u64,
    pending_subscribe: Option<u64>,
    subscription_id: Option<u64>,
}

impl WebSocketManager {
    pub fn new(config: &MonitorConfig) -> MonitorResult<Self> {
        Ok(Self {
            endpoint: resolve_websocket_endpoint(config)?,
            program_id: config.program_id.clone(),
            connect_timeout: Duration::from_secs(config.connection_timeout_secs.max(1)),
            ws_stream: None,
            next_request_id: 1,
            pending_subscribe: None,
            subscription_id: None,
        })
    }

    pub fn subscription_id(&self) -> Option<u64> {
        self.subscription_id
    }

    pub async fn connect(&mut self) -> MonitorResult<()> {
        info!("Connecting to WebSocket: {}", self.endpoint);
        self.subscription_id = None;
        self.pending_subscribe = None;

        match timeout(self.connect_timeout, connect_async(&self.endpoint)).await {
            Ok(Ok((stream, response))) => {
                info!("WebSocket connected: {:?}", response.status());
                self.ws_stream = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Failed to connect to WebSocket: {}", e);
                Err(MonitorError::ConnectionFailed(e.to_string()))
            }
            Err(_) => {
                error!("Timed out connecting to WebSocket");
                Err(MonitorError::Timeout)
            }
        }
    }

    fn request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    async fn send_json(&mut self, request: Value) -> MonitorResult<()> {
        let stream = self
            .ws_stream
            .as_mut()
            .ok_or_else(|| MonitorError::ConnectionFailed("Not connected".to_string()))?;
        stream.send(Message::Text(request.to_string())).await?;
        Ok(())
    }

    /// Issue the single program-scoped `logsSubscribe`; returns its request id
    pub async fn subscribe_to_logs(&mut self) -> MonitorResult<u64> {
        let request_id = self.request_id();
        info!("Subscribing to logs mentioning {}", self.program_id);

        let request = logs_subscribe_request(request_id, &self.program_id);
        self.send_json(request).await?;
        self.pending_subscribe = Some(request_id);
        Ok(request_id)
    }

    /// Record the subscription handle if `frame` acknowledges our subscribe
    pub fn accept_ack(&mut self, request_id: u64, subscription_id: u64) -> bool {
        if self.pending_subscribe != Some(request_id) {
            return false;
        }
        self.pending_subscribe = None;
        self.subscription_id = Some(subscription_id);
        info!("Subscription confirmed: {}", subscription_id);
        true
    }

    /// Whether an error frame rejects our pending subscribe
    pub fn reject_pending(&mut self, request_id: Option<u64>) -> bool {
        if request_id.is_some() && request_id == self.pending_subscribe {
            self.pending_subscribe = None;
            return true;
        }
        false
    }

    /// Best-effort unsubscribe
    pub async fn unsubscribe(&mut self) {
        let Some(subscription_id) = self.subscription_id.take() else {
            return;
        };
        let request_id = self.request_id();
        match self
            .send_json(logs_unsubscribe_request(request_id, subscription_id))
            .await
        {
            Ok(()) => debug!("Unsubscribed from {}", subscription_id),
            Err(e) => warn!("Failed to unsubscribe {}: {}", subscription_id, e),
        }
    }

    pub async fn receive_message(&mut self) -> MonitorResult<Option<Message>> {
        let stream = self
            .ws_stream
            .as_mut()
            .ok_or_else(|| MonitorError::ConnectionFailed("Not connected".to_string()))?;
        Ok(stream.next().await.transpose()?)
    }

    pub async fn send_pong(&mut self, payload: Vec<u8>) -> MonitorResult<()> {
        let stream = self
            .ws_stream
            .as_mut()
            .ok_or_else(|| MonitorError::ConnectionFailed("Not connected".to_string()))?;
        stream.send(Message::Pong(payload)).await?;
        Ok(())
    }

    /// Close with a normal close code
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.ws_stream.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: Cow::Borrowed("session stopped"),
            };
            if let Err(e) = stream.close(Some(frame)).await {
                debug!("Error while closing WebSocket: {}", e);
            }
        }
        self.subscription_id = None;
        self.pending_subscribe = None;
    }

    /// Forget a dead connection without a close handshake
    pub fn drop_connection(&mut self) {
        self.ws_stream = None;
        self.subscription_id = None;
        self.pending_subscribe = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_shape() {
        let request = logs_subscribe_request(7, "Prog1111");
        assert_eq!(request["method"], "logsSubscribe");
        assert_eq!(request["id"], 7);
        assert_eq!(request["params"][0]["mentions"][0], "Prog1111");
        assert_eq!(request["params"][1]["commitment"], "processed");

        let unsubscribe = logs_unsubscribe_request(8, 42);
        assert_eq!(unsubscribe["method"], "logsUnsubscribe");
        assert_eq!(unsubscribe["params"][0], 42);
    }

    #[test]
    fn test_parse_ack_and_error() {
        assert_eq!(
            parse_frame(r#"{"jsonrpc":"2.0","result":23784,"id":1}"#).unwrap(),
            StreamFrame::SubscriptionAck {
                request_id: 1,
                subscription_id: 23784
            }
        );
        assert_eq!(
            parse_frame(r#"{"jsonrpc":"2.0","result":true,"id":2}"#).unwrap(),
            StreamFrame::UnsubscribeAck {
                request_id: 2,
                success: true
            }
        );
        assert_eq!(
            parse_frame(
                r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":1}"#
            )
            .unwrap(),
            StreamFrame::RpcError {
                request_id: Some(1),
                code: -32602,
                message: "Invalid params".to_string()
            }
        );
    }

    #[test]
    fn test_parse_notification() {
        let text = r#"{
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "context": { "slot": 5208469 },
                    "value": {
                        "signature": "5h6xBEauJ3PK6SWCZ1PGjBvj8vDdWG3KpwATGy1ARAXFSDwt8GFXM7W5Ncn16wmqokgpiKRLuS83KUxyZyv2sUYv",
                        "err": null,
                        "logs": ["Program log: Instruction: Buy"]
                    }
                },
                "subscription": 24040
            }
        }"#;

        match parse_frame(text).unwrap() {
            StreamFrame::LogsNotification {
                subscription_id,
                signature,
                logs,
                failed,
            } => {
                assert_eq!(subscription_id, Some(24040));
                assert!(signature.starts_with("5h6x"));
                assert_eq!(logs.len(), 1);
                assert!(!failed);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_parse_failed_notification_and_noise() {
        let text = r#"{"method":"logsNotification","params":{"result":{"value":{"signature":"abc","err":{"InstructionError":[0,"Custom"]},"logs":[]}}}}"#;
        assert!(matches!(
            parse_frame(text).unwrap(),
            StreamFrame::LogsNotification { failed: true, .. }
        ));

        assert_eq!(
            parse_frame(r#"{"method":"slotNotification","params":{}}"#).unwrap(),
            StreamFrame::Other
        );
        assert!(parse_frame("not json").is_err());
    }

    #[test]
    fn test_endpoint_resolution() {
        let mut config = MonitorConfig {
            rpc_endpoint: "https://rpc.example.com/?api-key=abc".to_string(),
            websocket_endpoint: None,
            ..Default::default()
        };
        assert_eq!(
            resolve_websocket_endpoint(&config).unwrap(),
            "wss://rpc.example.com/?api-key=abc"
        );

        config.rpc_endpoint = "http://127.0.0.1:8899".to_string();
        assert_eq!(
            resolve_websocket_endpoint(&config).unwrap(),
            "ws://127.0.0.1:8899/"
        );

        config.websocket_endpoint = Some("wss://stream.example.com".to_string());
        assert_eq!(
            resolve_websocket_endpoint(&config).unwrap(),
            "wss://stream.example.com"
        );

        config.websocket_endpoint = Some("https://wrong.example.com".to_string());
        assert!(resolve_websocket_endpoint(&config).is_err());
    }

    #[test]
    fn test_ack_matching() {
        let mut manager = WebSocketManager::new(&MonitorConfig::default()).unwrap();
        manager.pending_subscribe = Some(3);

        assert!(!manager.accept_ack(2, 99));
        assert!(manager.accept_ack(3, 99));
        assert_eq!(manager.subscription_id(), Some(99));

        manager.pending_subscribe = Some(4);
        assert!(!manager.reject_pending(None));
        assert!(manager.reject_pending(Some(4)));
    }
}
