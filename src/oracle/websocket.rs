//! Connection Worker - one long-lived websocket to an exchange endpoint
//!
//! Connects, sends the subscription frames, hands every inbound frame to
//! the provider callback in arrival order and probes liveness on a fixed
//! interval. Any transport failure closes the socket and reconnects with
//! the same subscription frames, forever, until the cancellation token
//! fires.

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::types::ProviderName;

/// Receives every raw frame of a connection, text or binary.
pub type FrameHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);

const BACKOFF_JITTER_RATIO: f64 = 0.20;

/// Probe sent on every keepalive tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepAlive {
    /// Websocket protocol ping; the pong counts as liveness.
    Ping,
    /// Application-level text frame, for exchanges that ignore protocol pings.
    Text(String),
}

impl KeepAlive {
    fn probe(&self) -> Message {
        match self {
            KeepAlive::Ping => Message::Ping(Vec::new()),
            KeepAlive::Text(payload) => Message::Text(payload.clone()),
        }
    }
}

/// Delay between reconnect attempts. Retries are never capped in number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Reconnect as soon as the previous socket is gone.
    Immediate,
    Fixed(Duration),
    /// Doubling delay from `base` up to `max`, with +/-20% jitter.
    Backoff { base: Duration, max: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Backoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Immediate => Duration::ZERO,
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Backoff { base, max } => {
                let exponent = attempt.saturating_sub(1).min(16);
                let bounded = base.saturating_mul(1u32 << exponent).min(max);
                let jitter = rand::thread_rng()
                    .gen_range(1.0 - BACKOFF_JITTER_RATIO..=1.0 + BACKOFF_JITTER_RATIO);
                bounded.mul_f64(jitter).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub ping_interval: Duration,
    /// Reconnect when nothing (frame or pong) arrived for this long.
    pub stall_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            stall_timeout: DEFAULT_PING_INTERVAL * 2,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

enum SessionEnd {
    Cancelled,
    Reconnect(&'static str),
}

pub struct WebsocketConnection {
    provider: ProviderName,
    id: usize,
    url: String,
    subscription_msgs: Vec<String>,
    handler: FrameHandler,
    keepalive: KeepAlive,
    settings: ConnectionSettings,
}

impl WebsocketConnection {
    pub fn new(
        provider: ProviderName,
        id: usize,
        url: impl Into<String>,
        subscription_msgs: Vec<String>,
        handler: FrameHandler,
        keepalive: KeepAlive,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            provider,
            id,
            url: url.into(),
            subscription_msgs,
            handler,
            keepalive,
            settings,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Connect/read/reconnect until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut reconnect_attempt: u32 = 0;

        loop {
            info!(
                provider = %self.provider,
                connection = self.id,
                attempt = reconnect_attempt + 1,
                "Connecting to websocket: {}", self.url
            );

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match connected {
                Ok((ws_stream, _)) => {
                    reconnect_attempt = 0;
                    match self.session(ws_stream, &cancel).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Reconnect(reason) => {
                            warn!(
                                provider = %self.provider,
                                connection = self.id,
                                reason,
                                "Websocket session ended"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        provider = %self.provider,
                        connection = self.id,
                        error = %e,
                        "Failed to connect websocket"
                    );
                }
            }

            reconnect_attempt = reconnect_attempt.saturating_add(1);
            let delay = self.settings.reconnect.delay(reconnect_attempt);
            warn!(
                provider = %self.provider,
                connection = self.id,
                attempt = reconnect_attempt,
                delay_ms = delay.as_millis() as u64,
                "Websocket reconnect scheduled"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(provider = %self.provider, connection = self.id, "Websocket connection stopped");
    }

    async fn session(&self, ws_stream: WsStream, cancel: &CancellationToken) -> SessionEnd {
        let (mut write, mut read) = ws_stream.split();

        for msg in &self.subscription_msgs {
            if let Err(e) = write.send(Message::Text(msg.clone())).await {
                warn!(
                    provider = %self.provider,
                    connection = self.id,
                    error = %e,
                    "Failed to send subscription"
                );
                return SessionEnd::Reconnect("subscribe_send_failed");
            }
        }

        info!(
            provider = %self.provider,
            connection = self.id,
            subscriptions = self.subscription_msgs.len(),
            "Connected to websocket"
        );

        let period = self.settings.ping_interval;
        let mut ping_interval = tokio::time::interval_at(Instant::now() + period, period);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_activity = Instant::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            last_activity = Instant::now();
                            (self.handler)(text.as_bytes());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            last_activity = Instant::now();
                            (self.handler)(data.as_slice());
                        }
                        Some(Ok(Message::Ping(data))) => {
                            last_activity = Instant::now();
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_activity = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) => {
                            debug!(
                                provider = %self.provider,
                                connection = self.id,
                                "Websocket closed by server"
                            );
                            return SessionEnd::Reconnect("remote_close");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(
                                provider = %self.provider,
                                connection = self.id,
                                error = %e,
                                "Websocket error"
                            );
                            return SessionEnd::Reconnect("stream_error");
                        }
                        None => return SessionEnd::Reconnect("stream_ended"),
                    }
                }

                _ = ping_interval.tick() => {
                    if last_activity.elapsed() >= self.settings.stall_timeout {
                        warn!(
                            provider = %self.provider,
                            connection = self.id,
                            silence_ms = last_activity.elapsed().as_millis() as u64,
                            "No keepalive response; reconnecting"
                        );
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Reconnect("keepalive_timeout");
                    }
                    if let Err(e) = write.send(self.keepalive.probe()).await {
                        warn!(
                            provider = %self.provider,
                            connection = self.id,
                            error = %e,
                            "Keepalive send failed"
                        );
                        return SessionEnd::Reconnect("ping_send_failed");
                    }
                }
            }
        }
    }
}
