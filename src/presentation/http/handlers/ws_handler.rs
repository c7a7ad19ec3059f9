//! Realtime gateway: one WebSocket per client, bridging the tenant's bus
//! topic to the socket. The bridge never blocks publishers; a slow socket
//! loses oldest events (counted) instead of applying backpressure upstream.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::application::ports::{BusRecv, EventBus};
use crate::domain::events::JobEvent;
use crate::domain::value_objects::TenantId;
use crate::presentation::http::auth::AuthConfig;
use crate::presentation::http::error::ApiError;

pub const CLOSE_BUS_UNAVAILABLE: u16 = 4000;
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
pub const CLOSE_MISSING_TENANT: u16 = 4002;
pub const CLOSE_IDLE_TIMEOUT: u16 = 4003;

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub struct WsHandler {
    bus: Arc<dyn EventBus>,
    auth: Arc<AuthConfig>,
    config: WsConfig,
    dropped_events: AtomicU64,
}

impl WsHandler {
    pub fn new(bus: Arc<dyn EventBus>, auth: Arc<AuthConfig>, config: WsConfig) -> Self {
        Self {
            bus,
            auth,
            config,
            dropped_events: AtomicU64::new(0),
        }
    }

    pub fn dropped_event_count(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub async fn upgrade(
        State(handler): State<Arc<WsHandler>>,
        headers: HeaderMap,
        Query(query): Query<WsQuery>,
        ws: WebSocketUpgrade,
    ) -> impl IntoResponse {
        // Authentication is resolved before the upgrade; the result decides
        // whether the socket starts bridging or closes immediately with the
        // matching application close code.
        let auth_result = handler.auth.authenticate(&headers, query.token.as_deref());
        ws.on_upgrade(move |socket| async move {
            match auth_result {
                Ok(tenant) => handler.bridge(socket, tenant).await,
                Err(e) => {
                    let code = match e {
                        ApiError::MissingTenant => CLOSE_MISSING_TENANT,
                        _ => CLOSE_UNAUTHORIZED,
                    };
                    close(socket, code, "authentication failed").await;
                }
            }
        })
    }

    async fn bridge(&self, mut socket: WebSocket, tenant: TenantId) {
        let mut subscription = match self.bus.subscribe(&tenant).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "bus subscribe failed");
                close(socket, CLOSE_BUS_UNAVAILABLE, "bus unavailable").await;
                return;
            }
        };

        if send_event(&mut socket, &JobEvent::connected(&tenant)).await.is_err() {
            return;
        }
        info!(tenant = %tenant, "websocket connected");

        let mut pings = interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        let mut last_pong = Instant::now();
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                received = subscription.recv() => match received {
                    BusRecv::Event(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    BusRecv::Lagged(n) => {
                        self.dropped_events.fetch_add(n, Ordering::Relaxed);
                        debug!(tenant = %tenant, dropped = n, "subscriber lagged, oldest events dropped");
                    }
                    BusRecv::Closed => {
                        close(socket, CLOSE_BUS_UNAVAILABLE, "bus unavailable").await;
                        return;
                    }
                },

                _ = pings.tick() => {
                    if awaiting_pong
                        && last_pong.elapsed() > self.config.ping_interval + self.config.ping_timeout
                    {
                        close(socket, CLOSE_IDLE_TIMEOUT, "idle timeout").await;
                        return;
                    }
                    if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    awaiting_pong = true;
                }

                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // inbound payloads are ignored
                    Some(Err(e)) => {
                        debug!(tenant = %tenant, error = %e, "websocket read error");
                        break;
                    }
                },
            }
        }

        // Dropping the subscription releases the bus receiver.
        info!(tenant = %tenant, "websocket disconnected");
    }
}

async fn send_event(socket: &mut WebSocket, event: &JobEvent) -> Result<(), ()> {
    let payload = serde_json::to_string(event).map_err(|_| ())?;
    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

async fn close(mut socket: WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}
