//! Connection Controller - the set of websocket workers behind one provider
//!
//! Workers registered before `start_connections` are held until start;
//! workers added afterwards are spawned immediately. Each worker runs on
//! its own task under a child of the provider's cancellation token, so a
//! reconnecting worker never stalls its siblings.

use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::websocket::{ConnectionSettings, FrameHandler, KeepAlive, WebsocketConnection};
use crate::types::ProviderName;

#[derive(Default)]
struct ControllerState {
    pending: Vec<WebsocketConnection>,
    running: Vec<JoinHandle<()>>,
    started: bool,
    next_id: usize,
}

pub struct WebsocketController {
    provider: ProviderName,
    url: String,
    settings: ConnectionSettings,
    cancel: CancellationToken,
    state: Mutex<ControllerState>,
}

impl WebsocketController {
    pub fn new(
        provider: ProviderName,
        url: impl Into<String>,
        settings: ConnectionSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            url: url.into(),
            settings,
            cancel,
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Register a worker for `subscription_msgs`; spawns it right away once started.
    ///
    /// Returns the worker's connection id.
    pub fn add_connection(
        &self,
        subscription_msgs: Vec<String>,
        handler: FrameHandler,
        keepalive: KeepAlive,
    ) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;

        let connection = WebsocketConnection::new(
            self.provider,
            id,
            self.url.clone(),
            subscription_msgs,
            handler,
            keepalive,
            self.settings,
        );

        if state.started {
            let handle = self.spawn(connection);
            state.running.push(handle);
        } else {
            state.pending.push(connection);
        }
        id
    }

    /// Spawn every pending worker. Must run inside a tokio runtime. Idempotent.
    pub fn start_connections(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.started {
            return;
        }
        state.started = true;

        let pending = std::mem::take(&mut state.pending);
        info!(
            provider = %self.provider,
            connections = pending.len(),
            "Starting websocket connections"
        );
        for connection in pending {
            let handle = self.spawn(connection);
            state.running.push(handle);
        }
    }

    fn spawn(&self, connection: WebsocketConnection) -> JoinHandle<()> {
        tokio::spawn(connection.run(self.cancel.child_token()))
    }

    /// Registered workers, started or not.
    pub fn connection_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending.len() + state.running.len()
    }

    pub fn is_started(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .started
    }

    /// Cancel every worker and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.pending.clear();
            std::mem::take(&mut state.running)
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!(provider = %self.provider, "Websocket connections shut down");
    }
}
