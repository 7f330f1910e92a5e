//! Dashboard session
//!
//! Ties a [`DeviceStore`] to a push channel for as long as a view is
//! showing it: mount connects and loads, unmount tears everything down.

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, LightingApi};
use crate::config::Config;
use crate::error::ApiResult;
use crate::push::{spawn_push_channel, PushChannelConfig, PushChannelHandle};
use crate::store::DeviceStore;

/// A mounted dashboard
pub struct Dashboard<A: LightingApi = ApiClient> {
    store: DeviceStore<A>,
    channel: PushChannelHandle,
    pump: JoinHandle<()>,
}

impl Dashboard<ApiClient> {
    /// Mount against the gateway described by `config`
    ///
    /// Only fails if the HTTP client cannot be built. A failed initial load
    /// is left in the store's error for the caller to show.
    pub async fn mount(config: &Config) -> ApiResult<Self> {
        let api = ApiClient::new(config.clone())?;
        Ok(Self::mount_with(api, config).await)
    }
}

impl<A: LightingApi> Dashboard<A> {
    /// Mount with an explicit API implementation
    pub async fn mount_with(api: A, config: &Config) -> Self {
        let store = DeviceStore::new(api, config.group_refresh_delay());

        let mut channel = spawn_push_channel(PushChannelConfig::from(config));
        let pump = match channel.take_events() {
            Some(mut events) => {
                let store = store.clone();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        store.apply_push_event(&event);
                    }
                    debug!("Push event pump stopped");
                })
            }
            None => tokio::spawn(async {}),
        };

        if let Err(e) = store.refresh_all().await {
            warn!("Initial load failed: {}", e);
        }
        info!("Dashboard mounted");

        Self {
            store,
            channel,
            pump,
        }
    }

    pub fn store(&self) -> &DeviceStore<A> {
        &self.store
    }

    pub fn channel(&self) -> &PushChannelHandle {
        &self.channel
    }

    /// Fire-and-forget command over the push channel
    pub fn send_command(&self, target: &str, action: &str, params: Map<String, Value>) -> bool {
        self.channel.send_command(target, action, params)
    }

    /// Close the push channel, stop forwarding events and cancel scheduled refreshes
    pub async fn unmount(self) {
        self.channel.shutdown().await;
        // Channel task dropped its sender, so the pump drains and exits
        let _ = self.pump.await;
        self.store.shutdown();
        info!("Dashboard unmounted");
    }
}
