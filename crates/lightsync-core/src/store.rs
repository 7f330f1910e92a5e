//! Device store
//!
//! The `DeviceStore` owns the client-side view of lights, groups and
//! scenes and keeps it consistent with the gateway:
//! - user commands patch local state first, then go to the server
//! - push events from the gateway patch lights as they arrive
//! - `refresh_all` replaces everything with a fresh fetch
//!
//! ## Consistency
//!
//! Optimistic and push patches are shallow merges into the same fields, so
//! whichever lands last wins per field. Full refreshes are numbered; a
//! refresh that finishes after a newer one has already been applied is
//! discarded instead of overwriting it.
//!
//! ## Usage
//!
//! ```ignore
//! let store = DeviceStore::new(ApiClient::new(config.clone())?, config.group_refresh_delay());
//! store.refresh_all().await?;
//! store.set_light_state("1", Some(true), None).await?;
//! let lights = store.snapshot().lights;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::LightingApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{DeviceCommand, Group, Light, LightStatePatch, Scene};
use crate::push::ServerEvent;

/// Point-in-time view of everything the dashboard shows
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub lights: Vec<Light>,
    pub groups: Vec<Group>,
    pub scenes: Vec<Scene>,
    /// A refresh is in flight
    pub loading: bool,
    /// Last error, replaced by the next failure and cleared by the next refresh
    pub error: Option<String>,
    /// Which refresh the collections came from (0 = never fetched)
    pub generation: u64,
}

impl Snapshot {
    pub fn light(&self, id: &str) -> Option<&Light> {
        self.lights.iter().find(|l| l.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }
}

struct Inner<A> {
    api: A,
    state: watch::Sender<Snapshot>,
    /// Last refresh generation handed out
    refresh_seq: AtomicU64,
    group_refresh_delay: Duration,
    scheduled: Mutex<Vec<JoinHandle<()>>>,
}

/// Client-side store of lights, groups and scenes
///
/// Cheap to clone; clones share the same state.
pub struct DeviceStore<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for DeviceStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: LightingApi> DeviceStore<A> {
    /// Create an empty store
    ///
    /// `group_refresh_delay` is how long to wait after a successful group
    /// command before re-fetching everything.
    pub fn new(api: A, group_refresh_delay: Duration) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(Inner {
                api,
                state,
                refresh_seq: AtomicU64::new(0),
                group_refresh_delay,
                scheduled: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    /// Receive a notification every time the state changes
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.state.subscribe()
    }

    pub fn light(&self, id: &str) -> Option<Light> {
        self.inner.state.borrow().light(id).cloned()
    }

    pub fn group(&self, id: &str) -> Option<Group> {
        self.inner.state.borrow().group(id).cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// Dismiss the current error
    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|s| s.error.take().is_some());
    }

    // ==================== Refresh ====================

    /// Fetch lights, groups and scenes concurrently and replace all three
    ///
    /// Either all three collections are replaced or none are. On failure
    /// the previous state stays and the error is recorded. Never retries.
    pub async fn refresh_all(&self) -> ApiResult<()> {
        let generation = self.inner.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let api = &self.inner.api;
        let result = tokio::try_join!(api.get_devices(), api.get_groups(), api.get_scenes());

        // Only the newest refresh may clear the loading flag
        let newest = generation == self.inner.refresh_seq.load(Ordering::SeqCst);

        match result {
            Ok((lights, groups, scenes)) => {
                debug!(
                    "Refresh {} fetched {} lights, {} groups, {} scenes",
                    generation,
                    lights.len(),
                    groups.len(),
                    scenes.len()
                );
                self.inner.state.send_modify(|s| {
                    if generation > s.generation {
                        s.lights = lights;
                        s.groups = groups;
                        s.scenes = scenes;
                        s.generation = generation;
                    } else {
                        debug!(
                            "Discarding refresh {}, state already at {}",
                            generation, s.generation
                        );
                    }
                    if newest {
                        s.loading = false;
                    }
                });
                Ok(())
            }
            Err(e) => {
                warn!("Refresh failed: {}", e);
                self.inner.state.send_modify(|s| {
                    if generation > s.generation {
                        s.error = Some(e.to_string());
                    }
                    if newest {
                        s.loading = false;
                    }
                });
                Err(e)
            }
        }
    }

    // ==================== Commands ====================

    /// Switch and/or dim a light
    ///
    /// The local light is patched before the request is sent. A failed
    /// request records the error but does not roll the patch back.
    pub async fn set_light_state(
        &self,
        id: &str,
        on: Option<bool>,
        brightness: Option<f64>,
    ) -> ApiResult<()> {
        let patch = LightStatePatch {
            on,
            brightness,
            ..Default::default()
        };
        self.patch_light(id, &patch);

        let command = DeviceCommand::power(on, brightness);
        if let Err(e) = self.inner.api.set_device(id, &command).await {
            warn!("Failed to update light {}: {}", id, e);
            self.record_error(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Switch and/or dim a group
    ///
    /// `any_on`/`all_on` are set locally right away when `on` is given.
    /// On success a full refresh is scheduled after the configured delay,
    /// since the command changes member lights we don't track one by one.
    /// On failure a refresh runs immediately to undo the local change.
    pub async fn set_group_state(
        &self,
        id: &str,
        on: Option<bool>,
        brightness: Option<f64>,
    ) -> ApiResult<()> {
        if let Some(on) = on {
            self.inner.state.send_if_modified(|s| {
                match s.groups.iter_mut().find(|g| g.id == id) {
                    Some(group) => {
                        group.state.any_on = on;
                        group.state.all_on = on;
                        true
                    }
                    None => false,
                }
            });
        }

        let command = DeviceCommand::power(on, brightness);
        match self.inner.api.set_group(id, &command).await {
            Ok(()) => {
                self.schedule_refresh();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to update group {}: {}", id, e);
                // Revert first; the refresh clears the error banner
                let _ = self.refresh_all().await;
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Activate a scene; local state is left alone
    pub async fn activate_scene(&self, id: &str) -> ApiResult<()> {
        if let Err(e) = self.inner.api.activate_scene(id).await {
            warn!("Failed to activate scene {}: {}", id, e);
            self.record_error(&e);
            return Err(e);
        }
        info!("Activated scene {}", id);
        Ok(())
    }

    // ==================== Push events ====================

    /// Apply an event from the push channel
    ///
    /// Status events are merged into the named light. Events for lights we
    /// don't know are ignored. Returns whether local state changed.
    pub fn apply_push_event(&self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::Status { device, state } => {
                let applied = self.patch_light(device, state);
                if !applied {
                    debug!("Ignoring status for unknown light {}", device);
                }
                applied
            }
            ServerEvent::Ack { target } => {
                debug!("Gateway acknowledged command for {}", target);
                false
            }
            ServerEvent::Error { message } => {
                warn!("Gateway reported error: {}", message);
                false
            }
            ServerEvent::Unknown => false,
        }
    }

    // ==================== Lifecycle ====================

    /// Cancel refreshes scheduled by group commands
    pub fn shutdown(&self) {
        let mut scheduled = self
            .inner
            .scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for handle in scheduled.drain(..) {
            handle.abort();
        }
    }

    /// Number of scheduled refreshes that have not run yet
    pub fn pending_refreshes(&self) -> usize {
        let mut scheduled = self
            .inner
            .scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        scheduled.retain(|h| !h.is_finished());
        scheduled.len()
    }

    fn schedule_refresh(&self) {
        let weak: Weak<Inner<A>> = Arc::downgrade(&self.inner);
        // Counted from the command's success, not from the task's first poll
        let deadline = tokio::time::Instant::now() + self.inner.group_refresh_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Store may be gone by now
            if let Some(inner) = weak.upgrade() {
                let store = DeviceStore { inner };
                let _ = store.refresh_all().await;
            }
        });

        let mut scheduled = self
            .inner
            .scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        scheduled.retain(|h| !h.is_finished());
        scheduled.push(handle);
    }

    /// Merge a partial state into one light; false if the light is unknown
    fn patch_light(&self, id: &str, patch: &LightStatePatch) -> bool {
        self.inner
            .state
            .send_if_modified(|s| match s.lights.iter_mut().find(|l| l.id == id) {
                Some(light) => {
                    light.state.apply(patch);
                    true
                }
                None => false,
            })
    }

    fn record_error(&self, err: &ApiError) {
        let message = err.to_string();
        self.inner.state.send_modify(|s| s.error = Some(message));
    }
}
