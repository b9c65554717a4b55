//! Docker event handling.
//!
//! `create` events wire up endpoints of containers running on other nodes,
//! `stop`/`destroy`/`die` events tear them down again. Every event is handled
//! on its own thread, so the cache tolerates duplicates and any ordering.

use crate::concurrency::shutdown_requested;
use crate::context::NodeContext;
use crate::CoreError;
use cilium_actuator::{add_endpoint, remove_endpoint, remove_local_endpoint, DockerEvent};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Failed `add_endpoint` runs after which a container is given up on.
pub const MAX_ADD_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Seen, with the number of failed attempts so far.
    Pending(u32),
    Configured,
    Failed,
}

/// Containers this process has seen a `create` event for.
#[derive(Debug, Default)]
pub struct ContainerCache {
    entries: Mutex<HashMap<String, CacheState>>,
}

impl ContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `id`, returning its current state. New entries start pending.
    pub fn add(&self, id: &str) -> CacheState {
        *self
            .entries()
            .entry(id.to_owned())
            .or_insert(CacheState::Pending(0))
    }

    /// Count one more failure of a pending entry. Returns the new count, 0
    /// for unknown or settled entries.
    pub fn inc_fail(&self, id: &str) -> u32 {
        match self.entries().get_mut(id) {
            Some(CacheState::Pending(n)) => {
                *n += 1;
                *n
            }
            _ => 0,
        }
    }

    /// Update an entry that is already tracked.
    pub fn set(&self, id: &str, state: CacheState) {
        if let Some(entry) = self.entries().get_mut(id) {
            *entry = state;
        }
    }

    /// True when `id` was tracked.
    pub fn remove(&self, id: &str) -> bool {
        self.entries().remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<CacheState> {
        self.entries().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Clone)]
pub struct EventProcessor {
    ctx: NodeContext,
    cache: Arc<ContainerCache>,
}

impl EventProcessor {
    pub fn new(ctx: NodeContext) -> Self {
        Self {
            ctx,
            cache: Arc::new(ContainerCache::new()),
        }
    }

    pub fn cache(&self) -> &ContainerCache {
        &self.cache
    }

    pub fn process(&self, event: &DockerEvent) {
        debug!("event {} for {} from '{}'", event.status, event.id, event.from);
        match event.status.as_str() {
            "create" => self.on_create(&event.id),
            "stop" | "destroy" | "die" => self.on_remove(event),
            _ => {}
        }
    }

    fn on_create(&self, id: &str) {
        let CacheState::Pending(failures) = self.cache.add(id) else {
            return;
        };
        if failures >= MAX_ADD_ATTEMPTS {
            return;
        }
        info!("adding endpoint for {id}");
        let ctx = &self.ctx;
        match add_endpoint(
            ctx.db.as_ref(),
            ctx.runner.as_ref(),
            &ctx.env,
            &ctx.retries.endpoint,
            id,
        ) {
            Ok(()) => self.cache.set(id, CacheState::Configured),
            Err(e) => {
                warn!("failed to add endpoint for {id}: {e}");
                if self.cache.inc_fail(id) >= MAX_ADD_ATTEMPTS {
                    self.cache.set(id, CacheState::Failed);
                }
            }
        }
    }

    fn on_remove(&self, event: &DockerEvent) {
        let id = event.id.as_str();
        if !self.cache.remove(id) {
            return;
        }
        info!("removing endpoint for {id}");
        let ctx = &self.ctx;
        if ctx.env.is_local_origin(&event.from) {
            match ctx.db.get_endpoint(id) {
                Ok(endpoint) => {
                    for ip in &endpoint.ips {
                        if let Err(e) = ctx.db.delete_ip(ip) {
                            warn!("failed to release {ip} of {id}: {e}");
                        }
                    }
                    if let Err(e) = remove_local_endpoint(
                        ctx.db.as_ref(),
                        ctx.runner.as_ref(),
                        &ctx.env,
                        &ctx.retries.endpoint,
                        id,
                    ) {
                        warn!("failed to remove local endpoint of {id}: {e}");
                    }
                    if let Err(e) = ctx.db.delete_endpoint(id) {
                        warn!("failed to delete endpoint record of {id}: {e}");
                    }
                }
                Err(e) => warn!("failed to read endpoint of {id}: {e}"),
            }
        }
        if let Err(e) = remove_endpoint(ctx.runner.as_ref(), &ctx.env, id) {
            warn!("failed to remove endpoint of {id}: {e}");
        }
    }

    /// Handle `event` on a thread of its own.
    pub fn spawn(&self, event: DockerEvent) -> JoinHandle<()> {
        let processor = self.clone();
        thread::spawn(move || processor.process(&event))
    }

    pub fn wait_for_docker(&self) -> Result<(), CoreError> {
        let policy = self.ctx.retries.docker_ready;
        policy
            .run(|attempt| {
                info!("waiting for the docker daemon, attempt {attempt}");
                match self.ctx.docker.ping() {
                    Ok(()) => Some(()),
                    Err(e) => {
                        debug!("docker daemon not ready: {e}");
                        None
                    }
                }
            })
            .ok_or(CoreError::DockerUnavailable(policy.attempts))
    }

    /// A `create` event from `self` for every running container.
    pub fn reconcile_events(&self) -> Result<Vec<DockerEvent>, CoreError> {
        self.wait_for_docker()?;
        let now = Utc::now().timestamp();
        Ok(self
            .ctx
            .docker
            .list_containers(false)?
            .into_iter()
            .map(|c| DockerEvent {
                id: c.id,
                status: "create".to_owned(),
                from: "self".to_owned(),
                time: now,
            })
            .collect())
    }

    pub fn reconcile(&self) -> Result<Vec<JoinHandle<()>>, CoreError> {
        let events = self.reconcile_events()?;
        debug!("reconciling {} containers", events.len());
        Ok(events.into_iter().map(|e| self.spawn(e)).collect())
    }

    /// Handle events newer than `since` until the stream ends or shutdown is
    /// requested.
    pub fn listen(&self, since: i64) -> Result<(), CoreError> {
        self.ctx.docker.stream_events(since, &mut |event| {
            if shutdown_requested() {
                return false;
            }
            self.spawn(event);
            true
        })?;
        Ok(())
    }

    /// Wait for the daemon, then listen from now on a background thread.
    pub fn start_listener(&self) -> JoinHandle<()> {
        let processor = self.clone();
        thread::spawn(move || {
            if let Err(e) = processor.wait_for_docker() {
                error!("unable to monitor docker events: {e}");
                return;
            }
            info!("listening for docker events");
            if let Err(e) = processor.listen(Utc::now().timestamp()) {
                error!("docker event stream failed: {e}");
            }
        })
    }

    /// Reconcile every `interval` until shutdown is requested.
    pub fn start_reconcile_loop(&self, interval: Duration) -> JoinHandle<()> {
        let processor = self.clone();
        thread::spawn(move || {
            while !shutdown_requested() {
                let started = Instant::now();
                if let Err(e) = processor.reconcile() {
                    error!("failed to update state from the other nodes: {e}");
                }
                let deadline = started + interval;
                while !shutdown_requested() {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    thread::sleep(left.min(Duration::from_secs(1)));
                }
            }
        })
    }
}
