//! # Environment: the public facade of a cells mesh.
//!
//! An [`Environment`] owns a [`Registry`] of cells and routes everything:
//! starting and stopping cells, topology changes, event emission, and timed
//! request/reply over the one-way event fabric.
//!
//! ## Architecture
//! ```text
//! Environment ──► Registry ──► CellHandle (mailbox + supervised loop)
//!      │                            │
//!      │  emit(id, event) ──────────┴─► target mailbox
//!      │                                   └─► backend loop ─► behavior
//!      │                                            └─► Context::emit ─► subscriber mailboxes
//!      └─► request(id, topic, ..) ─► reply channel in payload ─► timeout or value
//! ```
//!
//! ## Rules
//! - Equality between environments is by identity.
//! - [`stop`](Environment::stop) is idempotent and must be called explicitly;
//!   dropping the last handle only triggers an advisory teardown that cancels
//!   cell loops without waiting for them.
//! - Cells capture the monitoring sink current at their start;
//!   [`set_monitoring`](Environment::set_monitoring) affects cells started
//!   afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tracing::info;

use crate::cells::Behavior;
use crate::config::Config;
use crate::error::CellError;
use crate::events::{
    default_queue_factory, Event, EventQueue, Payload, QueueFactory, Reply, ReplySender, Scene,
    Value, RESPONSE_KEY,
};
use crate::ident;
use crate::monitoring::{Monitoring, NullMonitoring};
use crate::registry::Registry;

/// Container for a set of cells and their subscription graph.
///
/// Cheap to clone; all clones refer to the same environment.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

pub(crate) struct EnvInner {
    id: String,
    config: Config,
    registry: Registry,
    queue_factory: QueueFactory,
    monitoring: StdRwLock<Arc<dyn Monitoring>>,
    stopped: AtomicBool,
}

impl Drop for EnvInner {
    fn drop(&mut self) {
        // Safety net only: cancel loops and close mailboxes, without joining.
        if !self.stopped.load(Ordering::SeqCst) {
            self.registry.abort_all();
        }
    }
}

/// Builder for an [`Environment`] with optional overrides.
pub struct EnvironmentBuilder {
    id: Option<String>,
    config: Config,
    queue_factory: Option<QueueFactory>,
    monitoring: Option<Arc<dyn Monitoring>>,
}

impl EnvironmentBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            id: None,
            config: Config::default(),
            queue_factory: None,
            monitoring: None,
        }
    }

    /// Sets the environment id; a v4 UUID is generated otherwise.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the factory building each cell's mailbox.
    pub fn queue_factory(mut self, factory: QueueFactory) -> Self {
        self.queue_factory = Some(factory);
        self
    }

    /// Sets the monitoring sink ([`NullMonitoring`] otherwise).
    pub fn monitoring(mut self, monitoring: Arc<dyn Monitoring>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Builds the environment.
    pub fn build(self) -> Environment {
        let id = self.id.unwrap_or_else(ident::new_env_id);
        let inner = Arc::new(EnvInner {
            id: id.clone(),
            config: self.config,
            registry: Registry::new(),
            queue_factory: self.queue_factory.unwrap_or_else(default_queue_factory),
            monitoring: StdRwLock::new(
                self.monitoring
                    .unwrap_or_else(|| Arc::new(NullMonitoring) as Arc<dyn Monitoring>),
            ),
            stopped: AtomicBool::new(false),
        });
        info!(environment = %id, "environment started");
        Environment { inner }
    }
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates an environment with defaults and a generated id.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an environment with the given id and defaults otherwise.
    pub fn named(id: impl Into<String>) -> Self {
        Self::builder().id(id).build()
    }

    /// Returns a builder for full control over the construction.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// The environment id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Replaces the monitoring sink for cells started from now on.
    pub fn set_monitoring(&self, monitoring: Arc<dyn Monitoring>) {
        *write_unpoisoned(&self.inner.monitoring) = monitoring;
    }

    /// Starts a cell with the given id around the behavior.
    ///
    /// Fails with `DuplicateCell` if the id is taken and with `CellInit` if
    /// the behavior's init hook fails.
    pub async fn start_cell<B: Behavior>(
        &self,
        id: impl Into<String>,
        behavior: B,
    ) -> Result<(), CellError> {
        let behavior_ident = ident::type_ident::<B>();
        self.inner
            .registry
            .start_cell(self, id.into(), Box::new(behavior), &behavior_ident)
            .await
    }

    /// Stops a cell, waits for its loop, and returns the loop's exit result.
    pub async fn stop_cell(&self, id: &str) -> Result<(), CellError> {
        self.inner.registry.stop_cell(id).await
    }

    /// True if a cell with the given id is registered.
    pub async fn has_cell(&self, id: &str) -> bool {
        self.inner.registry.has_cell(id).await
    }

    /// Subscribes cells to the events an emitter re-emits.
    pub async fn subscribe<I, S>(&self, emitter_id: &str, subscriber_ids: I) -> Result<(), CellError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = subscriber_ids.into_iter().map(Into::into).collect();
        self.inner.registry.subscribe(emitter_id, ids).await
    }

    /// Removes subscriptions previously added with
    /// [`subscribe`](Environment::subscribe).
    pub async fn unsubscribe<I, S>(
        &self,
        emitter_id: &str,
        subscriber_ids: I,
    ) -> Result<(), CellError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = subscriber_ids.into_iter().map(Into::into).collect();
        self.inner.registry.unsubscribe(emitter_id, ids).await
    }

    /// The current subscriber ids of an emitter.
    pub async fn subscribers(&self, id: &str) -> Result<Vec<String>, CellError> {
        self.inner.registry.subscribers(id).await
    }

    /// Puts an event into the target cell's own mailbox.
    ///
    /// Fan-out to the target's subscribers happens when its behavior
    /// re-emits via its [`Context`](crate::Context).
    pub async fn emit(&self, id: &str, event: Event) -> Result<(), CellError> {
        let cells = self.inner.registry.cells(id).await?;
        match cells.into_iter().next() {
            Some(cell) => cell.process_event(event),
            None => Err(CellError::CellNotFound { id: id.to_string() }),
        }
    }

    /// Builds an event and puts it into the target cell's mailbox.
    pub async fn emit_new(
        &self,
        id: &str,
        topic: impl Into<String>,
        payload: impl Into<Payload>,
        scene: Scene,
    ) -> Result<(), CellError> {
        self.emit(id, Event::new(topic, payload, scene)?).await
    }

    /// Sends a request event and waits for the reply or the timeout.
    ///
    /// A one-shot reply channel is merged into the payload under
    /// [`RESPONSE_KEY`]; the responding behavior extracts it with
    /// [`Payload::reply`](crate::Payload::reply) and sends exactly one value.
    /// A reply carrying an error is surfaced as that error. A late reply is
    /// silently dropped with the channel.
    pub async fn request(
        &self,
        id: &str,
        topic: &str,
        payload: impl Into<Payload>,
        scene: Scene,
        timeout: Duration,
    ) -> Result<Value, CellError> {
        let (tx, mut rx) = mpsc::channel::<Reply>(1);
        let payload = payload
            .into()
            .apply([(RESPONSE_KEY, Value::Reply(ReplySender::new(tx)))]);
        self.emit_new(id, topic, payload, scene).await?;

        let reply = async {
            match rx.recv().await {
                Some(reply) => reply,
                // Responder dropped the channel without replying; the
                // contract is purely time-based, so wait out the deadline.
                None => std::future::pending().await,
            }
        };
        match time::timeout(timeout, reply).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(CellError::Timeout {
                id: id.to_string(),
                topic: topic.to_string(),
            }),
        }
    }

    /// Stops every cell and tears the environment down.
    ///
    /// Idempotent; collects per-cell failures into a composite `Stopped`
    /// error.
    pub async fn stop(&self) -> Result<(), CellError> {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.inner.registry.stop().await;
        info!(environment = %self.inner.id, "environment terminated");
        result
    }

    pub(crate) fn from_inner(inner: Arc<EnvInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EnvInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn build_queue(&self) -> Arc<dyn EventQueue> {
        (self.inner.queue_factory)(&self.inner.config)
    }

    pub(crate) fn monitoring(&self) -> Arc<dyn Monitoring> {
        read_unpoisoned(&self.inner.monitoring).clone()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Environment {}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

fn read_unpoisoned<'a, T>(lock: &'a StdRwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_unpoisoned<'a, T>(lock: &'a StdRwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
