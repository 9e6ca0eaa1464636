//! # Cell: a behavior bound to a mailbox and a supervised backend loop.
//!
//! Two halves make up a running cell:
//!
//! - [`CellHandle`] — the registry-facing record: the mailbox producers push
//!   into, the subscriber-snapshot channel, and the supervised loop handle.
//! - [`CellWorker`] — the backend loop state, owned by the loop task: the
//!   behavior, the context (with the loop-local subscriber snapshot), and the
//!   consuming side of the mailbox.
//!
//! ## Backend loop
//! ```text
//! loop {
//!   select! (biased)
//!     ├─► stop signal        → behavior.terminate()
//!     ├─► subscriber update  → install fresh snapshot into context
//!     └─► next event         → begin measuring span
//!                              behavior.process_event(ctx, event)
//!                                ├─► Ok  → end span
//!                                └─► Err → kill loop (no further events)
//! }
//! ```
//!
//! ## Rules
//! - The loop is the sole reader and writer of the subscriber snapshot, so
//!   no lock guards it; producers hand off fresh snapshots over the watch
//!   channel.
//! - The `biased` ordering delivers a pending snapshot before the next event
//!   is dequeued.
//! - A panic inside `process_event` unwinds into the supervised loop, which
//!   applies the recovery policy below; worker state (including the
//!   snapshot) survives the restart.
//!
//! ## Recovery policy
//! On a caught panic: log it; if the history holds `recover_limit` panics
//! within `recover_window`, terminate with `RecoveredTooOften`; otherwise ask
//! `behavior.recover(reason)` — an error there terminates with
//! `EventRecovering` — and trim the history to the limit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::error::CellError;
use crate::events::{Event, EventQueue};
use crate::monitoring::Monitoring;
use crate::supervise::{LoopControl, Recoverings, SupervisedLoop, Worker};

use super::behavior::Behavior;
use super::context::{Context, SubscriberRef};

/// Registry-facing record of a running cell.
pub(crate) struct CellHandle {
    id: String,
    queue: Arc<dyn EventQueue>,
    subs_tx: watch::Sender<Vec<SubscriberRef>>,
    looper: SupervisedLoop,
}

impl CellHandle {
    pub(crate) fn new(
        id: String,
        queue: Arc<dyn EventQueue>,
        subs_tx: watch::Sender<Vec<SubscriberRef>>,
        looper: SupervisedLoop,
    ) -> Self {
        Self {
            id,
            queue,
            subs_tx,
            looper,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Enqueues an event into the cell's own mailbox.
    pub(crate) fn process_event(&self, event: Event) -> Result<(), CellError> {
        self.queue.push(event)
    }

    /// Hands a fresh subscriber snapshot to the backend loop.
    pub(crate) fn update_subscribers(&self, subscribers: Vec<SubscriberRef>) {
        self.subs_tx.send_replace(subscribers);
    }

    /// A producer-side handle to this cell's mailbox.
    pub(crate) fn subscriber_ref(&self) -> SubscriberRef {
        SubscriberRef {
            id: self.id.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Signals the loop to stop without joining it.
    pub(crate) fn signal_stop(&self) {
        self.looper.signal_stop();
    }

    /// Signals the loop to stop and joins it, returning its exit result.
    pub(crate) async fn stop(&self) -> Result<(), CellError> {
        self.looper.stop().await
    }

    /// Non-joining teardown for the environment's drop safety net.
    pub(crate) fn abort(&self) {
        self.looper.signal_stop();
        let _ = self.queue.stop();
    }
}

/// Backend loop state; owned by the supervised loop task.
pub(crate) struct CellWorker {
    ctx: Context,
    behavior: Box<dyn Behavior>,
    queue: Arc<dyn EventQueue>,
    subs_rx: watch::Receiver<Vec<SubscriberRef>>,
    subs_closed: bool,
    monitoring: Arc<dyn Monitoring>,
    total_cells_id: String,
    recover_limit: usize,
    recover_window: Duration,
    entered: bool,
}

impl CellWorker {
    pub(crate) fn new(
        ctx: Context,
        behavior: Box<dyn Behavior>,
        queue: Arc<dyn EventQueue>,
        subs_rx: watch::Receiver<Vec<SubscriberRef>>,
        monitoring: Arc<dyn Monitoring>,
        total_cells_id: String,
        config: &Config,
    ) -> Self {
        Self {
            ctx,
            behavior,
            queue,
            subs_rx,
            subs_closed: false,
            monitoring,
            total_cells_id,
            recover_limit: config.recover_limit,
            recover_window: config.recover_window,
            entered: false,
        }
    }
}

#[async_trait]
impl Worker for CellWorker {
    async fn run(&mut self, ctl: &LoopControl) -> Result<(), CellError> {
        if !self.entered {
            self.entered = true;
            self.monitoring.incr(self.ctx.measuring_id());
            self.monitoring.incr(&self.total_cells_id);
        }
        loop {
            tokio::select! {
                biased;
                _ = ctl.stopped() => {
                    return self.behavior.terminate().await;
                }
                changed = self.subs_rx.changed(), if !self.subs_closed => {
                    match changed {
                        Ok(()) => {
                            let snapshot = self.subs_rx.borrow_and_update().clone();
                            self.ctx.set_subscribers(snapshot);
                        }
                        // Handle dropped; the stop signal follows.
                        Err(_) => self.subs_closed = true,
                    }
                }
                event = self.queue.pop() => {
                    match event {
                        Some(event) => {
                            let span = self.monitoring.begin_measuring(self.ctx.measuring_id());
                            match self.behavior.process_event(&self.ctx, event).await {
                                Ok(()) => span.end_measuring(),
                                Err(err) => ctl.kill(err),
                            }
                        }
                        None => {
                            return self.behavior.terminate().await;
                        }
                    }
                }
            }
        }
    }

    async fn on_recover(&mut self, history: &mut Recoverings) -> Result<(), CellError> {
        let reason = history
            .last()
            .map(|r| r.reason().to_string())
            .unwrap_or_default();
        error!(cell = %self.ctx.id(), %reason, "recovering cell after panic");
        if history.frequency(self.recover_limit, self.recover_window) {
            return Err(CellError::RecoveredTooOften { reason });
        }
        if let Err(err) = self.behavior.recover(&reason).await {
            return Err(CellError::EventRecovering {
                reason: err.to_string(),
            });
        }
        history.trim(self.recover_limit);
        Ok(())
    }

    async fn cleanup(&mut self) {
        if let Err(err) = self.queue.stop() {
            error!(cell = %self.ctx.id(), error = %err, "cannot stop event queue");
        }
        if self.entered {
            self.monitoring.decr(&self.total_cells_id);
            self.monitoring.decr(self.ctx.measuring_id());
        }
        info!(cell = %self.ctx.id(), "cell terminated");
    }
}
