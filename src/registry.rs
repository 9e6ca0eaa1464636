//! # Registry: owns the cells of an environment and their subscriptions.
//!
//! The registry maps cell ids to running cells and keeps the directed
//! subscription graph (emitter → ordered subscriber ids). One `RwLock`
//! guards both: lookups feeding emissions take the read side, topology
//! mutations (start, stop, subscribe, unsubscribe) take the write side and
//! are therefore serialized with respect to each other.
//!
//! ## Rules
//! - Every id in the graph refers to a cell present in the map.
//! - `subscribe`/`unsubscribe` validate **all** ids before mutating anything;
//!   a missing id fails the call with no partial mutation.
//! - Stopping a cell removes every edge touching it (as emitter and as
//!   subscriber) and pushes fresh snapshots to the emitters that lost it.
//! - After any mutation returns, affected emitters have the new snapshot in
//!   their update channel; the backend loop installs it before dequeuing the
//!   next event.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::cells::{Behavior, CellHandle, CellWorker, Context, SubscriberRef};
use crate::environment::Environment;
use crate::error::CellError;
use crate::ident;
use crate::supervise::SupervisedLoop;

/// Owner of all cells in an environment.
pub(crate) struct Registry {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    cells: HashMap<String, Arc<CellHandle>>,
    graph: HashMap<String, Vec<String>>,
}

impl State {
    fn ensure_exists(&self, id: &str) -> Result<(), CellError> {
        if self.cells.contains_key(id) {
            Ok(())
        } else {
            Err(CellError::CellNotFound { id: id.to_string() })
        }
    }

    fn snapshot_for(&self, emitter: &str) -> Vec<SubscriberRef> {
        self.graph
            .get(emitter)
            .map(|subs| {
                subs.iter()
                    .filter_map(|sid| self.cells.get(sid).map(|h| h.subscriber_ref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn push_snapshot(&self, emitter: &str) {
        if let Some(handle) = self.cells.get(emitter) {
            handle.update_subscribers(self.snapshot_for(emitter));
        }
    }
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Creates a cell around a behavior and registers it.
    ///
    /// The behavior's `init` hook runs before the backend loop spawns; a
    /// failed init aborts the start and leaves nothing behind.
    pub(crate) async fn start_cell(
        &self,
        env: &Environment,
        id: String,
        mut behavior: Box<dyn Behavior>,
        behavior_ident: &str,
    ) -> Result<(), CellError> {
        let mut state = self.state.write().await;
        if state.cells.contains_key(&id) {
            return Err(CellError::DuplicateCell { id });
        }

        let queue = env.build_queue();
        let measuring_id = ident::measuring_id(env.id(), behavior_ident);
        let total_cells_id = ident::total_cells_id(env.id());
        let ctx = Context::new(env.downgrade(), id.clone(), measuring_id, env.config().emit);

        if let Err(err) = behavior.init(&ctx).await {
            return Err(CellError::CellInit {
                id,
                reason: err.to_string(),
            });
        }

        let (subs_tx, subs_rx) = watch::channel(Vec::new());
        let worker = CellWorker::new(
            ctx,
            behavior,
            queue.clone(),
            subs_rx,
            env.monitoring(),
            total_cells_id,
            env.config(),
        );
        let looper = SupervisedLoop::spawn(worker);
        let handle = Arc::new(CellHandle::new(id.clone(), queue, subs_tx, looper));
        state.cells.insert(id.clone(), handle);
        info!(cell = %id, "cell started");
        Ok(())
    }

    /// Removes a cell from the map and from every subscription, then stops
    /// its loop and returns the loop's exit result.
    pub(crate) async fn stop_cell(&self, id: &str) -> Result<(), CellError> {
        let mut state = self.state.write().await;
        let handle = match state.cells.remove(id) {
            Some(handle) => handle,
            None => return Err(CellError::CellNotFound { id: id.to_string() }),
        };

        state.graph.remove(id);
        let mut affected = Vec::new();
        for (emitter, subs) in state.graph.iter_mut() {
            let before = subs.len();
            subs.retain(|sid| sid != id);
            if subs.len() != before {
                affected.push(emitter.clone());
            }
        }
        state.graph.retain(|_, subs| !subs.is_empty());
        for emitter in &affected {
            state.push_snapshot(emitter);
        }

        handle.stop().await
    }

    /// Adds subscription edges from `emitter` to each of `subscriber_ids`,
    /// deduplicating, and hands the emitter its new snapshot.
    pub(crate) async fn subscribe(
        &self,
        emitter: &str,
        subscriber_ids: Vec<String>,
    ) -> Result<(), CellError> {
        let mut state = self.state.write().await;
        state.ensure_exists(emitter)?;
        for sid in &subscriber_ids {
            state.ensure_exists(sid)?;
        }
        {
            let subs = state.graph.entry(emitter.to_string()).or_default();
            for sid in subscriber_ids {
                if !subs.contains(&sid) {
                    subs.push(sid);
                }
            }
        }
        state.push_snapshot(emitter);
        Ok(())
    }

    /// Removes the given subscription edges and hands the emitter its new
    /// snapshot.
    pub(crate) async fn unsubscribe(
        &self,
        emitter: &str,
        subscriber_ids: Vec<String>,
    ) -> Result<(), CellError> {
        let mut state = self.state.write().await;
        state.ensure_exists(emitter)?;
        for sid in &subscriber_ids {
            state.ensure_exists(sid)?;
        }
        let emptied = match state.graph.get_mut(emitter) {
            Some(subs) => {
                subs.retain(|sid| !subscriber_ids.contains(sid));
                subs.is_empty()
            }
            None => false,
        };
        if emptied {
            state.graph.remove(emitter);
        }
        state.push_snapshot(emitter);
        Ok(())
    }

    /// Read-locked snapshot of an emitter's subscriber ids.
    pub(crate) async fn subscribers(&self, id: &str) -> Result<Vec<String>, CellError> {
        let state = self.state.read().await;
        state.ensure_exists(id)?;
        Ok(state.graph.get(id).cloned().unwrap_or_default())
    }

    /// Read-locked lookup.
    ///
    /// Single element today; the sequence form leaves room for wildcard
    /// fan-out.
    pub(crate) async fn cells(&self, id: &str) -> Result<Vec<Arc<CellHandle>>, CellError> {
        let state = self.state.read().await;
        match state.cells.get(id) {
            Some(handle) => Ok(vec![handle.clone()]),
            None => Err(CellError::CellNotFound { id: id.to_string() }),
        }
    }

    pub(crate) async fn has_cell(&self, id: &str) -> bool {
        self.state.read().await.cells.contains_key(id)
    }

    /// Stops every cell, best-effort: all loops are signalled first, then
    /// joined; failures are collected into a composite error.
    pub(crate) async fn stop(&self) -> Result<(), CellError> {
        let handles: Vec<Arc<CellHandle>> = {
            let mut state = self.state.write().await;
            state.graph.clear();
            state.cells.drain().map(|(_, handle)| handle).collect()
        };

        for handle in &handles {
            handle.signal_stop();
        }

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(err) = handle.stop().await {
                failures.push(format!("{}: {err}", handle.id()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CellError::Stopped { failures })
        }
    }

    /// Non-blocking, non-joining teardown for the drop safety net.
    pub(crate) fn abort_all(&self) {
        if let Ok(mut state) = self.state.try_write() {
            state.graph.clear();
            for (_, handle) in state.cells.drain() {
                handle.abort();
            }
        }
    }
}
