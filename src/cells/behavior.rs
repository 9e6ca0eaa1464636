//! # Behavior: the user-supplied event handler contract.
//!
//! A behavior defines what a cell does. The runtime drives it through four
//! hooks, all running on the cell's own backend loop:
//!
//! - [`init`](Behavior::init) — once, before any event; a failure aborts the
//!   cell start.
//! - [`process_event`](Behavior::process_event) — once per dequeued event,
//!   never concurrently with itself for the same cell; a returned error
//!   terminates the cell.
//! - [`recover`](Behavior::recover) — after a caught panic; a returned error
//!   terminates the cell.
//! - [`terminate`](Behavior::terminate) — once, on orderly shutdown.
//!
//! Only `process_event` is required; the other hooks default to no-ops.
//!
//! For simple cells, [`BehaviorFn`] wraps a closure.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use cellmesh::{Behavior, CellError, Context, Event};
//!
//! struct Counter {
//!     seen: u64,
//! }
//!
//! #[async_trait]
//! impl Behavior for Counter {
//!     async fn process_event(&mut self, ctx: &Context, event: Event) -> Result<(), CellError> {
//!         self.seen += 1;
//!         ctx.emit(event)
//!     }
//! }
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::error::CellError;
use crate::events::Event;

use super::context::Context;

/// User-supplied four-operation handler bound to a cell.
#[async_trait]
pub trait Behavior: Send + 'static {
    /// Called once before any event is processed. Failure aborts the start.
    async fn init(&mut self, ctx: &Context) -> Result<(), CellError> {
        let _ = ctx;
        Ok(())
    }

    /// Processes one event.
    ///
    /// Runs on the cell's backend loop, at most once at a time per cell.
    /// Returning an error terminates the cell with that error.
    async fn process_event(&mut self, ctx: &Context, event: Event) -> Result<(), CellError>;

    /// Called after a panic inside [`process_event`](Behavior::process_event)
    /// was caught. Returning an error terminates the cell.
    async fn recover(&mut self, reason: &str) -> Result<(), CellError> {
        let _ = reason;
        Ok(())
    }

    /// Called once on orderly shutdown.
    async fn terminate(&mut self) -> Result<(), CellError> {
        Ok(())
    }
}

/// Function-backed behavior.
///
/// Wraps a closure invoked once per event with an owned [`Context`] clone
/// (the clone carries the subscriber snapshot current at that point).
/// `init`, `recover`, and `terminate` keep their no-op defaults.
///
/// # Example
/// ```
/// use cellmesh::{BehaviorFn, Context, Event};
///
/// let echo = BehaviorFn::new(|ctx: Context, event: Event| async move {
///     ctx.emit(event)
/// });
/// # let _ = echo;
/// ```
pub struct BehaviorFn<F> {
    f: F,
}

impl<F> BehaviorFn<F> {
    /// Creates a behavior from a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Behavior for BehaviorFn<F>
where
    F: FnMut(Context, Event) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CellError>> + Send + 'static,
{
    async fn process_event(&mut self, ctx: &Context, event: Event) -> Result<(), CellError> {
        (self.f)(ctx.clone(), event).await
    }
}
