//! # Cells: behaviors bound to mailboxes and supervised loops.

mod behavior;
mod cell;
mod context;

pub use behavior::{Behavior, BehaviorFn};
pub use context::Context;

pub(crate) use cell::{CellHandle, CellWorker};
pub(crate) use context::SubscriberRef;
