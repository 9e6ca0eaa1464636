//! # Events, payloads, and mailboxes.
//!
//! The value types exchanged between cells ([`Event`], [`Payload`], [`Value`],
//! [`Scene`]) and the per-cell mailbox contract ([`EventQueue`]) with its
//! default implementations.

mod event;
mod payload;
mod queue;

pub use event::Event;
pub use payload::{Payload, Reply, ReplySender, Scene, Value, DEFAULT_KEY, RESPONSE_KEY};
pub use queue::{BoundedQueue, EventQueue, QueueFactory, UnboundedQueue};

pub(crate) use queue::default_queue_factory;
