//! # Context: the face of a cell presented to its behavior.
//!
//! The context answers who the cell is ([`Context::id`]), where it lives
//! ([`Context::environment`]), and forwards events to the cell's current
//! subscribers ([`Context::emit`], [`Context::emit_new`]).
//!
//! ## Rules
//! - The subscriber snapshot is owned by the backend loop: topology changes
//!   arrive as fresh snapshots over the loop's update channel, so `emit`
//!   reads what the loop last installed and never waits on a lock or a
//!   topology mutation.
//! - The back-reference to the environment is non-owning (the environment
//!   owns the registry, which owns the cells).

use std::sync::{Arc, Weak};

use tracing::error;

use crate::config::EmitPolicy;
use crate::environment::{EnvInner, Environment};
use crate::error::CellError;
use crate::events::{Event, EventQueue, Payload, Scene};

/// Lightweight handle to one subscriber's mailbox.
#[derive(Clone)]
pub(crate) struct SubscriberRef {
    pub(crate) id: String,
    pub(crate) queue: Arc<dyn EventQueue>,
}

/// The behavior-facing face of a cell.
///
/// `Clone` yields an owned context carrying the subscriber snapshot current
/// at clone time; the loop-owned original keeps receiving updates.
#[derive(Clone)]
pub struct Context {
    env: Weak<EnvInner>,
    id: String,
    measuring_id: String,
    policy: EmitPolicy,
    subscribers: Vec<SubscriberRef>,
}

impl Context {
    pub(crate) fn new(
        env: Weak<EnvInner>,
        id: String,
        measuring_id: String,
        policy: EmitPolicy,
    ) -> Self {
        Self {
            env,
            id,
            measuring_id,
            policy,
            subscribers: Vec::new(),
        }
    }

    /// The cell's id, unique within its environment.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The owning environment, or `None` if it has already been dropped.
    pub fn environment(&self) -> Option<Environment> {
        self.env.upgrade().map(Environment::from_inner)
    }

    /// Forwards an event to every current subscriber.
    ///
    /// Under the default fail-fast policy the fan-out stops at the first
    /// subscriber whose mailbox rejects the event, and that error is
    /// returned; with
    /// [`EmitPolicy::CollectAndContinue`](crate::EmitPolicy::CollectAndContinue)
    /// every subscriber is attempted and the first error is returned at the
    /// end.
    pub fn emit(&self, event: Event) -> Result<(), CellError> {
        match self.policy {
            EmitPolicy::FailFast => {
                for sub in &self.subscribers {
                    sub.queue.push(event.clone())?;
                }
                Ok(())
            }
            EmitPolicy::CollectAndContinue => {
                let mut first_err = None;
                for sub in &self.subscribers {
                    if let Err(err) = sub.queue.push(event.clone()) {
                        error!(cell = %self.id, subscriber = %sub.id, error = %err,
                            "emit to subscriber failed");
                        first_err.get_or_insert(err);
                    }
                }
                match first_err {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }

    /// Builds an event and forwards it to every current subscriber.
    pub fn emit_new(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Payload>,
        scene: Scene,
    ) -> Result<(), CellError> {
        self.emit(Event::new(topic, payload, scene)?)
    }

    pub(crate) fn measuring_id(&self) -> &str {
        &self.measuring_id
    }

    pub(crate) fn set_subscribers(&mut self, subscribers: Vec<SubscriberRef>) {
        self.subscribers = subscribers;
    }
}
