//! # cellmesh
//!
//! **Cellmesh** is an in-process event-processing mesh.
//!
//! Named units ("cells") receive events, process them with user-supplied
//! behavior, and emit further events to a configurable set of downstream
//! cells. Every cell runs its behavior on its own supervised backend loop:
//! events are processed strictly sequentially per cell, panics inside the
//! behavior are contained and budgeted, and the topology — which cell feeds
//! which — can change at runtime.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                     |
//! |-------------------|--------------------------------------------------------------------|----------------------------------------|
//! | **Behaviors**     | Define what a cell does via four async hooks.                      | [`Behavior`], [`BehaviorFn`]           |
//! | **Environment**   | Start/stop cells, wire subscriptions, emit, request/reply.         | [`Environment`], [`EnvironmentBuilder`]|
//! | **Events**        | Immutable topic/payload/scene triples with copy-on-write payloads. | [`Event`], [`Payload`], [`Value`], [`Scene`] |
//! | **Mailboxes**     | Bounded per-cell FIFO queues, factory-constructed.                 | [`EventQueue`], [`BoundedQueue`]       |
//! | **Supervision**   | Panic-containing loops with a recovery budget.                     | [`SupervisedLoop`], [`Worker`], [`Recoverings`] |
//! | **Monitoring**    | Pluggable counters and measuring spans.                            | [`Monitoring`], [`NullMonitoring`]     |
//! | **Errors**        | Typed error kinds for every runtime failure.                       | [`CellError`]                          |
//! | **Configuration** | Mailbox sizing, recovery budget, emit policy.                      | [`Config`], [`EmitPolicy`]             |
//!
//! ```no_run
//! use std::time::Duration;
//! use cellmesh::{BehaviorFn, Context, Environment, Event, Payload, Scene};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let env = Environment::named("demo");
//!
//!     // An echo cell re-emits every event to its subscribers.
//!     let echo = BehaviorFn::new(|ctx: Context, event: Event| async move { ctx.emit(event) });
//!     env.start_cell("echo", echo).await?;
//!
//!     // A sink cell prints what reaches it.
//!     let sink = BehaviorFn::new(|_ctx: Context, event: Event| async move {
//!         println!("got {:?}", event.topic());
//!         Ok(())
//!     });
//!     env.start_cell("sink", sink).await?;
//!
//!     env.subscribe("echo", ["sink"]).await?;
//!     env.emit_new("echo", "ping", Payload::new(1), Scene::none()).await?;
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     env.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod cells;
mod config;
mod environment;
mod error;
mod events;
mod ident;
mod monitoring;
mod registry;
mod supervise;

// ---- Public re-exports ----

pub use cells::{Behavior, BehaviorFn, Context};
pub use config::{Config, EmitPolicy};
pub use environment::{Environment, EnvironmentBuilder};
pub use error::CellError;
pub use events::{
    BoundedQueue, Event, EventQueue, Payload, QueueFactory, Reply, ReplySender, Scene,
    UnboundedQueue, Value, DEFAULT_KEY, RESPONSE_KEY,
};
pub use monitoring::{Measuring, Monitoring, NullMonitoring};
pub use supervise::{LoopControl, Recovering, Recoverings, SupervisedLoop, Worker};
