//! # Loop supervision.
//!
//! [`SupervisedLoop`] runs a [`Worker`] in its own task and contains panics:
//! each caught panic is recorded into the [`Recoverings`] history and the
//! worker decides — via its recovery hook — whether to restart or die.
//! Cells ride on this; the module is public so other long-running components
//! can reuse the same discipline.

mod looper;
mod recovering;

pub use looper::{LoopControl, SupervisedLoop, Worker};
pub use recovering::{Recovering, Recoverings};
