//! # SupervisedLoop: runs a worker in its own task, surviving panics.
//!
//! A [`Worker`] is a long-running unit with three hooks:
//! - [`run`](Worker::run) — the loop body; returns when it observes the
//!   shall-stop signal (or decides to finish on its own),
//! - [`on_recover`](Worker::on_recover) — consulted after every caught panic
//!   with the accumulated [`Recoverings`] history; an error here terminates
//!   the loop,
//! - [`cleanup`](Worker::cleanup) — runs exactly once when the loop exits,
//!   on every exit path.
//!
//! ## Flow
//! ```text
//! SupervisedLoop::spawn(worker)
//!   loop {
//!     ├─► catch_unwind(worker.run(ctl))
//!     │     ├─► Ok(exit)  → cleanup → terminal error (if killed) or exit
//!     │     └─► Err(panic)
//!     │           ├─► history.record(reason)
//!     │           ├─► worker.on_recover(&mut history)
//!     │           │     ├─► Ok  → restart run (worker state persists)
//!     │           │     └─► Err → cleanup → terminal error
//!   }
//! ```
//!
//! ## Stop and kill
//! [`SupervisedLoop::stop`] cancels the shall-stop token and joins the task,
//! returning the loop's exit result; it is idempotent. [`LoopControl::kill`]
//! records a terminal error and cancels the token — the worker observes the
//! signal at its next suspension point, and the terminal error wins over
//! whatever the worker returns.

use std::any::Any;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CellError;

use super::recovering::Recoverings;

/// A unit of work driven by a [`SupervisedLoop`].
#[async_trait]
pub trait Worker: Send + 'static {
    /// The loop body. Runs until it observes `ctl` stopping or finishes on
    /// its own; restarted after a recovered panic with its state intact.
    async fn run(&mut self, ctl: &LoopControl) -> Result<(), CellError>;

    /// Decides whether a caught panic is recoverable.
    ///
    /// Returning an error terminates the loop with that error. On success the
    /// implementation is expected to trim `history` to its budget.
    async fn on_recover(&mut self, history: &mut Recoverings) -> Result<(), CellError>;

    /// Runs exactly once when the loop exits, on every exit path.
    async fn cleanup(&mut self) {}
}

/// Shared control face between a supervised loop and its worker.
#[derive(Clone)]
pub struct LoopControl {
    shall_stop: CancellationToken,
    terminal: Arc<Mutex<Option<CellError>>>,
}

impl LoopControl {
    fn new() -> Self {
        Self {
            shall_stop: CancellationToken::new(),
            terminal: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolves once the loop has been asked to stop.
    pub async fn stopped(&self) {
        self.shall_stop.cancelled().await;
    }

    /// True once the loop has been asked to stop.
    pub fn is_stopping(&self) -> bool {
        self.shall_stop.is_cancelled()
    }

    /// Terminates the loop with `err`.
    ///
    /// The first terminal error wins; the worker observes the stop signal at
    /// its next suspension point.
    pub fn kill(&self, err: CellError) {
        {
            let mut terminal = lock_unpoisoned(&self.terminal);
            if terminal.is_none() {
                *terminal = Some(err);
            }
        }
        self.shall_stop.cancel();
    }

    fn signal_stop(&self) {
        self.shall_stop.cancel();
    }

    fn take_terminal(&self) -> Option<CellError> {
        lock_unpoisoned(&self.terminal).take()
    }
}

/// Handle to a worker running in its own supervised task.
pub struct SupervisedLoop {
    ctl: LoopControl,
    handle: Mutex<Option<JoinHandle<Result<(), CellError>>>>,
}

impl SupervisedLoop {
    /// Spawns the worker. Must be called within a tokio runtime.
    pub fn spawn<W: Worker>(worker: W) -> Self {
        let ctl = LoopControl::new();
        let handle = tokio::spawn(Self::supervise(worker, ctl.clone()));
        Self {
            ctl,
            handle: Mutex::new(Some(handle)),
        }
    }

    async fn supervise<W: Worker>(mut worker: W, ctl: LoopControl) -> Result<(), CellError> {
        let mut history = Recoverings::new();
        let exit = loop {
            match AssertUnwindSafe(worker.run(&ctl)).catch_unwind().await {
                Ok(exit) => break exit,
                Err(payload) => {
                    history.record(panic_reason(payload));
                    if let Err(err) = worker.on_recover(&mut history).await {
                        break Err(err);
                    }
                }
            }
        };
        worker.cleanup().await;
        match ctl.take_terminal() {
            Some(err) => Err(err),
            None => exit,
        }
    }

    /// Terminates the loop with `err` without waiting for it.
    pub fn kill(&self, err: CellError) {
        self.ctl.kill(err);
    }

    /// Signals the loop to stop without joining it.
    pub fn signal_stop(&self) {
        self.ctl.signal_stop();
    }

    /// Signals the loop to stop and waits for it, returning its exit result.
    ///
    /// Idempotent: only the first caller observes the exit result, later
    /// calls return `Ok(())`.
    pub async fn stop(&self) -> Result<(), CellError> {
        self.ctl.signal_stop();
        let handle = lock_unpoisoned(&self.handle).take();
        match handle {
            Some(handle) => match handle.await {
                Ok(exit) => exit,
                Err(join_err) => Err(CellError::failure(format!(
                    "supervised loop aborted: {join_err}"
                ))),
            },
            None => Ok(()),
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Worker that panics `panics_left` times, then runs until stopped.
    struct FlakyWorker {
        panics_left: usize,
        recoveries: Arc<AtomicUsize>,
        cleanups: Arc<AtomicUsize>,
        budget: usize,
    }

    #[async_trait]
    impl Worker for FlakyWorker {
        async fn run(&mut self, ctl: &LoopControl) -> Result<(), CellError> {
            if self.panics_left > 0 {
                self.panics_left -= 1;
                panic!("flaky");
            }
            ctl.stopped().await;
            Ok(())
        }

        async fn on_recover(&mut self, history: &mut Recoverings) -> Result<(), CellError> {
            self.recoveries.fetch_add(1, Ordering::SeqCst);
            if history.frequency(self.budget, Duration::from_secs(60)) {
                return Err(CellError::RecoveredTooOften {
                    reason: history.last().unwrap().reason().to_string(),
                });
            }
            history.trim(self.budget);
            Ok(())
        }

        async fn cleanup(&mut self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn restarts_after_recoverable_panics() {
        let recoveries = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        let looper = SupervisedLoop::spawn(FlakyWorker {
            panics_left: 3,
            recoveries: recoveries.clone(),
            cleanups: cleanups.clone(),
            budget: 10,
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(looper.stop().await.is_ok());
        assert_eq!(recoveries.load(Ordering::SeqCst), 3);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_terminates_with_the_policy_error() {
        let recoveries = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        let looper = SupervisedLoop::spawn(FlakyWorker {
            panics_left: usize::MAX,
            recoveries: recoveries.clone(),
            cleanups: cleanups.clone(),
            budget: 4,
        });

        let exit = looper.stop().await;
        assert!(matches!(exit, Err(CellError::RecoveredTooOften { .. })));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn kill_error_wins_over_the_worker_exit_value() {
        struct Obedient;

        #[async_trait]
        impl Worker for Obedient {
            async fn run(&mut self, ctl: &LoopControl) -> Result<(), CellError> {
                ctl.stopped().await;
                Ok(())
            }

            async fn on_recover(&mut self, _history: &mut Recoverings) -> Result<(), CellError> {
                Ok(())
            }
        }

        let looper = SupervisedLoop::spawn(Obedient);
        looper.kill(CellError::failure("fatal"));
        let exit = looper.stop().await;
        assert!(matches!(exit, Err(CellError::Failure { .. })));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        struct Idle;

        #[async_trait]
        impl Worker for Idle {
            async fn run(&mut self, ctl: &LoopControl) -> Result<(), CellError> {
                ctl.stopped().await;
                Ok(())
            }

            async fn on_recover(&mut self, _history: &mut Recoverings) -> Result<(), CellError> {
                Ok(())
            }
        }

        let looper = SupervisedLoop::spawn(Idle);
        assert!(looper.stop().await.is_ok());
        assert!(looper.stop().await.is_ok());
    }
}
