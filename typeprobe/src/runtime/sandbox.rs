//! Isolated execution of foreign code
//!
//! Constructors and operator implementations of the probed runtime are
//! untrusted: they may raise, panic, recurse deeply or never return. Every
//! such call is shipped to a long-lived worker thread and awaited with a
//! wall-clock limit. A worker that overruns the limit is abandoned and a
//! fresh one takes its place, so one runaway call costs one probe, not the
//! run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, warn};

use super::Fault;
use crate::error::{ProbeError, Result};

/// Worker stack size; foreign recursion runs on this stack.
const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Default cap on worker threads alive at once, stalled ones included.
pub const DEFAULT_WORKER_LIMIT: usize = 16;

type Job<C> = Box<dyn FnOnce(&C) + Send>;

/// Outcome counts for one sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxStats {
    pub completed: usize,
    pub raised: usize,
    pub timed_out: usize,
    pub panicked: usize,
    pub restarts: usize,
}

impl SandboxStats {
    pub fn total(&self) -> usize {
        self.completed + self.raised + self.timed_out + self.panicked
    }
}

/// Invoke-with-timeout capability over a shared context `C`.
pub struct Sandbox<C: Send + Sync + 'static> {
    context: Arc<C>,
    timeout: Duration,
    /// `None` once the worker limit is reached and no replacement could start.
    jobs: Option<Sender<Job<C>>>,
    live_workers: Arc<AtomicUsize>,
    worker_limit: usize,
    generation: usize,
    stats: SandboxStats,
}

impl<C: Send + Sync + 'static> Sandbox<C> {
    /// Start a sandbox whose worker calls run against `context`.
    pub fn spawn(context: Arc<C>, timeout: Duration) -> Result<Self> {
        let live_workers = Arc::new(AtomicUsize::new(0));
        let jobs = spawn_worker(Arc::clone(&context), Arc::clone(&live_workers), 0)?;
        Ok(Sandbox {
            context,
            timeout,
            jobs: Some(jobs),
            live_workers,
            worker_limit: DEFAULT_WORKER_LIMIT,
            generation: 0,
            stats: SandboxStats::default(),
        })
    }

    /// Cap the number of worker threads alive at once. Once stalled
    /// workers fill the cap, calls fail fast with [`Fault::Unavailable`]
    /// until one of them finishes.
    pub fn with_worker_limit(mut self, limit: usize) -> Self {
        self.worker_limit = limit.max(1);
        self
    }

    /// The shared context, for calls that do not need isolation.
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn stats(&self) -> SandboxStats {
        self.stats
    }

    /// Worker threads currently alive, abandoned ones included.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Run `call` on the worker and wait for it at most the configured timeout.
    ///
    /// Raised faults, panics and timeouts all come back as `Err`; none of
    /// them escape.
    pub fn invoke<T, F>(&mut self, call: F) -> std::result::Result<T, Fault>
    where
        T: Send + 'static,
        F: FnOnce(&C) -> std::result::Result<T, Fault> + Send + 'static,
    {
        if self.jobs.is_none() {
            self.restart();
        }
        let Some(jobs) = &self.jobs else {
            let outcome = Err(Fault::Unavailable);
            self.tally(&outcome);
            return outcome;
        };

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let job: Job<C> = Box::new(move |context: &C| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(context)))
                .unwrap_or_else(|payload| Err(Fault::Panicked(panic_message(payload.as_ref()))));
            // The caller may have given up on us already.
            let _ = reply_tx.send(outcome);
        });

        if jobs.send(job).is_err() {
            self.restart();
            let outcome = Err(Fault::Unavailable);
            self.tally(&outcome);
            return outcome;
        }

        let outcome = match reply_rx.recv_timeout(self.timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                self.restart();
                Err(Fault::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.restart();
                Err(Fault::Unavailable)
            }
        };
        self.tally(&outcome);
        outcome
    }

    fn tally<T>(&mut self, outcome: &std::result::Result<T, Fault>) {
        match outcome {
            Ok(_) => self.stats.completed += 1,
            Err(Fault::Raised(_)) | Err(Fault::Unavailable) => self.stats.raised += 1,
            Err(Fault::TimedOut) => self.stats.timed_out += 1,
            Err(Fault::Panicked(_)) => self.stats.panicked += 1,
        }
    }

    /// Abandon the current worker and start a new one.
    ///
    /// The abandoned thread exits on its own once its call returns and it
    /// finds its job queue closed. While stalled workers fill the limit no
    /// replacement is started.
    fn restart(&mut self) {
        let had_worker = self.jobs.take().is_some();
        let live = self.live_workers();
        if live >= self.worker_limit {
            if had_worker {
                warn!(live, limit = self.worker_limit, "sandbox worker limit reached, failing calls fast");
            }
            return;
        }
        self.generation += 1;
        match spawn_worker(Arc::clone(&self.context), Arc::clone(&self.live_workers), self.generation) {
            Ok(jobs) => {
                self.jobs = Some(jobs);
                self.stats.restarts += 1;
                debug!(generation = self.generation, live, "sandbox worker replaced");
            }
            Err(e) => warn!("cannot replace sandbox worker: {e}"),
        }
    }
}

fn spawn_worker<C: Send + Sync + 'static>(
    context: Arc<C>,
    live_workers: Arc<AtomicUsize>,
    generation: usize,
) -> Result<Sender<Job<C>>> {
    let (tx, rx) = crossbeam_channel::unbounded::<Job<C>>();
    live_workers.fetch_add(1, Ordering::SeqCst);
    let counter = Arc::clone(&live_workers);
    let spawned = thread::Builder::new()
        .name(format!("typeprobe-sandbox-{generation}"))
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            for job in rx.iter() {
                job(&*context);
            }
            counter.fetch_sub(1, Ordering::SeqCst);
        });
    if let Err(e) = spawned {
        live_workers.fetch_sub(1, Ordering::SeqCst);
        return Err(ProbeError::sandbox(format!("cannot start worker: {e}")));
    }
    Ok(tx)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
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

    fn sandbox(timeout_ms: u64) -> Sandbox<u32> {
        Sandbox::spawn(Arc::new(7), Duration::from_millis(timeout_ms)).unwrap()
    }

    #[test]
    fn test_invoke_returns_value() {
        let mut sb = sandbox(1000);
        assert_eq!(sb.invoke(|n| Ok(*n * 6)), Ok(42));
        assert_eq!(sb.stats().completed, 1);
    }

    #[test]
    fn test_raised_fault_is_returned() {
        let mut sb = sandbox(1000);
        let out: std::result::Result<(), Fault> = sb.invoke(|_| Err(Fault::Raised("TypeError".into())));
        assert_eq!(out, Err(Fault::Raised("TypeError".into())));
        assert_eq!(sb.stats().raised, 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let mut sb = sandbox(1000);
        let out: std::result::Result<(), Fault> = sb.invoke(|_| panic!("boom"));
        assert_eq!(out, Err(Fault::Panicked("boom".into())));
        // The worker survives a caught panic.
        assert_eq!(sb.invoke(|n| Ok(*n)), Ok(7));
        assert_eq!(sb.stats().restarts, 0);
    }

    #[test]
    fn test_timeout_replaces_worker() {
        let mut sb = sandbox(20);
        let out: std::result::Result<(), Fault> = sb.invoke(|_| {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        assert_eq!(out, Err(Fault::TimedOut));
        assert_eq!(sb.stats().restarts, 1);
        // A fresh worker answers immediately instead of queueing behind the sleeper.
        assert_eq!(sb.invoke(|n| Ok(*n + 1)), Ok(8));
        assert_eq!(sb.stats().timed_out, 1);
        assert_eq!(sb.stats().total(), 2);
    }

    #[test]
    fn test_stalled_workers_are_capped() {
        let mut sb = sandbox(10).with_worker_limit(2);
        let stall = |_: &u32| -> std::result::Result<(), Fault> {
            thread::sleep(Duration::from_millis(400));
            Ok(())
        };
        assert_eq!(sb.invoke(stall), Err(Fault::TimedOut));
        assert_eq!(sb.invoke(stall), Err(Fault::TimedOut));
        assert_eq!(sb.live_workers(), 2);
        // Both slots hold sleepers; calls fail fast instead of spawning more.
        assert_eq!(sb.invoke(|n| Ok(*n)), Err(Fault::Unavailable));
        assert_eq!(sb.stats().restarts, 1);

        // Once a sleeper finishes, its slot is reused.
        thread::sleep(Duration::from_millis(800));
        assert_eq!(sb.invoke(|n| Ok(*n)), Ok(7));
        assert!(sb.live_workers() <= 2);
    }

    #[test]
    fn test_deep_recursion_does_not_overflow() {
        fn depth(n: u64) -> u64 {
            let pad = std::hint::black_box([0u8; 64]);
            if n == 0 { u64::from(pad[0]) } else { 1 + depth(n - 1) + u64::from(pad[1]) }
        }
        let mut sb = sandbox(10_000);
        assert_eq!(sb.invoke(|_| Ok(depth(200_000))), Ok(200_000));
    }
}
