//! # Async Bridge
//!
//! Runs suspendable transformer work for synchronous callers.
//!
//! One dedicated OS thread drives a current-thread tokio runtime. Jobs arrive
//! over a channel and are spawned as tasks, so concurrent callers interleave
//! at their suspension points while each caller blocks only itself.
//!
//! ## Invariants
//!
//! - A blocking call from the bridge thread is refused, never deadlocked.
//! - A cancelled job is dropped at its next suspension point; its caller gets
//!   `Error::Cancelled` and whatever it already flushed stays flushed.

use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc as std_mpsc;
use std::thread::ThreadId;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::config::DEFAULT_BRIDGE_THREAD;
use crate::error::Error;
use crate::error::Result;

type Job = BoxFuture<'static, ()>;

pub struct Bridge {
    name: String,
    jobs: mpsc::UnboundedSender<Job>,
    thread: ThreadId,
    seq: AtomicU64,
}

impl Bridge {
    /// The process-wide bridge, started on first use and never torn down.
    pub fn global() -> Result<Arc<Bridge>> {
        static GLOBAL: OnceLock<Arc<Bridge>> = OnceLock::new();
        static INIT: parking_lot::Mutex<()> = parking_lot::const_mutex(());

        if let Some(bridge) = GLOBAL.get() {
            return Ok(bridge.clone());
        }
        let _guard = INIT.lock();
        if let Some(bridge) = GLOBAL.get() {
            return Ok(bridge.clone());
        }
        let bridge = Arc::new(Bridge::new(DEFAULT_BRIDGE_THREAD)?);
        let _ = GLOBAL.set(bridge.clone());
        Ok(bridge)
    }

    /// Starts an isolated bridge on a new thread called `name`.
    ///
    /// The thread exits once the bridge is dropped, cancelling unfinished jobs.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::BridgeStart(e.to_string()))?;

        let thread_name = name.clone();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!(bridge = %thread_name, "bridge started");
                runtime.block_on(async move {
                    while let Some(job) = rx.recv().await {
                        tokio::spawn(job);
                    }
                });
                debug!(bridge = %thread_name, "bridge stopped");
            })
            .map_err(|e| Error::BridgeStart(e.to_string()))?;

        Ok(Self {
            name,
            jobs,
            thread: handle.thread().id(),
            seq: AtomicU64::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when called from the bridge's own thread.
    pub fn is_bridge_thread(&self) -> bool {
        std::thread::current().id() == self.thread
    }

    /// Runs `fut` on the bridge and blocks the calling thread until it settles.
    pub fn run_sync<F, T>(&self, fut: F, cancel: &CancellationToken) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_bridge_thread() {
            return Err(Error::BridgeReentry);
        }
        let (tx, rx) = std_mpsc::sync_channel(1);
        self.submit(fut, cancel.clone(), move |outcome| {
            let _ = tx.send(outcome);
        })?;
        rx.recv().map_err(|_| Error::BridgeClosed)?
    }

    /// Runs `fut` on the bridge without blocking the caller's runtime.
    pub async fn run<F, T>(&self, fut: F, cancel: &CancellationToken) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(fut, cancel.clone(), move |outcome| {
            let _ = tx.send(outcome);
        })?;
        rx.await.map_err(|_| Error::BridgeClosed)?
    }

    fn submit<F, T, R>(&self, fut: F, cancel: CancellationToken, reply: R) -> Result<()>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(Result<T>) + Send + 'static,
    {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        trace!(bridge = %self.name, seq, "job submitted");

        let job = async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(seq, "job cancelled");
                    Err(Error::Cancelled)
                }
                out = fut => out,
            };
            reply(outcome);
        };
        self.jobs.send(job.boxed()).map_err(|_| Error::BridgeClosed)
    }
}
