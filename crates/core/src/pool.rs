//! Worker pool executing composite requests off the caller's thread.
//!
//! Each request is one unit of work on a bounded pool of named worker
//! threads sharing an mpsc work queue. Submitting never blocks: the caller
//! gets back a [`CompositeHandle`] and observes the terminal result exactly
//! once through it. Requests may complete in any order relative to
//! submission; within one request the pipeline is strictly sequential.
//!
//! There is no mid-flight cancellation: a submitted task always runs to a
//! terminal state. Dropping the [`Compositor`] closes the queue; workers
//! drain the tasks already queued and then exit. A handle whose task can
//! no longer be run (worker panic, submission after shutdown) resolves to
//! [`Error::PoolShutdown`] instead of hanging the caller.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::compose::{compose, CompositeRequest};
use crate::{Error, Result};

/// Work item for the thread pool.
struct WorkItem {
    request: CompositeRequest,
    result_sender: Sender<Result<Vec<u8>>>,
}

/// Pending result of one submitted composite request.
///
/// Single-shot: consumed by [`wait`](CompositeHandle::wait).
pub struct CompositeHandle {
    result_receiver: Receiver<Result<Vec<u8>>>,
}

impl CompositeHandle {
    /// Block until the task reaches a terminal state and return its result.
    pub fn wait(self) -> Result<Vec<u8>> {
        match self.result_receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(Error::PoolShutdown),
        }
    }
}

/// Bounded worker pool for composite requests.
pub struct Compositor {
    work_sender: Sender<WorkItem>,
}

impl Compositor {
    /// Create a pool with the given number of worker threads (at least 1).
    pub fn new(threads: usize) -> Self {
        let (work_sender, work_receiver) = mpsc::channel::<WorkItem>();
        let work_receiver = Arc::new(Mutex::new(work_receiver));

        let threads = threads.max(1);
        log::debug!("starting compositor pool with {} worker threads", threads);

        for i in 0..threads {
            let work_receiver = Arc::clone(&work_receiver);
            thread::Builder::new()
                .name(format!("composite-worker-{}", i))
                .spawn(move || Self::worker_loop(work_receiver))
                .expect("failed to spawn composite worker thread");
        }

        Self { work_sender }
    }

    /// Create a pool sized to the machine's available parallelism.
    pub fn with_default_threads() -> Self {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(threads)
    }

    /// Submit a request for off-thread compositing.
    ///
    /// Never blocks. Validation failures are delivered through the returned
    /// handle without scheduling any work on the pool.
    pub fn submit(&self, request: CompositeRequest) -> CompositeHandle {
        let (result_sender, result_receiver) = mpsc::channel();

        if let Err(e) = request.validate() {
            // Report synchronously through the completion channel; the
            // request never reaches a worker.
            let _ = result_sender.send(Err(e));
            return CompositeHandle { result_receiver };
        }

        let item = WorkItem {
            request,
            result_sender,
        };
        if let Err(mpsc::SendError(item)) = self.work_sender.send(item) {
            // Workers are gone; resolve the handle immediately
            let _ = item.result_sender.send(Err(Error::PoolShutdown));
        }

        CompositeHandle { result_receiver }
    }

    /// Worker thread loop: runs queued requests until the queue closes.
    fn worker_loop(work_receiver: Arc<Mutex<Receiver<WorkItem>>>) {
        loop {
            let item = {
                let receiver = match work_receiver.lock() {
                    Ok(r) => r,
                    Err(_) => break, // another worker panicked while holding the lock
                };
                receiver.recv()
            };
            let Ok(item) = item else {
                break; // queue closed
            };

            let result = compose(&item.request);
            // The caller may have dropped its handle without waiting
            let _ = item.result_sender.send(result);
        }
    }
}
