//! # Background Dispatcher
//!
//! Purpose: Run synchronous operations on a fixed pool of worker threads
//! and hand the caller a future-like completion handle.
//!
//! ## Design Principles
//! 1. **Same Semantics Both Ways**: A submitted job is the synchronous call
//!    moved onto a worker; its result reaches the handle untouched.
//! 2. **Bounded Workers**: The worker count is fixed at construction; jobs
//!    queue when all workers are busy.
//! 3. **Cancel Before Start**: Cancellation flips a flag the worker checks
//!    before running the job; it cannot abort in-flight I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use hotrod_common::{ConnectionError, HotRodError, HotRodResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool for background operations.
pub struct Executor {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Executor {
    /// Spawns `pool_size` workers (at least one).
    pub fn new(pool_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..pool_size.max(1))
            .map(|idx| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("hotrod-worker-{idx}"))
                    .spawn(move || loop {
                        let job = receiver.lock().recv();
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Executor {
            sender: Some(sender),
            workers,
        }
    }

    /// Submits a job, returning a handle to its eventual result.
    pub fn submit<T, F>(&self, task: F) -> AsyncHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let job: Job = Box::new(move || {
            if flag.load(Ordering::Acquire) {
                return;
            }
            let _ = tx.send(task());
        });
        if let Some(sender) = &self.sender {
            // A failed send means the workers are gone; the dropped sender
            // side surfaces to the handle as `Cancelled`.
            let _ = sender.send(job);
        }
        AsyncHandle {
            receiver: rx,
            cancelled,
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Completion handle for a submitted job.
pub struct AsyncHandle<T> {
    receiver: oneshot::Receiver<T>,
    cancelled: Arc<AtomicBool>,
}

impl<T> AsyncHandle<T> {
    /// Blocks until the job completes.
    ///
    /// Yields `Cancelled` when the job never produced a result.
    pub fn wait(self) -> HotRodResult<T> {
        self.receiver.recv().map_err(|_| HotRodError::Cancelled)
    }

    /// Blocks until the job completes or the given time elapses.
    pub fn wait_timeout(self, timeout: Duration) -> HotRodResult<T> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            oneshot::RecvTimeoutError::Timeout => ConnectionError::Timeout.into(),
            oneshot::RecvTimeoutError::Disconnected => HotRodError::Cancelled,
        })
    }

    /// Prevents the job from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl<T> AsyncHandle<HotRodResult<T>> {
    /// Blocks like `wait`, flattening the job's own result.
    pub fn join(self) -> HotRodResult<T> {
        self.wait()?
    }
}
