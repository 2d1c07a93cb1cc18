//! Fixed-size worker pool with a bounded job queue.
//!
//! Submitting blocks once the queue is full, so a burst of producers never
//! queues unbounded work. Results come back through a per-job channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle as ThreadHandle};

use tracing::{debug, warn};

use crate::error::{CompressionError, CompressionResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the eventual result of a submitted job.
pub struct JobHandle<R> {
    rx: Receiver<R>,
}

impl<R> JobHandle<R> {
    /// Block until the job finishes.
    pub fn wait(self) -> CompressionResult<R> {
        self.rx.recv().map_err(|_| CompressionError::WorkerPanicked)
    }
}

/// A pool of `size` worker threads.
pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<ThreadHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers. The queue holds at most `2 * size` pending jobs.
    pub fn new(size: usize) -> CompressionResult<Self> {
        if size == 0 {
            return Err(CompressionError::NoWorkers);
        }
        let (sender, receiver) = mpsc::sync_channel::<Job>(size * 2);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("hvcs-compress-{id}"))
                .spawn(move || worker_loop(id, receiver))?;
            workers.push(handle);
        }
        debug!(workers = size, "compression pool started");

        Ok(Self {
            sender: Some(sender),
            workers,
            size,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Submit a job. Blocks while the queue is full.
    pub fn execute<F, R>(&self, f: F) -> CompressionResult<JobHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(CompressionError::PoolClosed)?;
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            // The caller may have dropped its handle.
            let _ = tx.send(f());
        });
        sender.send(job).map_err(|_| CompressionError::PoolClosed)?;
        Ok(JobHandle { rx })
    }

    /// Run `f` over every item on the pool, preserving input order.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<CompressionResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let handles: Vec<CompressionResult<JobHandle<R>>> = items
            .into_iter()
            .map(|item| {
                let f = Arc::clone(&f);
                self.execute(move || f(item))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.and_then(JobHandle::wait))
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("compression worker exited abnormally");
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let guard = receiver.lock().expect("worker queue lock poisoned");
            guard.recv()
        };
        match job {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(worker = id, "compression job panicked");
                }
            }
            Err(_) => break,
        }
    }
}
