//! Fixed-size pool of OS threads draining a bounded job queue.

use crate::error::ChainError;
use crate::pipeline::{AdmissionPipeline, AdmissionReceipt};
use crate::transaction::Transaction;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers sharing a queue of at most `queue_depth` jobs.
    /// `submit` blocks while the queue is full.
    pub fn new(threads: usize, queue_depth: usize) -> Result<Self, ChainError> {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(queue_depth.max(1));
        let mut workers = Vec::with_capacity(threads.max(1));
        for id in 0..threads.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("tier-worker-{}", id))
                .spawn(move || {
                    debug!(worker = id, "worker started");
                    for job in receiver.iter() {
                        job();
                    }
                    debug!(worker = id, "worker stopped");
                })?;
            workers.push(handle);
        }
        info!(threads = workers.len(), queue_depth, "worker pool started");
        Ok(WorkerPool {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `f`; its result arrives on the returned channel.
    pub fn submit<F, T>(&self, f: F) -> Result<Receiver<T>, ChainError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ChainError::Io("worker pool is shut down".to_string()))?;
        let (reply, result) = crossbeam_channel::bounded(1);
        sender
            .send(Box::new(move || {
                // The submitter may have stopped waiting for the result.
                let _ = reply.send(f());
            }))
            .map_err(|_| ChainError::Io("worker pool is shut down".to_string()))?;
        Ok(result)
    }

    /// Admits every batch concurrently and returns the results in submission order.
    pub fn admit_all(
        &self,
        pipeline: &Arc<AdmissionPipeline>,
        batches: Vec<Vec<Transaction>>,
    ) -> Vec<Result<AdmissionReceipt, ChainError>> {
        let pending: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let pipeline = Arc::clone(pipeline);
                self.submit(move || pipeline.admit_batch(batch))
            })
            .collect();

        pending
            .into_iter()
            .map(|submitted| -> Result<AdmissionReceipt, ChainError> {
                submitted?
                    .recv()
                    .map_err(|_| ChainError::Io("worker dropped the job".to_string()))?
            })
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
