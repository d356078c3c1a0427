//! Background context for the pipeline's heavy steps.
//!
//! Jobs are boxed closures run on a fixed set of named threads; their
//! outputs come back over a channel and are applied by whoever owns the
//! pool, so shared state is only ever written on the foreground thread.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::PipelineError;

type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Fixed-size thread pool returning job outputs over a channel.
pub struct WorkerPool<T> {
    job_sender: Option<Sender<Job<T>>>,
    result_receiver: Receiver<T>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `worker_count` threads (at least one) accepting up to `budget`
    /// queued jobs.
    pub fn new(worker_count: usize, budget: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Job<T>>(budget.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let rx = job_rx.clone();
            let tx = result_tx.clone();

            let handle = std::thread::Builder::new()
                .name(format!("strata-worker-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if tx.send(job()).is_err() {
                            break;
                        }
                    }
                })
                .expect("Failed to spawn strata worker thread");
            handles.push(handle);
        }

        Self {
            job_sender: Some(job_tx),
            result_receiver: result_rx,
            worker_handles: handles,
        }
    }

    /// One worker per core, leaving one core for the foreground thread.
    pub fn with_defaults() -> Self {
        let threads = num_cpus::get().saturating_sub(1).max(1);
        Self::new(threads, threads * 2)
    }

    pub fn submit<F>(&self, job: F) -> Result<(), PipelineError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let sender = self
            .job_sender
            .as_ref()
            .ok_or(PipelineError::WorkerDisconnected)?;
        sender.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => PipelineError::QueueFull,
            TrySendError::Disconnected(_) => PipelineError::WorkerDisconnected,
        })
    }
}

impl<T> WorkerPool<T> {
    /// All outputs that are ready, without blocking.
    pub fn drain_results(&self) -> Vec<T> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_receiver.try_recv() {
            results.push(result);
        }
        results
    }

    /// Block until the next output arrives.
    pub fn recv(&self) -> Result<T, PipelineError> {
        self.result_receiver
            .recv()
            .map_err(|_| PipelineError::WorkerDisconnected)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Close the job queue and join every worker.
    pub fn shutdown(&mut self) {
        self.job_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
