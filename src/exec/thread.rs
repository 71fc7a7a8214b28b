use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle as StdJoinHandle;
use std::time::Duration;

use super::ExecContext;
use crate::time::{Clock, SystemClock, TimerHandle};

enum Job {
    Run(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// Hands every submitted job off to one dedicated worker thread, draining
/// them strictly in submission order.
///
/// # 设计背景（Why）
/// Gives genuine cross-thread hand-off: a node bound to a `ThreadExec`
/// processes its messages on a thread distinct from whichever producer or
/// predecessor submitted them, while two nodes each bound to their own
/// `ThreadExec` run fully in parallel — nodes run in parallel with each
/// other, but stay serial within themselves. One `ThreadExec` is its own
/// serialization domain; sharing a single instance across multiple nodes
/// serializes them against each other too, so independent pipelines should
/// each get their own.
pub struct ThreadExec {
    sender: Sender<Job>,
    clock: Arc<dyn Clock>,
    worker: Option<StdJoinHandle<()>>,
}

impl ThreadExec {
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                match job {
                    Job::Run(f) => f(),
                    Job::Shutdown => break,
                }
            }
        });
        Arc::new(Self {
            sender,
            clock,
            worker: Some(worker),
        })
    }
}

impl Drop for ThreadExec {
    fn drop(&mut self) {
        let _ = self.sender.send(Job::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl ExecContext for ThreadExec {
    fn submit(&self, job: Box<dyn FnOnce() + Send>) {
        // A send failure means the worker thread has already shut down;
        // there is no queue left to honor the job on, so it is dropped.
        let _ = self.sender.send(Job::Run(job));
    }

    fn submit_after(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let sender = self.sender.clone();
        self.clock.spawn_after(
            delay,
            Box::new(move || {
                let _ = sender.send(Job::Run(job));
            }),
        )
    }

    fn submit_periodic(&self, period: Duration, job: Arc<dyn Fn() + Send + Sync>) -> TimerHandle {
        let sender = self.sender.clone();
        self.clock.spawn_periodic(
            period,
            Arc::new(move || {
                let job = job.clone();
                let _ = sender.send(Job::Run(Box::new(move || job())));
            }),
        )
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
