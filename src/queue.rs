//! FIFO work queue shared by producers and worker pools.
//!
//! Every pushed job must be acknowledged with [`WorkQueue::ack`] once it has been handled;
//! [`WorkQueue::join_until_drained`] waits for that count to reach zero. Workers are told to
//! exit with [`Message::Shutdown`] sentinels, one per worker, which are not counted as work.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::pipeline::CancelToken;
use crate::utils::config::PollIntervals;

/// A job plus how many failed attempts preceded this one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Queued<T> {
    pub job: T,
    pub attempt: u32,
}

/// What a worker receives from [`WorkQueue::pop`].
#[derive(Debug)]
pub enum Message<T> {
    Job(Queued<T>),
    /// No more work: the worker that pops this must exit.
    Shutdown,
}

pub struct WorkQueue<T> {
    tx: Sender<Message<T>>,
    rx: Receiver<Message<T>>,
    pending: Mutex<usize>,
    drained: Condvar,
    pushed: AtomicUsize,
    acked: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn unbounded() -> Self {
        Self::from_channel(unbounded())
    }

    /// Queue whose `push` blocks while `cap` messages are waiting.
    pub fn bounded(cap: usize) -> Self {
        Self::from_channel(bounded(cap))
    }

    /// Unbounded queue pre-filled with `jobs` in order.
    pub fn from_jobs(jobs: impl IntoIterator<Item = T>) -> Self {
        let queue = Self::unbounded();
        for job in jobs {
            queue.push(job);
        }
        queue
    }

    fn from_channel((tx, rx): (Sender<Message<T>>, Receiver<Message<T>>)) -> Self {
        Self {
            tx,
            rx,
            pending: Mutex::new(0),
            drained: Condvar::new(),
            pushed: AtomicUsize::new(0),
            acked: AtomicUsize::new(0),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a fresh job (attempt 0).
    pub fn push(&self, job: T) {
        self.send(Queued { job, attempt: 0 });
    }

    /// Re-enqueue a job after a failed attempt. Goes to the back of the queue.
    pub fn requeue(&self, mut queued: Queued<T>) {
        queued.attempt = queued.attempt.saturating_add(1);
        self.send(queued);
    }

    /// Return a job that was popped but not worked on (attempt count unchanged).
    pub fn put_back(&self, queued: Queued<T>) {
        self.send(queued);
    }

    fn send(&self, queued: Queued<T>) {
        // Count before sending so a consumer can never ack below zero.
        *self.lock_pending() += 1;
        self.pushed.fetch_add(1, Ordering::Relaxed);
        // Our own receiver keeps the channel connected.
        let _ = self.tx.send(Message::Job(queued));
    }

    /// Block until a job or a shutdown sentinel is available.
    pub fn pop(&self) -> Message<T> {
        self.rx.recv().unwrap_or(Message::Shutdown)
    }

    /// Mark one popped job as handled.
    pub fn ack(&self) {
        let mut pending = self.lock_pending();
        debug_assert!(*pending > 0, "ack without a matching push");
        *pending = pending.saturating_sub(1);
        self.acked.fetch_add(1, Ordering::Relaxed);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every pushed job has been acked.
    pub fn join_until_drained(&self) {
        let mut pending = self.lock_pending();
        while *pending > 0 {
            pending = self
                .drained
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Self::join_until_drained`] but gives up when `cancel` fires.
    /// Returns true if the queue drained, false if cancelled first.
    pub fn wait_drained(&self, cancel: &CancelToken) -> bool {
        let mut pending = self.lock_pending();
        loop {
            if *pending == 0 {
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
            pending = match self.drained.wait_timeout(pending, PollIntervals::DRAIN_WAIT) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Push one shutdown sentinel per worker.
    pub fn shutdown(&self, workers: usize) {
        for _ in 0..workers {
            let _ = self.tx.send(Message::Shutdown);
        }
    }

    /// Remove and ack every queued job, returning them in FIFO order. Leftover sentinels are
    /// discarded. Call only once no worker is consuming.
    pub fn drain(&self) -> Vec<T> {
        let mut jobs = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if let Message::Job(queued) = message {
                jobs.push(queued.job);
                self.ack();
            }
        }
        jobs
    }

    /// Messages currently waiting (jobs and sentinels).
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Jobs pushed but not yet acked, including those held by workers.
    pub fn pending(&self) -> usize {
        *self.lock_pending()
    }

    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::Relaxed)
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
