#![allow(dead_code)]

//! In-memory job registry and progress broadcaster.
//!
//! Each subscriber owns a bounded channel: fan-out is `try_send`, so one slow
//! consumer can delay nobody else. Jobs are never mutated after their
//! terminal frame; a periodic sweep evicts finished jobs once their TTL runs
//! out, which also closes the remaining subscriber channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::analysis::models::{AnalysisResult, FailureCode, ProgressFrame};

pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, JobEntry>>,
    subscriber_capacity: usize,
    completed_ttl: Duration,
    next_subscription_id: AtomicU64,
}

struct JobEntry {
    progress: u8,
    result: Option<AnalysisResult>,
    error: Option<FailureCode>,
    subscribers: Vec<Subscriber>,
    finished_at: Option<Instant>,
}

impl JobEntry {
    fn new() -> Self {
        Self {
            progress: 0,
            result: None,
            error: None,
            subscribers: Vec::new(),
            finished_at: None,
        }
    }

    fn snapshot(&self) -> ProgressFrame {
        ProgressFrame {
            progress: self.progress,
            result: self.result.clone(),
            error: self.error,
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<ProgressFrame>,
}

/// A registered progress listener. Frames arrive on `receiver`; dropping it
/// detaches lazily on the next broadcast, `unsubscribe` detaches at once.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<ProgressFrame>,
}

impl JobRegistry {
    pub fn new(subscriber_capacity: usize, completed_ttl: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            subscriber_capacity: subscriber_capacity.max(1),
            completed_ttl,
            next_subscription_id: AtomicU64::new(0),
        }
    }

    /// Returns the job's current snapshot, creating it at progress 0 when the
    /// id is new. Idempotent by id.
    pub fn create_or_get(&self, id: Uuid) -> ProgressFrame {
        let mut jobs = self.lock();
        jobs.entry(id).or_insert_with(JobEntry::new).snapshot()
    }

    /// Advances progress — callers drive the fixed stage checkpoints and
    /// guarantee monotonicity — then fans the new frame out to every
    /// subscriber of this job. A result marks the job finished.
    pub fn update(&self, id: Uuid, progress: u8, result: Option<AnalysisResult>) {
        let mut jobs = self.lock();
        let entry = jobs.entry(id).or_insert_with(JobEntry::new);
        entry.progress = progress;
        if let Some(result) = result {
            entry.result = Some(result);
            entry.finished_at = Some(Instant::now());
        }
        Self::broadcast(id, entry);
    }

    /// Records a job-fatal failure and fans out the failed terminal frame.
    /// Progress stays at its last checkpoint.
    pub fn fail(&self, id: Uuid, code: FailureCode) {
        let mut jobs = self.lock();
        let entry = jobs.entry(id).or_insert_with(JobEntry::new);
        entry.error = Some(code);
        entry.finished_at = Some(Instant::now());
        Self::broadcast(id, entry);
    }

    /// Attaches a new listener; its first frame is the current snapshot, so a
    /// subscriber arriving after completion still sees the terminal state.
    /// `None` for unknown jobs.
    pub fn subscribe(&self, id: Uuid) -> Option<Subscription> {
        let mut jobs = self.lock();
        let entry = jobs.get_mut(&id)?;
        let (tx, receiver) = mpsc::channel(self.subscriber_capacity);
        // freshly created channel with capacity >= 1: the snapshot always fits
        let _ = tx.try_send(entry.snapshot());
        let sub_id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        entry.subscribers.push(Subscriber { id: sub_id, tx });
        Some(Subscription {
            id: sub_id,
            receiver,
        })
    }

    /// Detaches a listener. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: Uuid, subscription_id: u64) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.subscribers.retain(|s| s.id != subscription_id);
        }
    }

    pub fn snapshot(&self, id: Uuid) -> Option<ProgressFrame> {
        self.lock().get(&id).map(JobEntry::snapshot)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Drops finished jobs older than the completed-job TTL; returns how many
    /// were evicted.
    pub fn evict_finished(&self) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished_at {
            Some(at) => at.elapsed() < self.completed_ttl,
            None => true,
        });
        before - jobs.len()
    }

    fn broadcast(id: Uuid, entry: &mut JobEntry) {
        let frame = entry.snapshot();
        entry.subscribers.retain(|sub| match sub.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(job = %id, subscription = sub.id, "subscriber queue full, dropping frame");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodic eviction sweep. The task stops once the registry is dropped.
pub fn spawn_eviction_sweep(
    registry: &Arc<JobRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    let registry = Arc::downgrade(registry);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await; // the first tick is immediate
        loop {
            ticker.tick().await;
            let Some(registry) = registry.upgrade() else {
                break;
            };
            let evicted = registry.evict_finished();
            if evicted > 0 {
                tracing::debug!("evicted {evicted} finished jobs");
            }
        }
    })
}
