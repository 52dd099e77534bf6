//! Bounded worker pool with a per-phase completion barrier.
//!
//! A fixed number of workers drain a shared job queue. Every job writes its result
//! once into a key-addressed [`ResultCollector`]. [`run_phase`] returns only after
//! every worker has stopped, either because the queue is empty or because the phase
//! deadline fired and the remaining work was aborted.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Thread-safe, insert-once result map keyed by job key.
#[derive(Debug)]
pub struct ResultCollector<K, V> {
    slots: Mutex<BTreeMap<K, V>>,
}

impl<K: Ord, V> Default for ResultCollector<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<K: Ord, V> ResultCollector<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns `false` and keeps the first value when the
    /// slot is already filled.
    pub fn insert(&self, key: K, value: V) -> bool {
        let mut slots = self.lock();
        if slots.contains_key(&key) {
            return false;
        }
        slots.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Move every collected result out, leaving the collector empty.
    pub fn drain(&self) -> BTreeMap<K, V> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<K, V>> {
        self.slots.lock().expect("result collector lock poisoned")
    }
}

/// What one phase produced once its barrier was reached.
#[derive(Debug)]
pub struct PhaseOutcome<K, V> {
    pub results: BTreeMap<K, V>,
    /// Jobs whose task panicked, with the panic message.
    pub aborted: BTreeMap<K, String>,
    /// True when the deadline fired before every job settled.
    pub deadline_hit: bool,
}

impl<K: Ord, V> PhaseOutcome<K, V> {
    /// Whether the job under `key` produced a result or was aborted.
    pub fn settled(&self, key: &K) -> bool {
        self.results.contains_key(key) || self.aborted.contains_key(key)
    }
}

/// Aborts the wrapped task when dropped, so cancelling a worker cancels its job too.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `task` over `jobs` with at most `workers` jobs in flight, until every job has
/// settled or `deadline` passes.
pub async fn run_phase<K, J, V, F, Fut>(
    phase: &'static str,
    workers: usize,
    jobs: Vec<(K, J)>,
    deadline: Instant,
    task: F,
) -> PhaseOutcome<K, V>
where
    K: Ord + Clone + std::fmt::Debug + Send + 'static,
    J: Send + 'static,
    V: Send + 'static,
    F: Fn(J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
{
    let job_count = jobs.len();
    let results = Arc::new(ResultCollector::new());
    let aborted = Arc::new(ResultCollector::new());

    if job_count == 0 || Instant::now() >= deadline {
        return PhaseOutcome {
            results: BTreeMap::new(),
            aborted: BTreeMap::new(),
            deadline_hit: job_count > 0,
        };
    }

    let queue = Arc::new(Mutex::new(jobs.into_iter().collect::<VecDeque<_>>()));
    let task = Arc::new(task);
    let worker_count = workers.max(1).min(job_count);
    debug!(phase, workers = worker_count, jobs = job_count, "phase started");

    let mut set = JoinSet::new();
    for worker in 0..worker_count {
        let queue = Arc::clone(&queue);
        let task = Arc::clone(&task);
        let results = Arc::clone(&results);
        let aborted = Arc::clone(&aborted);

        set.spawn(async move {
            loop {
                let next = queue.lock().expect("job queue lock poisoned").pop_front();
                let Some((key, job)) = next else {
                    break;
                };

                let mut handle = AbortOnDrop(tokio::spawn(task(job)));
                match (&mut handle.0).await {
                    Ok(value) => {
                        if !results.insert(key.clone(), value) {
                            warn!(phase, worker, key = ?key, "duplicate result ignored");
                        }
                    }
                    Err(error) if error.is_panic() => {
                        warn!(phase, worker, key = ?key, "task panicked");
                        aborted.insert(key, panic_message(error.into_panic()));
                    }
                    Err(_) => {}
                }
            }
        });
    }

    let barrier = async {
        while let Some(joined) = set.join_next().await {
            if let Err(error) = joined {
                warn!(phase, error = %error, "worker stopped unexpectedly");
            }
        }
    };
    let deadline_hit = tokio::time::timeout_at(deadline, barrier).await.is_err();

    if deadline_hit {
        set.abort_all();
        while set.join_next().await.is_some() {}
    }

    let outcome = PhaseOutcome {
        results: results.drain(),
        aborted: aborted.drain(),
        deadline_hit,
    };
    debug!(
        phase,
        settled = outcome.results.len() + outcome.aborted.len(),
        jobs = job_count,
        deadline_hit,
        "phase barrier reached"
    );
    outcome
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("task panicked")
    }
}
