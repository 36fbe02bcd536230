//! Background executors for decode and cache-generation work
//!
//! Two kinds of queues, both explicitly constructed and passed to playback
//! instances:
//! - **decode pool** (`TaskPool`): shared by many instances, work-stealing
//!   deques. Each instance keeps at most one task in flight on its own; the
//!   pool does not enforce it.
//! - **cache queue** (`TaskQueue`): one worker, FIFO, serialized across all
//!   instances. Pending jobs can be removed by id before they start.
//!
//! `ManualExecutor` implements both and only runs jobs when asked, which makes
//! every playback scenario deterministic in tests.
//!
//! **Used by**: Playback (schedule decode, enqueue cache), the `rlplay` binary

use crossbeam::deque::{Injector, Worker};
use log::trace;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Id of a job submitted to a `TaskQueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// Fire-and-forget pool (decode work)
pub trait TaskPool: Send + Sync {
    fn execute(&self, job: Job);
}

/// Queue whose pending jobs can be withdrawn (cache generation)
pub trait TaskQueue: Send + Sync {
    fn submit(&self, job: Job) -> TaskId;

    /// Remove a job that has not started. Returns false if it already started
    /// (or finished, or never existed).
    fn remove(&self, id: TaskId) -> bool;
}

impl<T: TaskPool + ?Sized> TaskPool for Arc<T> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    fn submit(&self, job: Job) -> TaskId {
        (**self).submit(job)
    }

    fn remove(&self, id: TaskId) -> bool {
        (**self).remove(id)
    }
}

/// Bounded wait for worker threads on drop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn join_with_deadline(handles: Vec<thread::JoinHandle<()>>, deadline: Instant) -> bool {
    for handle in handles {
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        let _ = handle.join();
    }
    true
}

// ============================================================================
// Workers: work-stealing decode pool
// ============================================================================

/// Decode pool with work-stealing deques.
///
/// Jobs go to a global injector; idle workers steal from each other. With
/// nothing to do a worker sleeps 1ms.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(Box::new(move || decode(job)));
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` workers (0 = 3/4 of the logical CPUs, at least 1).
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = if num_threads == 0 {
            (num_cpus::get() * 3 / 4).max(1)
        } else {
            num_threads
        };

        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<_> = locals.iter().map(Worker::stealer).collect();
        let mut handles = Vec::with_capacity(num_threads);

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("rlplay-decode-{}", worker_id))
                .spawn(move || {
                    trace!("Decode worker {} started", worker_id);
                    loop {
                        if let Some(job) = local.pop() {
                            job();
                            continue;
                        }
                        if let Some(job) = injector.steal_batch_and_pop(&local).success() {
                            job();
                            continue;
                        }
                        if let Some(job) = stealers.iter().find_map(|s| s.steal().success()) {
                            job();
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(1));
                    }
                    trace!("Decode worker {} stopped", worker_id);
                })?;
            handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);
        Ok(Self {
            injector,
            handles,
            shutdown,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

impl TaskPool for Workers {
    fn execute(&self, job: Job) {
        self.injector.push(job);
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        let handles = std::mem::take(&mut self.handles);
        if join_with_deadline(handles, Instant::now() + SHUTDOWN_TIMEOUT) {
            trace!("All {} workers stopped gracefully", num_threads);
        } else {
            trace!("Shutdown timeout reached, exiting anyway");
        }
    }
}

// ============================================================================
// SerialQueue: single worker, removable jobs
// ============================================================================

#[derive(Default)]
struct SerialState {
    pending: VecDeque<(TaskId, Job)>,
    shutdown: bool,
}

struct SerialShared {
    state: Mutex<SerialState>,
    ready: Condvar,
}

/// FIFO queue drained by one named thread.
///
/// Jobs still pending when the queue is dropped are discarded without running.
pub struct SerialQueue {
    shared: Arc<SerialShared>,
    next_id: AtomicU64,
    handle: Option<thread::JoinHandle<()>>,
}

impl SerialQueue {
    pub fn new(name: &str) -> io::Result<Self> {
        let shared = Arc::new(SerialShared {
            state: Mutex::new(SerialState::default()),
            ready: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let thread_name = name.to_string();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            trace!("{} started", thread_name);
            loop {
                let job = {
                    let mut state = worker_shared.state.lock().unwrap_or_else(|e| e.into_inner());
                    loop {
                        if state.shutdown {
                            break None;
                        }
                        if let Some((_, job)) = state.pending.pop_front() {
                            break Some(job);
                        }
                        state = worker_shared.ready.wait(state).unwrap_or_else(|e| e.into_inner());
                    }
                };
                match job {
                    Some(job) => job(),
                    None => break,
                }
            }
            trace!("{} stopped", thread_name);
        })?;

        Ok(Self {
            shared,
            next_id: AtomicU64::new(1),
            handle: Some(handle),
        })
    }

    /// Jobs waiting to start
    pub fn pending(&self) -> usize {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner()).pending.len()
    }
}

impl TaskQueue for SerialQueue {
    fn submit(&self, job: Job) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .push_back((id, job));
        self.shared.ready.notify_one();
        id
    }

    fn remove(&self, id: TaskId) -> bool {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.pending.iter().position(|(pending, _)| *pending == id) {
            Some(index) => {
                state.pending.remove(index);
                trace!("SerialQueue: removed pending task {:?}", id);
                true
            }
            None => false,
        }
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.shutdown = true;
            let dropped = state.pending.len();
            state.pending.clear();
            if dropped > 0 {
                trace!("SerialQueue: discarded {} pending task(s)", dropped);
            }
        }
        self.shared.ready.notify_all();
        if let Some(handle) = self.handle.take()
            && !join_with_deadline(vec![handle], Instant::now() + SHUTDOWN_TIMEOUT)
        {
            trace!("SerialQueue shutdown timeout reached, exiting anyway");
        }
    }
}

// ============================================================================
// ManualExecutor: deterministic test scheduler
// ============================================================================

/// Runs jobs only when told to, on the calling thread.
#[derive(Default)]
pub struct ManualExecutor {
    pending: Mutex<VecDeque<(TaskId, Job)>>,
    next_id: AtomicU64,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run the oldest job. Returns false when nothing was queued.
    pub fn run_next(&self) -> bool {
        // lock released before the job runs: jobs may submit more jobs
        let job = self.pending.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match job {
            Some((_, job)) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run the jobs queued right now (not the ones they enqueue).
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let count = self.pending();
        let mut ran = 0;
        while ran < count && self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl TaskPool for ManualExecutor {
    fn execute(&self, job: Job) {
        self.submit(job);
    }
}

impl TaskQueue for ManualExecutor {
    fn submit(&self, job: Job) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).push_back((id, job));
        id
    }

    fn remove(&self, id: TaskId) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.iter().position(|(queued, _)| *queued == id) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Executors bundle
// ============================================================================

/// The pair of queues a playback instance schedules onto
#[derive(Clone)]
pub struct Executors {
    pub decode: Arc<dyn TaskPool>,
    pub cache: Arc<dyn TaskQueue>,
}

/// Executors backed by `ManualExecutor`s, with direct access to both
pub struct ManualExecutors {
    pub executors: Executors,
    pub decode: Arc<ManualExecutor>,
    pub cache: Arc<ManualExecutor>,
}

impl ManualExecutors {
    /// Run decode and cache jobs until both queues are empty
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let step = self.decode.run_pending() + self.cache.run_pending();
            if step == 0 {
                return ran;
            }
            ran += step;
        }
    }
}

lazy_static::lazy_static! {
    // spawn failure is kept so every caller sees it
    static ref SHARED: Result<Executors, (io::ErrorKind, String)> =
        Executors::threaded(0).map_err(|e| (e.kind(), e.to_string()));
}

impl Executors {
    pub fn new(decode: Arc<dyn TaskPool>, cache: Arc<dyn TaskQueue>) -> Self {
        Self { decode, cache }
    }

    /// Fresh thread-backed executors (`decode_threads` 0 = auto)
    pub fn threaded(decode_threads: usize) -> io::Result<Self> {
        Ok(Self {
            decode: Arc::new(Workers::new(decode_threads)?),
            cache: Arc::new(SerialQueue::new("rlplay-cache")?),
        })
    }

    /// Process-wide executors, created on first use and never torn down
    pub fn shared() -> io::Result<Self> {
        SHARED
            .as_ref()
            .map(Clone::clone)
            .map_err(|(kind, msg)| io::Error::new(*kind, msg.clone()))
    }

    pub fn manual() -> ManualExecutors {
        let decode = Arc::new(ManualExecutor::new());
        let cache = Arc::new(ManualExecutor::new());
        ManualExecutors {
            executors: Executors::new(decode.clone(), cache.clone()),
            decode,
            cache,
        }
    }
}

impl std::fmt::Debug for Executors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executors").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_workers_run_jobs() {
        let workers = Workers::new(2).unwrap();
        assert_eq!(workers.num_threads(), 2);
        let (tx, rx) = unbounded();
        for i in 0..8 {
            let tx = tx.clone();
            workers.execute(Box::new(move || {
                tx.send(i).unwrap();
            }));
        }
        let mut got: Vec<i32> = (0..8)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_serial_queue_fifo() {
        let queue = SerialQueue::new("test-serial").unwrap();
        let (tx, rx) = unbounded();
        for i in 0..5 {
            let tx = tx.clone();
            queue.submit(Box::new(move || {
                tx.send(i).unwrap();
            }));
        }
        let got: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_serial_queue_remove_pending() {
        let queue = SerialQueue::new("test-serial-remove").unwrap();
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (started_tx, started_rx) = unbounded::<()>();
        let ran = Arc::new(AtomicUsize::new(0));

        // first job blocks the worker so the second stays pending
        queue.submit(Box::new(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv_timeout(Duration::from_secs(5)).ok();
        }));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let counter = Arc::clone(&ran);
        let id = queue.submit(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(queue.pending(), 1);
        assert!(queue.remove(id));
        assert!(!queue.remove(id));
        gate_tx.send(()).unwrap();
        drop(queue);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_executor_runs_on_demand() {
        let exec = Arc::new(ManualExecutor::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        let nested = Arc::clone(&exec);
        exec.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let counter = Arc::clone(&counter);
            nested.execute(Box::new(move || {
                counter.fetch_add(10, Ordering::SeqCst);
            }));
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        // only the job queued before the call runs
        assert_eq!(exec.run_pending(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(exec.pending(), 1);
        assert!(exec.run_next());
        assert_eq!(ran.load(Ordering::SeqCst), 11);
        assert!(!exec.run_next());
    }

    #[test]
    fn test_manual_executor_remove() {
        let exec = ManualExecutor::new();
        let id = exec.submit(Box::new(|| panic!("removed job ran")));
        assert!(exec.remove(id));
        assert!(!exec.remove(id));
        assert_eq!(exec.run_pending(), 0);
    }

    #[test]
    fn test_manual_bundle_run_all() {
        let manual = Executors::manual();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let cache = manual.executors.cache.clone();
        manual.executors.decode.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let counter = Arc::clone(&counter);
            cache.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        assert_eq!(manual.run_all(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shared_executors_are_reused() {
        let first = Executors::shared().unwrap();
        let second = Executors::shared().unwrap();
        assert!(Arc::ptr_eq(&first.decode, &second.decode));
        assert!(Arc::ptr_eq(&first.cache, &second.cache));

        let (tx, rx) = unbounded();
        first.decode.execute(Box::new(move || {
            tx.send(7).unwrap();
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }
}
