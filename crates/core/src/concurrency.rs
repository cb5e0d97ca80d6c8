//! Concurrency primitives: a FIFO-fair async mutex with timeout/grant race
//! resolution, a writer-preferring read/write lock, and the process-wide
//! indexing lock singleton.
//!
//! Modeled as a typed handle (spec §9's "Re-architecture notes": prefer a
//! typed handle over an ambient singleton where the pattern isn't idiomatic)
//! with a `#[cfg(test)]`-only reset hook so tests don't leak lock state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// FIFO mutex
// ---------------------------------------------------------------------------

struct FifoMutexState {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// An async mutex that grants the lock to waiters in arrival order. When a
/// waiter times out it is removed from the queue; a concurrent release still
/// transfers ownership to the next live waiter without the lock ever
/// appearing free in between. If every queued waiter has timed out, the lock
/// becomes free.
pub struct FifoMutex {
    state: StdMutex<FifoMutexState>,
}

pub struct FifoMutexGuard<'a> {
    mutex: &'a FifoMutex,
}

impl Default for FifoMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl FifoMutex {
    pub fn new() -> Self {
        Self { state: StdMutex::new(FifoMutexState { locked: false, waiters: VecDeque::new() }) }
    }

    /// Acquire the lock, waiting up to `timeout_dur` if it is held. `None`
    /// means wait indefinitely.
    pub async fn lock(&self, timeout_dur: Option<Duration>) -> Result<FifoMutexGuard<'_>, TimedOut> {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if !state.locked {
                state.locked = true;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = rx {
            let wait = async { rx.await };
            match timeout_dur {
                Some(d) => match timeout(d, wait).await {
                    Ok(Ok(())) => {}
                    // Channel dropped or timed out — we were never granted ownership.
                    Ok(Err(_)) | Err(_) => return Err(TimedOut),
                },
                None => {
                    if wait.await.is_err() {
                        return Err(TimedOut);
                    }
                }
            }
        }

        Ok(FifoMutexGuard { mutex: self })
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        // Wake the next non-cancelled waiter; ownership transfers directly to
        // it so the lock never appears free while waiters remain.
        loop {
            match state.waiters.pop_front() {
                Some(tx) => {
                    if tx.send(()).is_ok() {
                        return; // ownership transferred, `locked` stays true
                    }
                    // Receiver already timed out/dropped — try the next waiter.
                }
                None => {
                    state.locked = false;
                    return;
                }
            }
        }
    }
}

impl Drop for FifoMutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

impl std::fmt::Display for TimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock acquisition timed out")
    }
}
impl std::error::Error for TimedOut {}

// ---------------------------------------------------------------------------
// Read/write lock, writer-preferring
// ---------------------------------------------------------------------------

struct RwState {
    readers: u32,
    writer: bool,
    writers_waiting: u32,
    waiters: VecDeque<(bool, oneshot::Sender<()>)>, // (is_writer, notify)
}

/// Multiple-readers-or-one-writer lock. Once a writer begins waiting, new
/// readers queue behind it; when the writer releases, all queued readers at
/// that point are admitted together.
pub struct RwLock {
    state: StdMutex<RwState>,
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RwLock {
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(RwState {
                readers: 0,
                writer: false,
                writers_waiting: 0,
                waiters: VecDeque::new(),
            }),
        }
    }

    pub async fn read(&self) -> RwReadGuard<'_> {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if !state.writer && state.writers_waiting == 0 {
                state.readers += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back((false, tx));
                Some(rx)
            }
        };
        if let Some(rx) = rx {
            let _ = rx.await;
        }
        RwReadGuard { lock: self }
    }

    pub async fn write(&self) -> RwWriteGuard<'_> {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if !state.writer && state.readers == 0 {
                state.writer = true;
                None
            } else {
                state.writers_waiting += 1;
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back((true, tx));
                Some(rx)
            }
        };
        if let Some(rx) = rx {
            let _ = rx.await;
        }
        RwWriteGuard { lock: self }
    }

    fn release_read(&self) {
        let mut state = self.state.lock().unwrap();
        state.readers -= 1;
        if state.readers == 0 {
            self.admit_next(&mut state);
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock().unwrap();
        state.writer = false;
        self.admit_next(&mut state);
    }

    /// Admit the next waiter(s): if the head is a writer, grant it alone and
    /// decrement `writers_waiting`; if the head is a reader, admit it and
    /// every following reader up to (not including) the next writer.
    fn admit_next(&self, state: &mut RwState) {
        match state.waiters.front() {
            None => {}
            Some((true, _)) => {
                let (_, tx) = state.waiters.pop_front().unwrap();
                state.writer = true;
                state.writers_waiting -= 1;
                let _ = tx.send(());
            }
            Some((false, _)) => {
                while let Some((false, _)) = state.waiters.front() {
                    let (_, tx) = state.waiters.pop_front().unwrap();
                    state.readers += 1;
                    let _ = tx.send(());
                }
            }
        }
    }
}

pub struct RwReadGuard<'a> {
    lock: &'a RwLock,
}
impl Drop for RwReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

pub struct RwWriteGuard<'a> {
    lock: &'a RwLock,
}
impl Drop for RwWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

// ---------------------------------------------------------------------------
// Process-wide indexing lock
// ---------------------------------------------------------------------------

static INDEXING_LOCK: OnceLock<IndexingLock> = OnceLock::new();
static HOLDER_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Process-wide mutual exclusion for any project-mutating operation. Records
/// the `project_path` of the current holder so a rejected caller can be told
/// who holds it.
pub struct IndexingLock {
    mutex: FifoMutex,
    holder: StdMutex<Option<String>>,
}

pub struct IndexingLockGuard<'a> {
    _inner: FifoMutexGuard<'a>,
    lock: &'a IndexingLock,
}

impl Drop for IndexingLockGuard<'_> {
    fn drop(&mut self) {
        *self.lock.holder.lock().unwrap() = None;
    }
}

impl IndexingLock {
    /// The process-wide singleton instance.
    pub fn global() -> &'static IndexingLock {
        INDEXING_LOCK.get_or_init(|| IndexingLock {
            mutex: FifoMutex::new(),
            holder: StdMutex::new(None),
        })
    }

    /// Resets global lock state. Test-only: guards against state leaking
    /// across `#[test]` functions sharing the same process.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset_for_test() {
        let lock = Self::global();
        *lock.holder.lock().unwrap() = None;
        HOLDER_GENERATION.fetch_add(1, Ordering::SeqCst);
        // Drain any stale waiters by replacing the mutex is not possible since
        // it's a OnceLock; tests instead rely on each test using its own
        // project path and a short timeout.
    }

    /// Current holder's project path, if any operation is in flight.
    pub fn current_holder(&self) -> Option<String> {
        self.holder.lock().unwrap().clone()
    }

    /// Try to acquire the lock for `project_path` within `timeout_dur`.
    pub async fn acquire(
        &self,
        project_path: &str,
        timeout_dur: Option<Duration>,
    ) -> Result<IndexingLockGuard<'_>, crate::error::SearchError> {
        match self.mutex.lock(timeout_dur).await {
            Ok(guard) => {
                *self.holder.lock().unwrap() = Some(project_path.to_string());
                Ok(IndexingLockGuard { _inner: guard, lock: self })
            }
            Err(_) => {
                let holder = self.current_holder().unwrap_or_else(|| "another project".to_string());
                Err(crate::error::SearchError::indexing_in_progress(&holder))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_mutex_grants_in_arrival_order() {
        let mutex = Arc::new(FifoMutex::new());
        let order = Arc::new(StdMutex::new(Vec::new()));

        let g0 = mutex.lock(None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..3 {
            let mutex = Arc::clone(&mutex);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _g = mutex.lock(None).await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        drop(g0);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn timed_out_waiter_is_removed_and_lock_still_releases() {
        let mutex = FifoMutex::new();
        let g0 = mutex.lock(None).await.unwrap();

        let result = mutex.lock(Some(Duration::from_millis(20))).await;
        assert!(result.is_err());

        drop(g0);
        // Lock must be free now that the only waiter timed out.
        let g1 = mutex.lock(Some(Duration::from_millis(20))).await;
        assert!(g1.is_ok());
    }

    #[tokio::test]
    async fn rw_lock_allows_concurrent_readers() {
        let lock = Arc::new(RwLock::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let lock = Arc::clone(&lock);
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let _g = lock.read().await;
                let n = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(n, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn rw_lock_writer_excludes_readers() {
        let lock = Arc::new(RwLock::new());
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let w = lock.write().await;
        let lock2 = Arc::clone(&lock);
        let flag2 = Arc::clone(&flag);
        let reader = tokio::spawn(async move {
            let _g = lock2.read().await;
            flag2.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!flag.load(Ordering::SeqCst));
        drop(w);
        reader.await.unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn indexing_lock_rejects_second_project_and_names_holder() {
        IndexingLock::reset_for_test();
        let lock = IndexingLock::global();
        let g = lock.acquire("/proj/a", None).await.unwrap();
        let result = lock.acquire("/proj/b", Some(Duration::from_millis(20))).await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.user_message.contains("/proj/a"));
        drop(g);
    }
}
