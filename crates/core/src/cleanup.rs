//! LIFO shutdown-hook registry. Handlers are independent: no inter-handler
//! dependencies are encoded here, each runs under its own timeout, and a
//! handler's failure never stops the rest from running.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait CleanupHandler: Send + Sync {
    async fn run(&self);
}

struct Entry {
    name: String,
    handler: Box<dyn CleanupHandler>,
}

pub struct CleanupRegistry {
    entries: Mutex<Vec<Entry>>,
    shutting_down: AtomicBool,
}

pub struct CleanupReport {
    pub ran: Vec<String>,
    pub timed_out: Vec<String>,
}

impl Default for CleanupRegistry {
    fn default() -> Self {
        Self { entries: Mutex::new(Vec::new()), shutting_down: AtomicBool::new(false) }
    }
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and does not register) once shutdown has begun.
    pub fn register(&self, name: impl Into<String>, handler: Box<dyn CleanupHandler>) -> bool {
        if self.shutting_down.load(Ordering::SeqCst) {
            return false;
        }
        self.entries.lock().unwrap().push(Entry { name: name.into(), handler });
        true
    }

    /// Drain handlers LIFO, each under `timeout`, isolating errors/timeouts
    /// per handler so the rest still run.
    pub async fn shutdown(&self, timeout: Duration) -> CleanupReport {
        self.shutting_down.store(true, Ordering::SeqCst);
        let entries: Vec<Entry> = std::mem::take(&mut *self.entries.lock().unwrap());

        let mut ran = Vec::new();
        let mut timed_out = Vec::new();
        for entry in entries.into_iter().rev() {
            match tokio::time::timeout(timeout, entry.handler.run()).await {
                Ok(()) => ran.push(entry.name),
                Err(_) => timed_out.push(entry.name),
            }
        }
        CleanupReport { ran, timed_out }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn reset(&self) {
        self.shutting_down.store(false, Ordering::SeqCst);
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct Recorder {
        name: String,
        log: Arc<AsyncMutex<Vec<String>>>,
    }

    #[async_trait]
    impl CleanupHandler for Recorder {
        async fn run(&self) {
            self.log.lock().await.push(self.name.clone());
        }
    }

    struct Hanger;

    #[async_trait]
    impl CleanupHandler for Hanger {
        async fn run(&self) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    #[tokio::test]
    async fn handlers_run_in_lifo_order() {
        let registry = CleanupRegistry::new();
        let log = Arc::new(AsyncMutex::new(Vec::new()));
        registry.register("first", Box::new(Recorder { name: "first".into(), log: log.clone() }));
        registry.register("second", Box::new(Recorder { name: "second".into(), log: log.clone() }));

        registry.shutdown(DEFAULT_HANDLER_TIMEOUT).await;
        let final_log = log.lock().await.clone();
        assert_eq!(final_log, vec!["second".to_string(), "first".to_string()]);
    }

    #[tokio::test]
    async fn a_hanging_handler_times_out_without_blocking_others() {
        let registry = CleanupRegistry::new();
        let log = Arc::new(AsyncMutex::new(Vec::new()));
        registry.register("hanger", Box::new(Hanger));
        registry.register("after", Box::new(Recorder { name: "after".into(), log: log.clone() }));

        let report = registry.shutdown(Duration::from_millis(50)).await;
        assert_eq!(report.ran, vec!["after".to_string()]);
        assert_eq!(report.timed_out, vec!["hanger".to_string()]);
    }

    #[tokio::test]
    async fn registration_refused_once_shutdown_begun() {
        let registry = CleanupRegistry::new();
        registry.shutdown(DEFAULT_HANDLER_TIMEOUT).await;
        let log = Arc::new(AsyncMutex::new(Vec::new()));
        let accepted = registry.register("late", Box::new(Recorder { name: "late".into(), log }));
        assert!(!accepted);
    }
}
