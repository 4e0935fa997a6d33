// src/scheduler.rs
//
// Named recurring background tasks. The registry is owned by the application
// state; starting or stopping a name twice is a no-op.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `job` now and then every `period` until stopped. Returns `false`
    /// when a task with this name is already running.
    pub fn start<F, Fut>(&self, name: &str, period: Duration, job: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        if let Some(handle) = tasks.get(name) {
            if !handle.is_finished() {
                return false;
            }
        }

        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                log::debug!("scheduled task tick name={}", task_name);
                job().await;
            }
        });

        tasks.insert(name.to_string(), handle);
        log::info!("scheduled task started name={} period={:?}", name, period);
        true
    }

    /// Returns `false` when no task with this name exists.
    pub fn stop(&self, name: &str) -> bool {
        match self.tasks().remove(name) {
            Some(handle) => {
                handle.abort();
                log::info!("scheduled task stopped name={}", name);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks()
            .get(name)
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tasks()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn stop_all(&self) {
        for (name, handle) in self.tasks().drain() {
            handle.abort();
            log::info!("scheduled task stopped name={}", name);
        }
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn runs_job_repeatedly() {
        let registry = TaskRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        assert!(registry.start("tick", Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);
        assert!(registry.stop("tick"));
    }

    #[tokio::test]
    async fn start_is_idempotent_per_name() {
        let registry = TaskRegistry::new();
        assert!(registry.start("job", Duration::from_secs(60), || async {}));
        assert!(!registry.start("job", Duration::from_secs(60), || async {}));
        assert!(registry.start("other", Duration::from_secs(60), || async {}));
        assert_eq!(registry.running(), vec!["job".to_string(), "other".to_string()]);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_halts_the_job() {
        let registry = TaskRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        registry.start("job", Duration::from_millis(5), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(registry.stop("job"));
        assert!(!registry.stop("job"));
        assert!(!registry.is_running("job"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_stop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn stopped_name_can_be_restarted() {
        let registry = TaskRegistry::new();
        assert!(registry.start("job", Duration::from_secs(60), || async {}));
        registry.stop_all();
        assert!(registry.running().is_empty());
        assert!(registry.start("job", Duration::from_secs(60), || async {}));
    }
}
