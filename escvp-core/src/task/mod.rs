use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{Instrument, debug, debug_span};

struct TrackedTask {
    name: &'static str,
    handle: tokio::task::JoinHandle<()>,
}

type TaskMap = Arc<Mutex<HashMap<u64, TrackedTask>>>;

/// Background tasks owned by a client: the listener dispatcher,
/// reconnect attempts and expiry of abandoned requests. Finished tasks drop out on their own; anything
/// still running is aborted when the pool is dropped.
pub struct TaskPool {
    tasks: TaskMap,
    next_id: AtomicU64,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = lock(&self.tasks);
        let mut names: Vec<_> = tasks.values().map(|t| t.name).collect();
        names.sort_unstable();
        f.debug_struct("TaskPool").field("running", &names).finish()
    }
}

impl TaskPool {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Spawns `future` on the runtime and tracks it until it finishes.
    ///
    /// # Arguments
    ///
    /// * `name` - Short label attached to the task's tracing span.
    /// * `future` - The work to run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, name: &'static str, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Held across spawn so the task cannot remove itself before it
        // is inserted.
        let mut guard = lock(&self.tasks);
        let handle = tokio::spawn(async move {
            future.instrument(debug_span!("task", name, id)).await;
            lock(&tasks).remove(&id);
        });
        guard.insert(id, TrackedTask { name, handle });
        debug!(name, id, "spawned task");
        id
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.tasks).is_empty()
    }

    pub fn abort_all(&self) {
        for (id, task) in lock(&self.tasks).drain() {
            debug!(name = task.name, id, "aborting task");
            task.handle.abort();
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.abort_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn finished_tasks_are_forgotten() {
        let pool = TaskPool::new();
        let (tx, rx) = oneshot::channel();
        pool.spawn("once", async move {
            let _ = tx.send(7);
        });
        assert_eq!(rx.await.unwrap(), 7);

        for _ in 0..50 {
            if pool.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn abort_all_stops_running_tasks() {
        let pool = TaskPool::new();
        let (tx, rx) = oneshot::channel::<()>();
        pool.spawn("forever", async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        assert_eq!(pool.len(), 1);

        pool.abort_all();
        assert!(pool.is_empty());
        // The sender is dropped once the aborted task is torn down.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn drop_aborts() {
        let (tx, rx) = oneshot::channel::<()>();
        {
            let pool = TaskPool::new();
            pool.spawn("forever", async move {
                let _tx = tx;
                std::future::pending::<()>().await;
            });
        }
        assert!(rx.await.is_err());
    }

    #[test]
    fn ids_are_unique() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let pool = TaskPool::new();
            let a = pool.spawn("a", async {});
            let b = pool.spawn("b", async {});
            assert_ne!(a, b);
        });
    }
}
