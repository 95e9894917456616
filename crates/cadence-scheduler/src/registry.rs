//! Task handler registry.
//!
//! An explicit registry object built once at process startup and shared by
//! reference with the scheduler. Handlers for the pull task types are
//! supplied by the polling layer; the daemon registers the garbage
//! collection handlers itself.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::warn;

use cadence_core::TaskType;

/// Boxed future returned by a task handler.
pub type HandlerFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

/// A task handler: invoked once per granted lease, runs to completion.
pub type TaskHandler = Arc<dyn Fn() -> HandlerFuture + Send + Sync>;

/// Maps task types to their handlers.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<TaskType, TaskHandler>,
    /// Task types already warned about, so a missing handler logs once.
    warned: Mutex<HashSet<TaskType>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a task type, replacing any previous one.
    pub fn register(&mut self, task_type: TaskType, handler: TaskHandler) {
        self.handlers.insert(task_type, handler);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_handler(mut self, task_type: TaskType, handler: TaskHandler) -> Self {
        self.register(task_type, handler);
        self
    }

    /// Look up the handler for a task type.
    pub fn get(&self, task_type: TaskType) -> Option<TaskHandler> {
        self.handlers.get(&task_type).cloned()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Log a missing handler once per task type per process lifetime.
    pub fn warn_unregistered(&self, task_type: TaskType) {
        let mut warned = match self.warned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if warned.insert(task_type) {
            warn!(task = %task_type, "no handler registered for task type, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_handler(counter: Arc<AtomicU64>) -> TaskHandler {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn registered_handler_is_invocable() {
        let counter = Arc::new(AtomicU64::new(0));
        let registry = TaskRegistry::new()
            .with_handler(TaskType::PullProject, counting_handler(counter.clone()));

        let handler = registry.get(TaskType::PullProject).unwrap();
        handler().await.unwrap();
        handler().await.unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn unregistered_lookup_returns_none() {
        let registry = TaskRegistry::new();
        assert!(registry.get(TaskType::GarbageCollectRefs).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn register_replaces_previous_handler() {
        let first = Arc::new(AtomicU64::new(0));
        let second = Arc::new(AtomicU64::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(TaskType::PullProject, counting_handler(first));
        registry.register(TaskType::PullProject, counting_handler(second));
        assert_eq!(registry.len(), 1);
    }
}
