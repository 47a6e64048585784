//! Process-wide directory of live tasks. Keyed two ways: by `TaskId` for direct lookups, and by
//! the session id a connection authenticated with, so the broadcaster consumer thread
//! (`broadcaster_client.rs`) can route a revised session row to the connection that owns it
//! without scanning every live task.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::task::{Task, TaskId};

pub struct TaskRegistry {
    tasks: DashMap<TaskId, Arc<Task>>,
    by_session: DashMap<i64, TaskId>,
    next_id: AtomicU32,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            tasks: DashMap::new(),
            by_session: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn allocate_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert(&self, task: Arc<Task>) {
        self.tasks.insert(task.id, task);
    }

    pub fn remove(&self, id: TaskId) {
        if let Some((_, task)) = self.tasks.remove(&id) {
            if let Some(session_id) = *task.session_id.lock() {
                self.by_session.remove(&session_id);
            }
        }
    }

    pub fn get(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Records that `task` now owns `session_id`, so a revised session row the broadcast
    /// consumer thread receives can be routed to it without scanning every live task.
    pub fn bind_session(&self, session_id: i64, task_id: TaskId) {
        self.by_session.insert(session_id, task_id);
    }

    pub fn get_by_session(&self, session_id: i64) -> Option<Arc<Task>> {
        let task_id = *self.by_session.get(&session_id)?;
        self.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        TaskRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_ids_are_distinct_and_increasing() {
        let registry = TaskRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert!(b.0 > a.0);
    }
}
