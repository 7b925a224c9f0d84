//! Durable Task Records
//!
//! A `Task` is the single coordination point for a long-running run. Many
//! concurrent writers mutate the same row, so the only legal mutation path
//! is the atomic-merge rule: acquire the per-task lock, re-read, merge the
//! delta, write back. Progress never decreases, history is append-only and
//! deduplicated by entry id, and terminal status is write-once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AdvisorError, Result};

/// Task lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states are write-once
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Legal transitions: PENDING → RUNNING → {SUCCESS|FAILED|CANCELLED};
    /// PENDING may also fail or cancel before a worker picks it up
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            TaskStatus::Pending => matches!(
                next,
                TaskStatus::Running | TaskStatus::Failed | TaskStatus::Cancelled
            ),
            TaskStatus::Running => matches!(
                next,
                TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled
            ),
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled => false,
        }
    }
}

/// One append-only history entry
///
/// `entry_id` is stable so re-applying the same delta is idempotent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry_id: String,
    pub ts: DateTime<Utc>,
    pub phase: String,
    pub event: String,
    pub detail: String,
}

impl HistoryEntry {
    pub fn new(
        phase: impl Into<String>,
        event: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            phase: phase.into(),
            event: event.into(),
            detail: detail.into(),
        }
    }

    /// Entry with a caller-chosen stable id
    pub fn with_id(
        entry_id: impl Into<String>,
        phase: impl Into<String>,
        event: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            ts: Utc::now(),
            phase: phase.into(),
            event: event.into(),
            detail: detail.into(),
        }
    }
}

/// The durable record of a long-running run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: Option<String>,
    pub kind: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub metadata: Map<String, Value>,
    pub execution_history: Vec<HistoryEntry>,
    pub result_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            kind: kind.into(),
            status: TaskStatus::Pending,
            progress: 0,
            metadata: Map::new(),
            execution_history: Vec::new(),
            result_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Merge a delta under the atomic-merge rule
    ///
    /// - status transitions are validated; leaving a terminal state is
    ///   rejected
    /// - progress is the max of current and incoming, capped at 100
    /// - history entries append; an entry whose id is already present is
    ///   skipped, making re-application idempotent
    /// - metadata merges key-by-key one level deep: lists append, anything
    ///   else (nested maps included) is replaced
    pub fn apply_delta(&mut self, delta: &TaskDelta) -> Result<()> {
        if let Some(next) = delta.status {
            if next != self.status {
                if !self.status.can_transition_to(next) {
                    return Err(AdvisorError::InvalidTransition {
                        from: self.status,
                        to: next,
                    });
                }
                self.status = next;
            }
        }

        if let Some(progress) = delta.progress {
            self.progress = self.progress.max(progress.min(100));
        }

        for entry in &delta.history {
            let duplicate = self
                .execution_history
                .iter()
                .any(|existing| existing.entry_id == entry.entry_id);
            if !duplicate {
                self.execution_history.push(entry.clone());
            }
        }

        for (key, value) in &delta.metadata {
            match (self.metadata.get_mut(key), value) {
                (Some(Value::Array(existing)), Value::Array(incoming)) => {
                    existing.extend(incoming.iter().cloned());
                }
                _ => {
                    self.metadata.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(result_ref) = &delta.result_ref {
            self.result_ref = Some(result_ref.clone());
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A mergeable task mutation
#[derive(Clone, Debug, Default)]
pub struct TaskDelta {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub metadata: Map<String, Value>,
    pub history: Vec<HistoryEntry>,
    pub result_ref: Option<String>,
}

impl TaskDelta {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn note(mut self, entry: HistoryEntry) -> Self {
        self.history.push(entry);
        self
    }

    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn result_ref(mut self, result_ref: impl Into<String>) -> Self {
        self.result_ref = Some(result_ref.into());
        self
    }
}

/// Task storage trait
///
/// `apply` is the atomic-merge rule: implementations must serialize
/// concurrent writers per task (row lock or advisory mutex) so no update
/// is lost.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: Task) -> Result<Task>;

    async fn get(&self, id: &str) -> Result<Option<Task>>;

    /// Read-merge-write under the per-task lock
    async fn apply(&self, id: &str, delta: TaskDelta) -> Result<Task>;
}

/// Bounded retry around `TaskStore::apply` for stores that can surface
/// transient conflicts (5 attempts, jittered backoff)
pub async fn apply_with_retry(
    store: &Arc<dyn TaskStore>,
    id: &str,
    delta: TaskDelta,
) -> Result<Task> {
    const MAX_ATTEMPTS: u32 = 5;

    let mut attempt = 1;
    loop {
        match store.apply(id, delta.clone()).await {
            Err(AdvisorError::Conflict(reason)) if attempt < MAX_ATTEMPTS => {
                let jitter_ms = rand::thread_rng().gen_range(10..50) * u64::from(attempt);
                tracing::warn!(task = id, attempt, "merge conflict ({reason}), retrying");
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// How long a writer waits on the advisory lock before reporting a
/// conflict
const LOCK_WAIT: Duration = Duration::from_secs(5);

/// In-memory task store with per-task advisory mutexes
pub struct MemoryTaskStore {
    rows: RwLock<HashMap<String, Task>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(id.to_string()).or_default())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: Task) -> Result<Task> {
        self.rows
            .write()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.rows.read().unwrap().get(id).cloned())
    }

    async fn apply(&self, id: &str, delta: TaskDelta) -> Result<Task> {
        let lock = self.lock_for(id);
        let _guard = tokio::time::timeout(LOCK_WAIT, lock.lock())
            .await
            .map_err(|_| AdvisorError::Conflict(format!("lock wait exceeded for task {id}")))?;

        let mut rows = self.rows.write().unwrap();
        let task = rows
            .get_mut(id)
            .ok_or_else(|| AdvisorError::TaskNotFound(id.to_string()))?;
        task.apply_delta(&delta)?;
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_transition_validation() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Success.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Success));
    }

    #[test]
    fn test_terminal_status_is_write_once() {
        let mut task = Task::new("deep_research");
        task.apply_delta(&TaskDelta::new().status(TaskStatus::Running))
            .unwrap();
        task.apply_delta(&TaskDelta::new().status(TaskStatus::Cancelled))
            .unwrap();

        let err = task
            .apply_delta(&TaskDelta::new().status(TaskStatus::Success))
            .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidTransition { .. }));
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut task = Task::new("deep_research");
        task.apply_delta(&TaskDelta::new().progress(65)).unwrap();
        task.apply_delta(&TaskDelta::new().progress(40)).unwrap();
        assert_eq!(task.progress, 65);

        task.apply_delta(&TaskDelta::new().progress(200)).unwrap();
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_history_append_preserves_prefix() {
        let mut task = Task::new("deep_research");
        let first = HistoryEntry::new("phase_a", "started", "");
        task.apply_delta(&TaskDelta::new().note(first.clone()))
            .unwrap();
        task.apply_delta(&TaskDelta::new().note(HistoryEntry::new("phase_a", "done", "")))
            .unwrap();

        assert_eq!(task.execution_history.len(), 2);
        assert_eq!(task.execution_history[0].entry_id, first.entry_id);
    }

    #[test]
    fn test_delta_reapplication_is_idempotent() {
        let mut task = Task::new("deep_research");
        let delta = TaskDelta::new()
            .progress(40)
            .note(HistoryEntry::with_id("evt-1", "phase_a", "done", ""));

        task.apply_delta(&delta).unwrap();
        task.apply_delta(&delta).unwrap();

        assert_eq!(task.execution_history.len(), 1);
        assert_eq!(task.progress, 40);
    }

    #[test]
    fn test_metadata_merge_semantics() {
        let mut task = Task::new("deep_research");
        task.apply_delta(
            &TaskDelta::new()
                .meta("tags", json!(["a"]))
                .meta("nested", json!({"x": 1, "y": 2}))
                .meta("mode", json!("deep")),
        )
        .unwrap();
        task.apply_delta(
            &TaskDelta::new()
                .meta("tags", json!(["b"]))
                .meta("nested", json!({"x": 9})),
        )
        .unwrap();

        // Lists append, nested maps are replaced wholesale
        assert_eq!(task.metadata["tags"], json!(["a", "b"]));
        assert_eq!(task.metadata["nested"], json!({"x": 9}));
        assert_eq!(task.metadata["mode"], json!("deep"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
        let task = store.create(Task::new("deep_research")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let id = task.id.clone();
            handles.push(tokio::spawn(async move {
                let delta = TaskDelta::new()
                    .progress(65 + (i % 25) as u8)
                    .note(HistoryEntry::new("phase_b", "question_answered", format!("q{i}")));
                apply_with_retry(&store, &id, delta).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_task = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(final_task.execution_history.len(), 16);
        assert!(final_task.progress >= 65);
    }

    #[tokio::test]
    async fn test_apply_to_missing_task() {
        let store = MemoryTaskStore::new();
        let err = store
            .apply("nope", TaskDelta::new().progress(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::TaskNotFound(_)));
    }
}
