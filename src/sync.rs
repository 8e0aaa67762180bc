//! Client-side task snapshot kept in step with the server.
//!
//! Writes are applied to the local [`TaskBoard`] before the server answers.
//! Each one is tracked as an operation that ends either confirmed or rolled
//! back. A periodic refresh replaces the whole snapshot with the server's
//! list.

use crate::analytics::date_key_of;
use crate::client::{ApiClient, ClientError};
use crate::config::DEFAULT_REFRESH_INTERVAL;
use crate::models::{CreateTaskRequest, JournalEntry, JournalRequest, Task, UpdateTaskRequest};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub type OpId = u64;

const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(10);
/// How many settled outcomes [`TaskBoard::status`] can still report.
pub const SETTLED_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone)]
enum Undo {
    Toggle { id: u64, previous_done: bool },
    Delete { task: Task, index: usize },
}

#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    pending: HashMap<OpId, Undo>,
    settled: VecDeque<(OpId, OpStatus)>,
    next_op: OpId,
}

impl TaskBoard {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Puts a freshly created task at the top of the list.
    pub fn insert_created(&mut self, task: Task) {
        self.tasks.retain(|existing| existing.id != task.id);
        self.tasks.insert(0, task);
    }

    /// Flips `done` locally. Returns the op and the new flag, or `None` for an
    /// unknown task.
    pub fn begin_toggle(&mut self, id: u64) -> Option<(OpId, bool)> {
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        let previous_done = task.done;
        task.done = !previous_done;
        let op = self.open(Undo::Toggle { id, previous_done });
        Some((op, !previous_done))
    }

    pub fn begin_delete(&mut self, id: u64) -> Option<OpId> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        let task = self.tasks.remove(index);
        Some(self.open(Undo::Delete { task, index }))
    }

    pub fn confirm(&mut self, op: OpId) -> bool {
        if self.pending.remove(&op).is_none() {
            return false;
        }
        self.settle(op, OpStatus::Confirmed);
        true
    }

    pub fn roll_back(&mut self, op: OpId) -> bool {
        let Some(undo) = self.pending.remove(&op) else {
            return false;
        };

        match undo {
            Undo::Toggle { id, previous_done } => {
                if let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) {
                    task.done = previous_done;
                }
            }
            Undo::Delete { task, index } => {
                if !self.tasks.iter().any(|existing| existing.id == task.id) {
                    let index = index.min(self.tasks.len());
                    self.tasks.insert(index, task);
                }
            }
        }
        self.settle(op, OpStatus::RolledBack);
        true
    }

    /// `None` for unknown ops and for settled ops that aged out of the
    /// recent-outcome history.
    pub fn status(&self, op: OpId) -> Option<OpStatus> {
        if self.pending.contains_key(&op) {
            return Some(OpStatus::Pending);
        }
        self.settled
            .iter()
            .find(|(settled, _)| *settled == op)
            .map(|(_, status)| *status)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ops the board is still holding on to, pending or recently settled.
    pub fn tracked_ops(&self) -> usize {
        self.pending.len() + self.settled.len()
    }

    fn open(&mut self, undo: Undo) -> OpId {
        self.next_op += 1;
        self.pending.insert(self.next_op, undo);
        self.next_op
    }

    fn settle(&mut self, op: OpId, status: OpStatus) {
        if self.settled.len() == SETTLED_HISTORY {
            self.settled.pop_front();
        }
        self.settled.push_back((op, status));
    }
}

#[derive(Clone)]
pub struct Syncer {
    client: ApiClient,
    board: Arc<Mutex<TaskBoard>>,
    source: String,
}

impl Syncer {
    pub fn new(client: ApiClient, source: impl Into<String>) -> Self {
        Self {
            client,
            board: Arc::new(Mutex::new(TaskBoard::default())),
            source: source.into(),
        }
    }

    pub fn board(&self) -> Arc<Mutex<TaskBoard>> {
        Arc::clone(&self.board)
    }

    pub async fn snapshot(&self) -> Vec<Task> {
        self.board.lock().await.tasks().to_vec()
    }

    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let tasks = self.client.list_tasks().await?;
        self.board.lock().await.replace_all(tasks);
        Ok(())
    }

    /// Blank text is ignored and yields `Ok(None)`.
    pub async fn add_task(&self, text: &str) -> Result<Option<Task>, ClientError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let request = CreateTaskRequest {
            text: Some(text.to_string()),
            done: false,
            created_at: Some(Utc::now().to_rfc3339()),
            source: Some(self.source.clone()),
        };
        match self.client.create_task(&request).await {
            Ok(task) => {
                self.board.lock().await.insert_created(task.clone());
                Ok(Some(task))
            }
            Err(err) => {
                warn!("failed to add task: {err}");
                Err(err)
            }
        }
    }

    /// Returns how the toggle settled, or `None` when the task is not on the
    /// board.
    pub async fn toggle_task(&self, id: u64) -> Option<OpStatus> {
        let (op, done) = self.board.lock().await.begin_toggle(id)?;
        let request = UpdateTaskRequest {
            text: None,
            done: Some(done),
        };
        let result = self.client.update_task(id, &request).await.map(|_| ());
        Some(self.settle(op, result, "update task").await)
    }

    pub async fn delete_task(&self, id: u64) -> Option<OpStatus> {
        let op = self.board.lock().await.begin_delete(id)?;
        let result = self.client.delete_task(id).await;
        Some(self.settle(op, result, "delete task").await)
    }

    pub async fn save_journal(
        &self,
        mood: Option<u8>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, ClientError> {
        let request = JournalRequest {
            date_key: Some(date_key_of(now)),
            mood: mood.map(i64::from),
            note,
        };
        self.client.save_journal(&request).await.inspect_err(|err| {
            warn!("failed to save journal: {err}");
        })
    }

    /// Refresh loop on the standard five second cadence.
    pub fn spawn_default_refresh_loop(&self) -> RefreshHandle {
        self.spawn_refresh_loop(DEFAULT_REFRESH_INTERVAL)
    }

    /// Polls the task list every `period` until the handle is stopped or
    /// dropped. In-flight writes are not cancelled.
    pub fn spawn_refresh_loop(&self, period: Duration) -> RefreshHandle {
        let syncer = self.clone();
        let period = period.max(MIN_REFRESH_PERIOD);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match syncer.refresh().await {
                    Ok(()) => debug!("task list refreshed"),
                    Err(err) => warn!("task refresh failed: {err}"),
                }
            }
        });
        RefreshHandle { task }
    }

    async fn settle(&self, op: OpId, result: Result<(), ClientError>, action: &str) -> OpStatus {
        let mut board = self.board.lock().await;
        match result {
            Ok(()) => {
                board.confirm(op);
                OpStatus::Confirmed
            }
            Err(err) => {
                warn!("failed to {action}: {err}");
                board.roll_back(op);
                OpStatus::RolledBack
            }
        }
    }
}

pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
