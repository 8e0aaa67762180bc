//! Task, journal and settings operations over the in-memory [`AppData`].
//!
//! Callers hold the data lock, apply one of these, then persist.

use crate::analytics::parse_timestamp;
use crate::errors::AppError;
use crate::models::{
    AppData, CreateTaskRequest, JournalEntry, JournalRequest, MOOD_MAX, MOOD_MIN, NOTE_MAX_CHARS,
    Task, UpdateTaskRequest,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Reverse;

pub const DEFAULT_SOURCE: &str = "web";

impl AppData {
    /// Newest first.
    pub fn list_tasks(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|task| Reverse((task.created_at, task.id)));
        tasks
    }

    pub fn create_task(
        &mut self,
        request: CreateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<Task, AppError> {
        let text = match request.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(AppError::bad_request("text is required")),
        };

        let created_at = request
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now);
        let source = request
            .source
            .filter(|source| !source.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

        let task = Task {
            id: self.allocate_task_id(),
            text,
            done: request.done,
            created_at: Some(created_at),
            source,
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn update_task(&mut self, id: u64, request: UpdateTaskRequest) -> Result<Task, AppError> {
        if request.text.is_none() && request.done.is_none() {
            return Err(AppError::bad_request("Nothing to update"));
        }
        if matches!(&request.text, Some(text) if text.trim().is_empty()) {
            return Err(AppError::bad_request("text must not be empty"));
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| AppError::not_found(format!("task {id} not found")))?;

        if let Some(text) = request.text {
            task.text = text;
        }
        if let Some(done) = request.done {
            task.done = done;
        }
        Ok(task.clone())
    }

    /// Returns whether a task was actually removed.
    pub fn delete_task(&mut self, id: u64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    pub fn upsert_journal(
        &mut self,
        request: JournalRequest,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, AppError> {
        let raw_key = request
            .date_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::bad_request("dateKey is required"))?;
        let date_key = NaiveDate::parse_from_str(raw_key.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::bad_request("dateKey must be YYYY-MM-DD"))?
            .format("%Y-%m-%d")
            .to_string();

        let mood = match request.mood {
            Some(mood) if (i64::from(MOOD_MIN)..=i64::from(MOOD_MAX)).contains(&mood) => {
                Some(mood as u8)
            }
            Some(_) => {
                return Err(AppError::bad_request(format!(
                    "mood must be between {MOOD_MIN} and {MOOD_MAX}"
                )));
            }
            None => None,
        };

        if let Some(note) = &request.note {
            if note.chars().count() > NOTE_MAX_CHARS {
                return Err(AppError::bad_request(format!(
                    "note must be at most {NOTE_MAX_CHARS} characters"
                )));
            }
        }

        if let Some(entry) = self.journal.get_mut(&date_key) {
            entry.mood = mood;
            entry.note = request.note;
            entry.updated_at = now;
            return Ok(entry.clone());
        }

        self.next_journal_id = self.next_journal_id.saturating_add(1);
        let entry = JournalEntry {
            id: self.next_journal_id,
            date_key: date_key.clone(),
            mood,
            note: request.note,
            created_at: now,
            updated_at: now,
        };
        self.journal.insert(date_key, entry.clone());
        Ok(entry)
    }

    pub fn journal_entry(&self, date_key: &str) -> Option<&JournalEntry> {
        self.journal.get(date_key.trim())
    }

    /// Stores the goal floored at 1 and returns the stored value.
    pub fn set_daily_goal(&mut self, goal: i64) -> i64 {
        self.settings.daily_goal = goal.max(1);
        self.settings.daily_goal
    }

    fn allocate_task_id(&mut self) -> u64 {
        let highest = self.tasks.iter().map(|task| task.id).max().unwrap_or(0);
        self.next_task_id = self.next_task_id.max(highest).saturating_add(1);
        self.next_task_id
    }
}
