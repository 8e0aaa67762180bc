//! Daily and weekly completion statistics derived from the task list.
//!
//! Everything here is a pure function of its arguments. Callers pass the
//! reference "now" explicitly; nothing in this module reads the clock.

use crate::models::{DayCompletion, Task};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const WINDOW_DAYS: i64 = 7;
const INTENSITY_PER_TASK: u32 = 20;
const PERCENT_CAP: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryEntry {
    pub date_key: String,
    pub label: String,
    pub completed: u32,
    pub intensity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub completed_today: u32,
    pub safe_goal: u32,
    pub completion_rate_today: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTotals {
    pub total_completed_week: u32,
    pub weekly_goal: u64,
    pub max_for_bars: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub today: TodayStats,
    pub weekly_summary: Vec<WeeklySummaryEntry>,
    pub totals: WeeklyTotals,
}

/// Calendar day of `ts` in UTC, formatted `YYYY-MM-DD`.
pub fn date_key_of(ts: DateTime<Utc>) -> String {
    date_key(ts.date_naive())
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` (read as
/// UTC) and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn date_key_or_now(raw: Option<&str>, now: DateTime<Utc>) -> String {
    date_key_of(raw.and_then(parse_timestamp).unwrap_or(now))
}

pub fn safe_goal(daily_goal: i64) -> u32 {
    if daily_goal > 0 {
        u32::try_from(daily_goal).unwrap_or(u32::MAX)
    } else {
        1
    }
}

pub fn build_weekly_summary(tasks: &[Task], now: DateTime<Utc>) -> Vec<WeeklySummaryEntry> {
    let completed_by_day = completed_by_day(tasks, now);
    let today = now.date_naive();

    let mut summary = Vec::with_capacity(WINDOW_DAYS as usize);
    for offset in (0..WINDOW_DAYS).rev() {
        let day = today - Duration::days(offset);
        let key = date_key(day);
        let completed = completed_by_day.get(&key).copied().unwrap_or(0);
        let label = if offset == 0 {
            "Today".to_string()
        } else {
            day.format("%a").to_string()
        };

        summary.push(WeeklySummaryEntry {
            date_key: key,
            label,
            completed,
            intensity: completed
                .saturating_mul(INTENSITY_PER_TASK)
                .min(PERCENT_CAP),
        });
    }
    summary
}

pub fn compute_today_stats(tasks: &[Task], daily_goal: i64, now: DateTime<Utc>) -> TodayStats {
    let safe_goal = safe_goal(daily_goal);
    let today_key = date_key_of(now);
    let completed_today = tasks
        .iter()
        .filter(|task| task.done && date_key_of(task.created_at.unwrap_or(now)) == today_key)
        .count();
    let completed_today = u32::try_from(completed_today).unwrap_or(u32::MAX);

    TodayStats {
        completed_today,
        safe_goal,
        completion_rate_today: completion_rate(completed_today, safe_goal),
    }
}

pub fn compute_weekly_totals(summary: &[WeeklySummaryEntry], safe_goal: u32) -> WeeklyTotals {
    let safe_goal = safe_goal.max(1);
    WeeklyTotals {
        total_completed_week: summary
            .iter()
            .fold(0u32, |sum, day| sum.saturating_add(day.completed)),
        weekly_goal: u64::from(safe_goal) * WINDOW_DAYS as u64,
        max_for_bars: safe_goal,
    }
}

pub fn analytics_snapshot(tasks: &[Task], daily_goal: i64, now: DateTime<Utc>) -> AnalyticsSnapshot {
    let today = compute_today_stats(tasks, daily_goal, now);
    let weekly_summary = build_weekly_summary(tasks, now);
    let totals = compute_weekly_totals(&weekly_summary, today.safe_goal);
    AnalyticsSnapshot {
        today,
        weekly_summary,
        totals,
    }
}

/// Height of a per-day bar as a percentage of `max_for_bars`, capped at 100.
pub fn bar_height_percent(completed: u32, max_for_bars: u32) -> f64 {
    let max = f64::from(max_for_bars.max(1));
    (f64::from(completed) / max * 100.0).min(100.0)
}

/// Per-day task counts from the start of the trailing window onwards, oldest
/// first. Only days that have at least one task appear; `completed` counts
/// the done ones. Future-dated tasks are kept and tasks without a timestamp
/// are skipped.
pub fn daily_completions(tasks: &[Task], now: DateTime<Utc>) -> Vec<DayCompletion> {
    let oldest = now.date_naive() - Duration::days(WINDOW_DAYS - 1);

    let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for task in tasks {
        let Some(created_at) = task.created_at else {
            continue;
        };
        let day = created_at.date_naive();
        if day < oldest {
            continue;
        }
        let completed = days.entry(day).or_default();
        if task.done {
            *completed = completed.saturating_add(1);
        }
    }

    days.into_iter()
        .map(|(day, completed)| DayCompletion {
            day: date_key(day),
            completed,
        })
        .collect()
}

fn completed_by_day(tasks: &[Task], now: DateTime<Utc>) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for task in tasks.iter().filter(|task| task.done) {
        let count = counts
            .entry(date_key_of(task.created_at.unwrap_or(now)))
            .or_insert(0u32);
        *count = count.saturating_add(1);
    }
    counts
}

// Integer arithmetic, rounding half up.
fn completion_rate(completed: u32, safe_goal: u32) -> u32 {
    let goal = u64::from(safe_goal.max(1));
    let rate = (u64::from(completed) * 200 + goal) / (goal * 2);
    rate.min(u64::from(PERCENT_CAP)) as u32
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
