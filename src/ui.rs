use crate::analytics::{AnalyticsSnapshot, bar_height_percent, date_key_of};
use crate::models::{JournalEntry, MOOD_MAX, NOTE_MAX_CHARS, Task};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const MOODS: [&str; MOOD_MAX as usize] = ["😢", "😕", "😐", "😊", "🤩"];

pub fn render_index(
    now: DateTime<Utc>,
    snapshot: &AnalyticsSnapshot,
    tasks: &[Task],
    entry: Option<&JournalEntry>,
) -> String {
    let today = &snapshot.today;
    let totals = &snapshot.totals;
    let mood = entry.and_then(|entry| entry.mood);
    let note = entry.and_then(|entry| entry.note.as_deref()).unwrap_or("");

    INDEX_HTML
        .replace("{{DATE_LABEL}}", &now.format("%A, %B %-d").to_string())
        .replace("{{DATE_KEY}}", &date_key_of(now))
        .replace("{{MOODS}}", &render_moods(mood))
        .replace("{{NOTE_MAX}}", &NOTE_MAX_CHARS.to_string())
        .replace("{{COMPLETED_TODAY}}", &today.completed_today.to_string())
        .replace("{{SAFE_GOAL}}", &today.safe_goal.to_string())
        .replace("{{RATE}}", &today.completion_rate_today.to_string())
        .replace("{{WEEK_TOTAL}}", &totals.total_completed_week.to_string())
        .replace("{{WEEK_GOAL}}", &totals.weekly_goal.to_string())
        .replace("{{WEEK_ROWS}}", &render_week(snapshot))
        .replace("{{TASKS}}", &render_tasks(tasks))
        .replace("{{NOTE}}", &escape_html(note))
}

fn render_moods(selected: Option<u8>) -> String {
    let mut out = String::new();
    for (index, emoji) in MOODS.iter().enumerate() {
        let value = index + 1;
        let active = if selected == Some(value as u8) { " active" } else { "" };
        let _ = write!(
            out,
            r#"<button type="button" class="mood{active}" data-mood="{value}">{emoji}</button>"#
        );
    }
    out
}

fn render_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return r#"<li class="empty">No tasks yet.</li>"#.to_string();
    }
    let mut out = String::new();
    for task in tasks {
        let checked = if task.done { " checked" } else { "" };
        let _ = write!(
            out,
            r#"<li data-id="{id}"><label><input type="checkbox" class="toggle"{checked} /> <span>{text}</span></label><button type="button" class="delete" aria-label="Delete">×</button></li>"#,
            id = task.id,
            text = escape_html(&task.text),
        );
    }
    out
}

fn render_week(snapshot: &AnalyticsSnapshot) -> String {
    let mut out = String::new();
    for day in &snapshot.weekly_summary {
        let bar = bar_height_percent(day.completed, snapshot.totals.max_for_bars);
        let _ = write!(
            out,
            r#"<div class="week-row" data-date="{key}"><span class="day">{label}</span><div class="heat"><div style="width:{intensity}%"></div></div><div class="bar"><div style="width:{bar:.0}%"></div></div><span class="count">{completed} done</span></div>"#,
            key = day.date_key,
            label = escape_html(&day.label),
            intensity = day.intensity,
            completed = day.completed,
        );
    }
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            _ => out.push(ch),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Mood Journal</title>
  <style>
    :root {
      --bg: #f4f1fb;
      --ink: #2a2740;
      --muted: #6d6a85;
      --accent: #7c5cff;
      --heat: #ffb35c;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 18px 48px rgba(42, 39, 64, 0.14);
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(160deg, var(--bg), #e8f0ff 70%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      padding: 28px 16px 48px;
    }

    .layout {
      width: min(1040px, 100%);
      margin: 0 auto;
      display: grid;
      grid-template-columns: minmax(0, 1fr) 320px;
      gap: 24px;
    }

    @media (max-width: 900px) {
      .layout { grid-template-columns: 1fr; }
    }

    .card {
      background: var(--card);
      border-radius: 20px;
      box-shadow: var(--shadow);
      padding: 22px;
      margin-bottom: 20px;
    }

    h1 { margin: 0 0 18px; font-size: 2rem; }
    h2 { margin: 0 0 12px; font-size: 1.1rem; }
    .muted { color: var(--muted); font-size: 0.9rem; }

    .moods { display: flex; gap: 10px; }
    .mood {
      font-size: 1.6rem;
      border: 2px solid transparent;
      border-radius: 14px;
      background: #fff;
      padding: 6px 10px;
      cursor: pointer;
    }
    .mood.active { border-color: var(--accent); }

    #task-list { list-style: none; margin: 12px 0 0; padding: 0; }
    #task-list li {
      display: flex;
      justify-content: space-between;
      align-items: center;
      padding: 8px 0;
      border-bottom: 1px solid #ece9f5;
    }
    #task-list li.empty { color: var(--muted); }
    .delete { border: none; background: none; font-size: 1.2rem; cursor: pointer; }

    form.inline { display: flex; gap: 8px; }
    input[type="text"], textarea, input[type="number"] {
      font: inherit;
      border: 1px solid #d9d4ee;
      border-radius: 10px;
      padding: 8px 10px;
    }
    input[type="text"] { flex: 1; }
    textarea { width: 100%; min-height: 120px; resize: vertical; }
    input[type="number"] { width: 70px; }

    button.primary {
      font: inherit;
      border: none;
      border-radius: 12px;
      background: var(--accent);
      color: #fff;
      padding: 10px 16px;
      cursor: pointer;
    }

    .big { font-size: 2.6rem; font-weight: 600; margin: 6px 0; }
    .progress { height: 10px; border-radius: 6px; background: #ece9f5; overflow: hidden; }
    .progress div { height: 100%; background: var(--accent); }

    .week-row { display: grid; grid-template-columns: 56px 1fr 1fr 64px; gap: 8px; align-items: center; margin: 6px 0; }
    .heat, .bar { height: 8px; border-radius: 5px; background: #ece9f5; overflow: hidden; }
    .heat div { height: 100%; background: var(--heat); }
    .bar div { height: 100%; background: var(--accent); }
    .count { text-align: right; font-size: 0.9rem; }

    .chat-log { max-height: 260px; overflow-y: auto; display: grid; gap: 8px; margin-bottom: 10px; }
    .chat-log .user { justify-self: end; background: var(--accent); color: #fff; }
    .chat-log div { padding: 8px 12px; border-radius: 12px; background: #f0edf9; max-width: 90%; }

    .status { min-height: 1.2em; font-size: 0.9rem; }
    .status.error { color: #c0392b; }
    .status.ok { color: #2e8b57; }
  </style>
</head>
<body>
  <div class="layout">
    <main>
      <h1>{{DATE_LABEL}}</h1>

      <section class="card">
        <h2>How do you feel?</h2>
        <div class="moods" id="moods">{{MOODS}}</div>
      </section>

      <section class="card">
        <h2>Tasks</h2>
        <form class="inline" id="task-form">
          <input type="text" id="task-text" placeholder="Add a task" autocomplete="off" />
          <button class="primary" type="submit">Add</button>
        </form>
        <ul id="task-list">{{TASKS}}</ul>
      </section>

      <section class="card">
        <h2>Journal</h2>
        <textarea id="note" maxlength="{{NOTE_MAX}}" placeholder="Write about your day">{{NOTE}}</textarea>
        <p class="muted"><span id="note-count">0</span> / {{NOTE_MAX}}</p>
        <button class="primary" id="save-day" type="button">Save Today</button>
        <p class="status" id="status"></p>
      </section>
    </main>

    <aside>
      <section class="card">
        <h2>Today summary</h2>
        <label class="muted">Daily goal <input type="number" min="1" id="goal" value="{{SAFE_GOAL}}" /></label>
        <p class="big" id="completed-today">{{COMPLETED_TODAY}}</p>
        <p class="muted">tasks completed of <span id="safe-goal">{{SAFE_GOAL}}</span> today</p>
        <div class="progress"><div id="rate-bar" style="width:{{RATE}}%"></div></div>
        <p class="muted">Completion rate: <span id="rate">{{RATE}}</span>%</p>
      </section>

      <section class="card">
        <h2>Weekly report</h2>
        <p class="muted">Total completed this week: <strong id="week-total">{{WEEK_TOTAL}}</strong> / <span id="week-goal">{{WEEK_GOAL}}</span></p>
        <div id="week">{{WEEK_ROWS}}</div>
      </section>

      <section class="card">
        <h2>Need to talk?</h2>
        <div class="chat-log" id="chat-log">
          <div>Hi, I'm your AI buddy. I can listen and give gentle suggestions, but I'm not a professional. What's on your mind?</div>
        </div>
        <form class="inline" id="chat-form">
          <input type="text" id="chat-text" placeholder="Type a message" autocomplete="off" />
          <button class="primary" type="submit">Send</button>
        </form>
      </section>
    </aside>
  </div>

  <script>
    const DATE_KEY = '{{DATE_KEY}}';
    const REFRESH_MS = 5000;
    const statusEl = document.getElementById('status');
    const taskList = document.getElementById('task-list');
    const noteEl = document.getElementById('note');
    const noteCount = document.getElementById('note-count');
    const goalEl = document.getElementById('goal');
    let tasks = [];
    let mood = document.querySelector('.mood.active')?.dataset.mood ?? null;
    let chat = [{ role: 'assistant', content: document.querySelector('#chat-log div').textContent }];

    const setStatus = (text, tone) => {
      statusEl.textContent = text;
      statusEl.className = `status ${tone || ''}`;
    };

    const api = async (path, options = {}) => {
      const res = await fetch(path, {
        headers: { 'content-type': 'application/json' },
        ...options,
      });
      if (!res.ok) {
        let message = 'Request failed';
        try { message = (await res.json()).error || message; } catch (_) {}
        throw new Error(message);
      }
      return res.status === 204 ? null : res.json();
    };

    const escapeHtml = (raw) => raw.replace(/[&<>"']/g, (ch) => ({
      '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'
    })[ch]);

    const renderTasks = () => {
      if (!tasks.length) {
        taskList.innerHTML = '<li class="empty">No tasks yet.</li>';
        return;
      }
      taskList.innerHTML = tasks.map((t) => `
        <li data-id="${t.id}"><label><input type="checkbox" class="toggle" ${t.done ? 'checked' : ''} />
        <span>${escapeHtml(t.text)}</span></label>
        <button type="button" class="delete" aria-label="Delete">×</button></li>`).join('');
    };

    const renderAnalytics = (snapshot) => {
      const { today, weeklySummary, totals } = snapshot;
      document.getElementById('completed-today').textContent = today.completedToday;
      document.getElementById('safe-goal').textContent = today.safeGoal;
      document.getElementById('rate').textContent = today.completionRateToday;
      document.getElementById('rate-bar').style.width = `${today.completionRateToday}%`;
      document.getElementById('week-total').textContent = totals.totalCompletedWeek;
      document.getElementById('week-goal').textContent = totals.weeklyGoal;
      document.getElementById('week').innerHTML = weeklySummary.map((day) => {
        const bar = Math.min(100, (day.completed / totals.maxForBars) * 100) || 0;
        return `<div class="week-row" data-date="${day.dateKey}"><span class="day">${escapeHtml(day.label)}</span>
          <div class="heat"><div style="width:${day.intensity}%"></div></div>
          <div class="bar"><div style="width:${bar}%"></div></div>
          <span class="count">${day.completed} done</span></div>`;
      }).join('');
    };

    const refresh = async () => {
      const [fresh, snapshot] = await Promise.all([api('/api/tasks'), api('/api/analytics')]);
      tasks = fresh;
      renderTasks();
      renderAnalytics(snapshot);
    };

    const refreshAnalytics = () => api('/api/analytics').then(renderAnalytics);

    document.getElementById('task-form').addEventListener('submit', async (event) => {
      event.preventDefault();
      const input = document.getElementById('task-text');
      const text = input.value.trim();
      if (!text) return;
      try {
        const task = await api('/api/tasks', {
          method: 'POST',
          body: JSON.stringify({ text, done: false, createdAt: new Date().toISOString(), source: 'web' }),
        });
        tasks = [task, ...tasks];
        input.value = '';
        renderTasks();
        refreshAnalytics();
      } catch (err) {
        setStatus(err.message, 'error');
      }
    });

    taskList.addEventListener('click', async (event) => {
      const item = event.target.closest('li[data-id]');
      if (!item) return;
      const id = Number(item.dataset.id);
      const previous = tasks;

      if (event.target.classList.contains('toggle')) {
        const current = tasks.find((t) => t.id === id);
        if (!current) return;
        const done = !current.done;
        tasks = tasks.map((t) => (t.id === id ? { ...t, done } : t));
        renderTasks();
        try {
          await api(`/api/tasks/${id}`, { method: 'PATCH', body: JSON.stringify({ done }) });
        } catch (err) {
          tasks = tasks.map((t) => (t.id === id ? { ...t, done: !done } : t));
          renderTasks();
          setStatus(err.message, 'error');
        }
        refreshAnalytics();
      } else if (event.target.classList.contains('delete')) {
        tasks = tasks.filter((t) => t.id !== id);
        renderTasks();
        try {
          await api(`/api/tasks/${id}`, { method: 'DELETE' });
        } catch (err) {
          tasks = previous;
          renderTasks();
          setStatus(err.message, 'error');
        }
        refreshAnalytics();
      }
    });

    document.getElementById('moods').addEventListener('click', (event) => {
      const button = event.target.closest('.mood');
      if (!button) return;
      mood = button.dataset.mood;
      document.querySelectorAll('.mood').forEach((b) => b.classList.toggle('active', b === button));
    });

    const updateNoteCount = () => { noteCount.textContent = [...noteEl.value].length; };
    noteEl.addEventListener('input', updateNoteCount);
    updateNoteCount();

    document.getElementById('save-day').addEventListener('click', async () => {
      try {
        await api('/api/journal', {
          method: 'POST',
          body: JSON.stringify({ dateKey: DATE_KEY, mood: mood ? Number(mood) : null, note: noteEl.value || null }),
        });
        setStatus('Day saved!', 'ok');
      } catch (err) {
        setStatus("Couldn't save your day. Please try again.", 'error');
      }
    });

    goalEl.addEventListener('change', async () => {
      const parsed = parseInt(goalEl.value, 10);
      const goal = Number.isNaN(parsed) ? 1 : Math.max(1, parsed);
      goalEl.value = goal;
      try {
        await api('/api/settings', { method: 'PUT', body: JSON.stringify({ daily_goal: goal }) });
        refreshAnalytics();
      } catch (err) {
        setStatus(err.message, 'error');
      }
    });

    const chatLog = document.getElementById('chat-log');
    const appendChat = (role, content) => {
      const line = document.createElement('div');
      line.className = role;
      line.textContent = content;
      chatLog.appendChild(line);
      chatLog.scrollTop = chatLog.scrollHeight;
    };

    document.getElementById('chat-form').addEventListener('submit', async (event) => {
      event.preventDefault();
      const input = document.getElementById('chat-text');
      const content = input.value.trim();
      if (!content) return;
      input.value = '';
      chat = [...chat, { role: 'user', content }];
      appendChat('user', content);
      try {
        const { reply } = await api('/api/chat', { method: 'POST', body: JSON.stringify({ messages: chat }) });
        chat = [...chat, { role: 'assistant', content: reply }];
        appendChat('assistant', reply);
      } catch (_) {
        appendChat('assistant', 'Sorry, I had trouble connecting right now. Please try again.');
      }
    });

    refresh().catch((err) => setStatus(err.message, 'error'));
    setInterval(() => refresh().catch(() => {}), REFRESH_MS);
  </script>
</body>
</html>
"#;
