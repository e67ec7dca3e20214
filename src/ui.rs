use crate::models::{DayRecord, TimerStatus, TimerView};

pub fn render_index(date: &str, record: &DayRecord, timer: &TimerView) -> String {
    let status = match timer.status {
        TimerStatus::Idle => "idle",
        TimerStatus::Running => "running",
        TimerStatus::Paused => "paused",
    };
    INDEX_HTML
        .replace("{{DATE}}", &escape(date))
        .replace("{{TAG}}", &escape(&timer.tag))
        .replace("{{STATUS}}", status)
        .replace("{{ELAPSED}}", &format_hms(timer.elapsed))
        .replace("{{FOCUS}}", &format!("{:.1}", record.focus_secs() as f64 / 60.0))
}

/// `HH:MM:SS`; hours keep counting past 99.
pub fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Daily Anchor</title>
  <style>
    :root {
      --bg-1: #f8f3e6;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(560px, 100%);
      background: var(--card);
      border-radius: 28px;
      padding: 32px;
      display: grid;
      gap: 24px;
    }

    .timer {
      font-size: 3rem;
      font-family: monospace;
      text-align: center;
      color: var(--accent-2);
    }

    .timer[data-status="running"] {
      color: var(--accent);
    }

    .row {
      display: flex;
      flex-wrap: wrap;
      gap: 10px;
      justify-content: center;
    }

    button {
      border: 0;
      border-radius: 14px;
      padding: 10px 16px;
      font: inherit;
      cursor: pointer;
      background: var(--accent-2);
      color: white;
    }

    .habit {
      display: flex;
      justify-content: space-between;
      align-items: center;
      background: white;
      border-radius: 16px;
      padding: 12px 16px;
    }

    #status {
      min-height: 1.2em;
      text-align: center;
      color: #8b857d;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Daily Anchor</h1>
      <p><span id="date">{{DATE}}</span> &middot; Shanghai &middot; <span id="focus">{{FOCUS}}</span> focus min</p>
    </header>

    <section>
      <div id="timer" class="timer" data-status="{{STATUS}}">{{ELAPSED}}</div>
      <div class="row"><span id="tag">{{TAG}}</span></div>
      <div class="row">
        <button data-timer="start">Start</button>
        <button data-timer="pause">Pause</button>
        <button data-timer="stop">Stop</button>
      </div>
      <div id="tags" class="row"></div>
    </section>

    <section id="habits"></section>
    <p id="status"></p>
  </main>

  <script>
    const timerEl = document.getElementById('timer');
    const tagEl = document.getElementById('tag');
    const statusEl = document.getElementById('status');
    const focusEl = document.getElementById('focus');
    const habitsEl = document.getElementById('habits');
    const tagsEl = document.getElementById('tags');

    let timer = { status: timerEl.dataset.status, elapsed: 0, tag: tagEl.textContent };
    let localTicker = null;

    const setStatus = (message) => {
      statusEl.textContent = message;
      setTimeout(() => { statusEl.textContent = ''; }, 2500);
    };

    const hms = (secs) => [Math.floor(secs / 3600), Math.floor((secs % 3600) / 60), secs % 60]
      .map((part) => String(part).padStart(2, '0'))
      .join(':');

    const renderTimer = (view) => {
      timer = view;
      timerEl.textContent = hms(view.elapsed);
      timerEl.dataset.status = view.status;
      tagEl.textContent = view.tag;
      clearInterval(localTicker);
      localTicker = null;
      if (view.status === 'running') {
        localTicker = setInterval(() => {
          timer.elapsed += 1;
          timerEl.textContent = hms(timer.elapsed);
        }, 1000);
      }
    };

    const call = async (method, url, body) => {
      const response = await fetch(url, {
        method,
        headers: body ? { 'Content-Type': 'application/json' } : {},
        body: body ? JSON.stringify(body) : undefined,
      });
      if (!response.ok) {
        throw new Error(await response.text());
      }
      return response.json();
    };

    const refresh = async () => {
      const today = await call('GET', '/api/today');
      renderTimer(today.timer);
      const focus = today.record.timeLogs.reduce((sum, log) => sum + log.duration, 0) / 60;
      focusEl.textContent = focus.toFixed(1);
      habitsEl.innerHTML = '';
      today.settings.habits.forEach((habit) => {
        const row = document.createElement('div');
        row.className = 'habit';
        row.innerHTML = `<span></span><button>+1</button>`;
        row.querySelector('span').textContent = `${habit.label} ${today.record[habit.id] || 0}/${habit.max}`;
        row.querySelector('button').onclick = async () => {
          const result = await call('POST', `/api/habits/${encodeURIComponent(habit.id)}`, { delta: 1 });
          if (!result.applied) setStatus('Already at the daily maximum');
          refresh();
        };
        habitsEl.appendChild(row);
      });
      tagsEl.innerHTML = '';
      today.settings.tags.forEach((tag) => {
        const button = document.createElement('button');
        button.textContent = tag.name;
        button.onclick = () => call('POST', '/api/timer/tag', { name: tag.name })
          .then(renderTimer)
          .catch((err) => setStatus(err.message));
        tagsEl.appendChild(button);
      });
    };

    document.querySelectorAll('[data-timer]').forEach((button) => {
      button.onclick = async () => {
        try {
          const result = await call('POST', `/api/timer/${button.dataset.timer}`);
          if (button.dataset.timer === 'stop') {
            setStatus(result.session ? 'Session saved' : 'Too short to keep');
            refresh();
          } else {
            renderTimer(result);
          }
        } catch (err) {
          setStatus(err.message);
        }
      };
    });

    document.addEventListener('visibilitychange', () => {
      if (document.visibilityState === 'visible') {
        call('POST', '/api/timer/reconcile').then(renderTimer).catch(() => {});
      }
    });

    refresh().catch((err) => setStatus(err.message));
  </script>
</body>
</html>
"#;
