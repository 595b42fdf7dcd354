use chrono::Local;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tauri::State;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Display window: the newest 100 retained lines plus the line being appended.
const CONSOLE_CAPACITY: usize = 101;

/// One console entry, timestamped at append time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub timestamp: String,
    pub text: String,
}

struct ConsoleInner {
    lines: Mutex<VecDeque<LogLine>>,
    tx: UnboundedSender<LogLine>,
    rx: Mutex<Option<UnboundedReceiver<LogLine>>>,
}

/// Append-only bounded console buffer shared across the process.
///
/// Orchestrator steps and helper-process output both land here; the sink
/// does not distinguish origin. A single live-feed consumer (the webview
/// forwarder) takes the channel receiver once at startup.
#[derive(Clone)]
pub struct ConsoleState {
    inner: Arc<ConsoleInner>,
}

impl ConsoleState {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            inner: Arc::new(ConsoleInner {
                lines: Mutex::new(VecDeque::new()),
                tx,
                rx: Mutex::new(Some(rx)),
            }),
        }
    }

    /// Takes the live-feed receiver. One consumer only; later calls get `None`.
    pub fn take_receiver(&self) -> Option<UnboundedReceiver<LogLine>> {
        self.inner.rx.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Appends a line, evicting the oldest entries beyond the display window.
    pub fn append(&self, text: impl Into<String>) -> LogLine {
        let line = LogLine {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            text: text.into(),
        };
        if let Ok(mut lines) = self.inner.lines.lock() {
            while lines.len() > CONSOLE_CAPACITY - 1 {
                lines.pop_front();
            }
            lines.push_back(line.clone());
        }
        // Live feed is best-effort; a gone consumer never fails an append.
        let _ = self.inner.tx.send(line.clone());
        line
    }

    /// Discards all entries. Cannot be undone.
    pub fn clear(&self) {
        if let Ok(mut lines) = self.inner.lines.lock() {
            lines.clear();
        }
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.inner
            .lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new()
    }
}

#[tauri::command]
pub fn get_console_output(state: State<ConsoleState>) -> Vec<LogLine> {
    state.snapshot()
}

#[tauri::command]
pub fn clear_console(state: State<ConsoleState>) {
    state.clear();
}
