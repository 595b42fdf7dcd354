use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tauri::State;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub const DEFAULT_TOAST_DURATION_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

/// Transient user-facing alert. Removed from the active set when its
/// duration elapses or it is dismissed, whichever comes first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub title: String,
    pub message: Option<String>,
    pub duration_ms: u64,
}

struct ToastHubInner {
    next_id: AtomicU64,
    active: Mutex<Vec<Toast>>,
    tx: UnboundedSender<Toast>,
    rx: Mutex<Option<UnboundedReceiver<Toast>>>,
}

/// Publish side of the notification channel.
///
/// Ids come from a monotonic counter, so no two toasts share an id within
/// the process lifetime. Publishing is fire-and-forget: a gone consumer
/// never affects the caller.
#[derive(Clone)]
pub struct ToastHub {
    inner: Arc<ToastHubInner>,
}

impl ToastHub {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            inner: Arc::new(ToastHubInner {
                next_id: AtomicU64::new(0),
                active: Mutex::new(Vec::new()),
                tx,
                rx: Mutex::new(Some(rx)),
            }),
        }
    }

    /// Takes the consumer end. One consumer only; later calls get `None`.
    pub fn take_receiver(&self) -> Option<UnboundedReceiver<Toast>> {
        self.inner.rx.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn publish(
        &self,
        kind: ToastKind,
        title: impl Into<String>,
        message: Option<String>,
        duration_ms: Option<u64>,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let toast = Toast {
            id,
            kind,
            title: title.into(),
            message,
            duration_ms: duration_ms.unwrap_or(DEFAULT_TOAST_DURATION_MS),
        };
        if let Ok(mut active) = self.inner.active.lock() {
            active.push(toast.clone());
        }
        let _ = self.inner.tx.send(toast);
        id
    }

    /// Removes a toast from the active set. Idempotent; expiry and manual
    /// dismissal both go through here, and only the first call removes.
    pub fn dismiss(&self, id: u64) -> bool {
        if let Ok(mut active) = self.inner.active.lock() {
            let before = active.len();
            active.retain(|toast| toast.id != id);
            return active.len() != before;
        }
        false
    }

    /// Currently active toasts, publish order.
    pub fn active(&self) -> Vec<Toast> {
        self.inner
            .active
            .lock()
            .map(|active| active.clone())
            .unwrap_or_default()
    }

    pub fn notify_download_complete(&self, item_id: &str) -> u64 {
        self.publish(
            ToastKind::Success,
            "Download Complete",
            Some(format!("Successfully downloaded: {item_id}")),
            None,
        )
    }

    pub fn notify_download_error(&self, item_id: &str, error: &str) -> u64 {
        self.publish(
            ToastKind::Error,
            "Download Failed",
            Some(format!("{item_id}: {error}")),
            None,
        )
    }

    pub fn notify_retrying(&self, item_id: &str, attempt: u32, max_attempts: u32) -> u64 {
        self.publish(
            ToastKind::Info,
            "Retrying Download",
            Some(format!("{item_id}: Attempt {attempt}/{max_attempts}")),
            None,
        )
    }
}

impl Default for ToastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[tauri::command]
pub fn dismiss_toast(state: State<ToastHub>, id: u64) -> bool {
    state.dismiss(id)
}
