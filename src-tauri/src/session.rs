use serde::Serialize;
use std::sync::Mutex;
use tauri::State;

use crate::accounts::AccountsState;
use crate::settings::AppSettings;

/// Sentinel shown until the user picks a destination directory.
pub const PATH_NOT_SET: &str = "Not set";

struct SessionInner {
    selected_account: Option<String>,
    download_path: String,
}

/// Process-wide interactive session state: the selected account and the
/// destination path. Initialized at startup, torn down with the process.
pub struct SessionState {
    inner: Mutex<SessionInner>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub selected_account: Option<String>,
    pub download_path: String,
}

impl SessionState {
    pub fn new(default_account: Option<String>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                selected_account: default_account,
                download_path: PATH_NOT_SET.to_string(),
            }),
        }
    }

    pub fn selected_account_id(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|guard| guard.selected_account.clone())
    }

    pub fn set_selected_account(&self, id: &str) -> Result<(), String> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| format!("Failed to lock session state: {}", e))?;
        guard.selected_account = Some(id.to_string());
        Ok(())
    }

    pub fn download_path(&self) -> String {
        self.inner
            .lock()
            .map(|guard| guard.download_path.clone())
            .unwrap_or_else(|_| PATH_NOT_SET.to_string())
    }

    pub fn set_download_path(&self, path: &str) -> Result<(), String> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| format!("Failed to lock session state: {}", e))?;
        guard.download_path = path.to_string();
        Ok(())
    }

    /// Seeds the session from persisted settings at startup. Unknown default
    /// accounts and empty paths leave the current values alone.
    pub fn apply_settings(
        &self,
        settings: &AppSettings,
        accounts: &AccountsState,
    ) -> Result<(), String> {
        if !settings.download_path.is_empty() {
            self.set_download_path(&settings.download_path)?;
        }
        if let Some(id) = settings.default_account.as_deref() {
            if accounts.find(id).is_some() {
                self.set_selected_account(id)?;
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            selected_account: self.selected_account_id(),
            download_path: self.download_path(),
        }
    }
}

#[tauri::command]
pub fn get_session(state: State<SessionState>) -> SessionSnapshot {
    state.snapshot()
}

#[tauri::command]
pub fn set_selected_account(
    state: State<SessionState>,
    accounts: State<AccountsState>,
    account_id: String,
) -> Result<(), String> {
    if accounts.find(&account_id).is_none() {
        return Err(format!("Unknown account: {account_id}"));
    }
    state.set_selected_account(&account_id)
}

#[tauri::command]
pub fn set_download_path(state: State<SessionState>, path: String) -> Result<(), String> {
    state.set_download_path(&path)
}
