use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tauri::{AppHandle, Manager, State};
use tauri_plugin_dialog::{DialogExt, FilePath};
use tokio::sync::oneshot;

use crate::console::ConsoleState;
use crate::session::SessionState;

const SETTINGS_FILE_NAME: &str = "settings.json";

/// Application settings, persisted as pretty JSON in the app config
/// directory and written through on every change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub download_path: String,
    pub max_concurrent_downloads: u32,
    pub auto_retry: bool,
    pub retry_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_account: Option<String>,
    pub theme: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            download_path: String::new(),
            max_concurrent_downloads: 3,
            auto_retry: true,
            retry_attempts: 3,
            default_account: None,
            theme: "dark".to_string(),
        }
    }
}

fn settings_file_path(app_handle: &AppHandle) -> Result<PathBuf, String> {
    app_handle
        .path()
        .resolve(SETTINGS_FILE_NAME, tauri::path::BaseDirectory::AppConfig)
        .map_err(|e| format!("Failed to resolve settings path: {}", e))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            format!(
                "Failed to create settings directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    Ok(())
}

/// Reads settings from `path`. A missing file yields the defaults.
pub fn load_settings_from(path: &Path) -> Result<AppSettings, String> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings from {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    std::fs::write(path, json)
        .map_err(|e| format!("Failed to write settings to {}: {}", path.display(), e))
}

pub fn load_settings_for(app_handle: &AppHandle) -> Result<AppSettings, String> {
    load_settings_from(&settings_file_path(app_handle)?)
}

pub fn save_settings_for(app_handle: &AppHandle, settings: &AppSettings) -> Result<(), String> {
    save_settings_to(&settings_file_path(app_handle)?, settings)
}

#[tauri::command]
pub fn load_settings(app_handle: AppHandle) -> Result<AppSettings, String> {
    load_settings_for(&app_handle)
}

#[tauri::command]
pub fn save_settings(app_handle: AppHandle, settings: AppSettings) -> Result<(), String> {
    save_settings_for(&app_handle, &settings)
}

#[tauri::command]
pub fn get_config_path(app_handle: AppHandle) -> Result<String, String> {
    let path = settings_file_path(&app_handle)?;
    let dir = path.parent().unwrap_or(&path);
    Ok(dir.to_string_lossy().to_string())
}

/// Bridges the dialog's completion callback to an awaitable receiver. The
/// command suspends on the receiver instead of parking its thread, which
/// keeps the main thread free to actually show the picker.
fn folder_pick_channel() -> (
    impl FnOnce(Option<FilePath>) + Send + 'static,
    oneshot::Receiver<Option<String>>,
) {
    let (tx, rx) = oneshot::channel();
    let callback = move |folder_path: Option<FilePath>| {
        let _ = tx.send(folder_path.map(|p| p.to_string()));
    };
    (callback, rx)
}

/// Opens the directory picker. `None` means the user cancelled, not an
/// error. A picked folder updates the session path and is persisted
/// immediately.
#[tauri::command]
pub async fn select_folder(
    app_handle: AppHandle,
    session: State<'_, SessionState>,
    console: State<'_, ConsoleState>,
) -> Result<Option<String>, String> {
    let (callback, rx) = folder_pick_channel();
    app_handle.dialog().file().pick_folder(callback);

    let picked = rx.await.map_err(|e| format!("Dialog error: {}", e))?;

    if let Some(path) = picked.as_deref() {
        session.set_download_path(path)?;
        console.append(format!("Path set to {path}"));

        let mut settings = load_settings_for(&app_handle).unwrap_or_default();
        settings.download_path = path.to_string();
        save_settings_for(&app_handle, &settings)?;
    }

    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.download_path, "");
        assert_eq!(settings.max_concurrent_downloads, 3);
        assert!(settings.auto_retry);
        assert_eq!(settings.retry_attempts, 3);
        assert!(settings.default_account.is_none());
        assert_eq!(settings.theme, "dark");
    }

    #[test]
    fn test_persisted_layout_is_snake_case() {
        let settings = AppSettings {
            default_account: Some("1".to_string()),
            ..AppSettings::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&settings).expect("serializes"))
                .expect("round-trips as json");
        let object = value.as_object().expect("settings serialize to an object");

        for key in [
            "download_path",
            "max_concurrent_downloads",
            "auto_retry",
            "retry_attempts",
            "default_account",
            "theme",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn test_missing_default_account_tolerated() {
        let parsed: AppSettings = serde_json::from_str(
            r#"{
                "download_path": "D:\\wallpapers",
                "max_concurrent_downloads": 1,
                "auto_retry": false,
                "retry_attempts": 5,
                "theme": "light"
            }"#,
        )
        .expect("settings without default_account parse");
        assert_eq!(parsed.download_path, "D:\\wallpapers");
        assert!(parsed.default_account.is_none());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let loaded = load_settings_from(&dir.path().join("settings.json")).expect("load succeeds");
        assert_eq!(loaded.theme, "dark");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.json");

        let settings = AppSettings {
            download_path: "/data/workshop".to_string(),
            max_concurrent_downloads: 2,
            auto_retry: false,
            retry_attempts: 1,
            default_account: Some("4".to_string()),
            theme: "light".to_string(),
        };
        save_settings_to(&path, &settings).expect("save succeeds");

        let loaded = load_settings_from(&path).expect("load succeeds");
        assert_eq!(loaded.download_path, "/data/workshop");
        assert_eq!(loaded.max_concurrent_downloads, 2);
        assert!(!loaded.auto_retry);
        assert_eq!(loaded.retry_attempts, 1);
        assert_eq!(loaded.default_account.as_deref(), Some("4"));
        assert_eq!(loaded.theme, "light");
    }

    #[tokio::test]
    async fn test_folder_pick_resolves_without_blocking() {
        let (callback, rx) = folder_pick_channel();

        // The dialog plugin invokes the callback from another context; the
        // command side must be able to await the result concurrently.
        tokio::spawn(async move {
            callback(Some(FilePath::Path(std::path::PathBuf::from(
                "/data/workshop",
            ))));
        });

        let picked = rx.await.expect("callback delivers a result");
        assert_eq!(picked.as_deref(), Some("/data/workshop"));
    }

    #[tokio::test]
    async fn test_folder_pick_cancel_yields_none() {
        let (callback, rx) = folder_pick_channel();
        callback(None);
        assert_eq!(rx.await.expect("callback delivers a result"), None);
    }

    #[tokio::test]
    async fn test_folder_pick_dropped_callback_is_an_error() {
        let (callback, rx) = folder_pick_channel();
        drop(callback);
        assert!(rx.await.is_err());
    }
}
