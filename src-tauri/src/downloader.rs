use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tauri::{AppHandle, Emitter, Manager, State};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::batch::{ItemRequest, WorkshopFetcher};
use crate::console::ConsoleState;

const HELPER_BINARY: &str = "DepotDownloaderMod.exe";

const DOTNET_DOWNLOAD_URL: &str =
    "https://dotnet.microsoft.com/en-us/download/dotnet/thank-you/runtime-9.0.0-windows-x64-installer";

/// Live helper-process log line, mirrored to the webview.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadLogPayload {
    line: String,
}

/// Cached result of the .NET runtime probe. Probed once at startup,
/// consulted before every batch, re-probed on demand.
pub struct RuntimeState {
    available: Mutex<Option<bool>>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self {
            available: Mutex::new(None),
        }
    }

    pub fn cached(&self) -> Option<bool> {
        self.available.lock().ok().and_then(|guard| *guard)
    }

    pub fn store(&self, available: bool) {
        if let Ok(mut guard) = self.available.lock() {
            *guard = Some(available);
        }
    }

    /// Returns the cached probe result, probing once if nothing is cached.
    /// A probe failure reads as "unavailable" rather than an error.
    pub async fn ensure_checked(&self) -> bool {
        if let Some(available) = self.cached() {
            return available;
        }
        let available = probe_dotnet_runtime().await.unwrap_or(false);
        self.store(available);
        available
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks for a .NET 9 runtime via `dotnet --list-runtimes`.
pub async fn probe_dotnet_runtime() -> Result<bool, String> {
    let output = Command::new("dotnet")
        .arg("--list-runtimes")
        .output()
        .await
        .map_err(|e| format!("Failed to check .NET: {}", e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.contains("Microsoft.NETCore.App 9."))
}

/// Resolves the bundled helper executable under the resource directory.
pub fn resolve_helper_path(app_handle: &AppHandle) -> Result<PathBuf, String> {
    let resource_dir = app_handle
        .path()
        .resource_dir()
        .map_err(|e| format!("Failed to resolve resource dir: {}", e))?;
    let exe_path = resource_dir.join("assets").join(HELPER_BINARY);

    if !exe_path.exists() {
        return Err(format!(
            "{} not found at: {}",
            HELPER_BINARY,
            exe_path.display()
        ));
    }

    Ok(exe_path)
}

/// Kills stray helper processes, invoked on window close.
#[cfg(target_os = "windows")]
pub async fn cleanup_helper_processes() -> Result<(), String> {
    Command::new("taskkill")
        .args(["/F", "/IM", HELPER_BINARY])
        .output()
        .await
        .ok(); // Ignore errors if no process found
    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub async fn cleanup_helper_processes() -> Result<(), String> {
    Ok(())
}

/// Streams one helper output stream into the console sink and to the
/// webview. Lines arrive in the sink in event-arrival order, same as
/// orchestrator-originated lines.
fn spawn_log_reader<R>(app: AppHandle, console: ConsoleState, stream: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tauri::async_runtime::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            console.append(line.as_str());
            let _ = app.emit("download-log", DownloadLogPayload { line });
        }
    });
}

/// [`WorkshopFetcher`] backed by the real helper process. Each item gets
/// its own subfolder under the destination path.
pub struct ProcessFetcher {
    app: AppHandle,
    console: ConsoleState,
}

impl ProcessFetcher {
    pub fn new(app: AppHandle, console: ConsoleState) -> Self {
        Self { app, console }
    }
}

impl WorkshopFetcher for ProcessFetcher {
    fn fetch(&self, item: &ItemRequest) -> impl Future<Output = Result<(), String>> + Send {
        let app = self.app.clone();
        let console = self.console.clone();
        let item = item.clone();

        async move {
            let download_dir = Path::new(&item.download_path);
            if !download_dir.exists() {
                return Err(format!(
                    "Download path does not exist: {}",
                    item.download_path
                ));
            }

            let exe_path = resolve_helper_path(&app)?;
            let output_dir = download_dir.join(&item.item_id);

            let mut command = Command::new(&exe_path);
            command.args([
                "-app",
                &item.app_id,
                "-pubfile",
                &item.item_id,
                "-verify-all",
                "-username",
                &item.username,
                "-password",
                &item.password,
            ]);
            command.arg("-dir");
            command.arg(&output_dir);
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());

            // Hide console window on Windows
            #[cfg(windows)]
            command.creation_flags(0x08000000); // CREATE_NO_WINDOW

            let mut child = command
                .spawn()
                .map_err(|e| format!("Failed to spawn {}: {}", HELPER_BINARY, e))?;

            if let Some(stdout) = child.stdout.take() {
                spawn_log_reader(app.clone(), console.clone(), stdout);
            }
            if let Some(stderr) = child.stderr.take() {
                spawn_log_reader(app.clone(), console.clone(), stderr);
            }

            let status = child
                .wait()
                .await
                .map_err(|e| format!("Process error: {}", e))?;

            if status.success() {
                Ok(())
            } else {
                Err(format!(
                    "Download failed with exit code: {:?}",
                    status.code()
                ))
            }
        }
    }
}

#[tauri::command]
pub async fn check_dotnet_runtime(state: State<'_, RuntimeState>) -> Result<bool, String> {
    let available = probe_dotnet_runtime().await?;
    state.store(available);
    Ok(available)
}

#[tauri::command]
pub fn get_dotnet_download_url() -> String {
    DOTNET_DOWNLOAD_URL.to_string()
}
