mod accounts;
mod batch;
mod console;
mod downloader;
mod session;
mod settings;
mod steam_api;
mod toast;
mod workshop;

use std::time::Duration;

use accounts::{get_accounts, AccountsState};
use batch::start_batch;
use console::{clear_console, get_console_output, ConsoleState};
use downloader::{
    check_dotnet_runtime, cleanup_helper_processes, get_dotnet_download_url, RuntimeState,
};
use session::{get_session, set_download_path, set_selected_account, SessionState};
use settings::{get_config_path, load_settings, save_settings, select_folder};
use steam_api::{get_workshop_details, open_workshop_page, search_steam_games};
use tauri::{AppHandle, Emitter, Manager};
use toast::{dismiss_toast, ToastHub};

/// Forwards console sink lines to the webview as `console-line` events.
/// The sink's single live-feed consumer.
fn spawn_console_forwarder(app: &AppHandle) {
    let Some(mut rx) = app.state::<ConsoleState>().take_receiver() else {
        return;
    };
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        while let Some(line) = rx.recv().await {
            let _ = app.emit("console-line", line);
        }
    });
}

/// Forwards published toasts to the webview and schedules their expiry.
/// Expiry goes through the hub's idempotent dismiss, so a toast the user
/// already closed is not removed twice.
fn spawn_toast_forwarder(app: &AppHandle) {
    let hub = app.state::<ToastHub>().inner().clone();
    let Some(mut rx) = hub.take_receiver() else {
        return;
    };
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        while let Some(toast) = rx.recv().await {
            let _ = app.emit("toast", toast.clone());

            let hub = hub.clone();
            let app = app.clone();
            tauri::async_runtime::spawn(async move {
                tokio::time::sleep(Duration::from_millis(toast.duration_ms)).await;
                if hub.dismiss(toast.id) {
                    let _ = app.emit("toast-expired", toast.id);
                }
            });
        }
    });
}

/// Seeds session state from persisted settings. A missing or unreadable
/// settings file leaves the defaults in place.
fn apply_persisted_settings(app: &AppHandle) {
    let applied = settings::load_settings_for(app).and_then(|persisted| {
        let session = app.state::<SessionState>();
        let accounts = app.state::<AccountsState>();
        session.apply_settings(&persisted, &accounts)
    });
    if let Err(err) = applied {
        eprintln!("Failed to apply settings at startup: {err}");
    }
}

/// Runs the .NET capability probe once in the background and announces
/// the result to the webview.
fn spawn_runtime_probe(app: &AppHandle) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        let available = app.state::<RuntimeState>().ensure_checked().await;
        let _ = app.emit("runtime-checked", available);
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let accounts = AccountsState::builtin();
    let session = SessionState::new(accounts.first_id());

    tauri::Builder::default()
        .manage(accounts)
        .manage(session)
        .manage(ConsoleState::new())
        .manage(ToastHub::new())
        .manage(RuntimeState::new())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_shell::init())
        .setup(|app| {
            let handle = app.handle();
            spawn_console_forwarder(handle);
            spawn_toast_forwarder(handle);
            apply_persisted_settings(handle);
            spawn_runtime_probe(handle);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // System commands
            check_dotnet_runtime,
            get_dotnet_download_url,
            select_folder,
            load_settings,
            save_settings,
            get_config_path,
            // Session / accounts
            get_accounts,
            get_session,
            set_selected_account,
            set_download_path,
            // Console
            get_console_output,
            clear_console,
            // Notifications
            dismiss_toast,
            // Steam API
            get_workshop_details,
            search_steam_games,
            open_workshop_page,
            // Downloads
            start_batch
        ])
        .on_window_event(|_window, event| {
            if let tauri::WindowEvent::CloseRequested { .. } = event {
                // Cleanup helper processes on exit
                tauri::async_runtime::spawn(async {
                    let _ = cleanup_helper_processes().await;
                });
            }
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
