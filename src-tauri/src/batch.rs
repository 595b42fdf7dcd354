use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tauri::{AppHandle, State};
use tokio::time::sleep;

use crate::accounts::{Account, AccountsState};
use crate::console::ConsoleState;
use crate::downloader::{ProcessFetcher, RuntimeState};
use crate::session::{SessionState, PATH_NOT_SET};
use crate::toast::{ToastHub, ToastKind};
use crate::workshop::match_line_id;

/// Fixed per-item attempt ceiling.
pub const MAX_RETRIES: u32 = 3;

/// One unit of external work: a single workshop item transfer.
#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub item_id: String,
    pub username: String,
    pub password: String,
    pub download_path: String,
    pub app_id: String,
}

/// Seam to the external download helper. Production uses
/// [`ProcessFetcher`]; tests script outcomes.
pub trait WorkshopFetcher {
    /// Runs one download to completion. Errors carry a human-readable message.
    fn fetch(&self, item: &ItemRequest) -> impl Future<Output = Result<(), String>> + Send;
}

/// Everything one batch needs, resolved before the orchestrator starts.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub links: String,
    pub account: Option<Account>,
    pub app_id: String,
    pub game_name: String,
    pub download_path: String,
    pub runtime_available: bool,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success_count: u32,
    pub fail_count: u32,
}

/// Runs a batch of workshop downloads, strictly sequentially.
///
/// Preconditions (runtime, path, input, account) short-circuit before any
/// fetch with an error log line and toast. After that every failure is
/// caught locally: unparseable lines are skipped with a warning, failed
/// items retry up to [`MAX_RETRIES`] times with 2^attempt seconds of
/// backoff between attempts, and exhaustion is logged and counted without
/// aborting the remaining lines. The caller only ever sees the summary.
pub async fn run_batch<F: WorkshopFetcher>(
    fetcher: &F,
    console: &ConsoleState,
    toasts: &ToastHub,
    req: &BatchRequest,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    if !req.runtime_available {
        console.append("Error: .NET 9.0 Runtime is not installed");
        console.append("Download .NET 9.0: https://dotnet.microsoft.com/download/dotnet/9.0");
        toasts.publish(
            ToastKind::Error,
            ".NET Required",
            Some("Please install .NET 9.0 Runtime first".to_string()),
            None,
        );
        return summary;
    }

    if req.download_path == PATH_NOT_SET {
        console.append("Error: Save location is not set");
        toasts.publish(
            ToastKind::Error,
            "Error",
            Some("Please set download location first".to_string()),
            None,
        );
        return summary;
    }

    if req.links.trim().is_empty() {
        console.append("Error: Enter workshop links or IDs");
        toasts.publish(
            ToastKind::Error,
            "Error",
            Some("Enter workshop links or IDs".to_string()),
            None,
        );
        return summary;
    }

    let Some(account) = req.account.as_ref() else {
        console.append("Error: No account selected");
        toasts.publish(
            ToastKind::Error,
            "Error",
            Some("No account selected".to_string()),
            None,
        );
        return summary;
    };

    let lines: Vec<&str> = req.links.lines().filter(|l| !l.trim().is_empty()).collect();

    for line in &lines {
        let Some(id) = match_line_id(line) else {
            console.append(format!("Invalid link: {line}"));
            continue;
        };

        console.append(format!("---------- Downloading {id} ----------"));
        console.append(format!("Game: {} (App ID {})", req.game_name, req.app_id));

        let item = ItemRequest {
            item_id: id.to_string(),
            username: account.username.clone(),
            password: account.password.clone(),
            download_path: req.download_path.clone(),
            app_id: req.app_id.clone(),
        };

        let mut last_error = String::new();
        let mut succeeded = false;

        for attempt in 1..=MAX_RETRIES {
            if attempt > 1 {
                console.append(format!("Retry attempt {attempt}/{MAX_RETRIES}..."));
            }

            match fetcher.fetch(&item).await {
                Ok(()) => {
                    console.append(format!("Download completed: {id}"));
                    summary.success_count += 1;
                    toasts.notify_download_complete(id);
                    succeeded = true;
                    break;
                }
                Err(err) => {
                    last_error = err;
                    console.append(format!("Attempt {attempt} failed: {last_error}"));

                    if attempt < MAX_RETRIES {
                        let wait = Duration::from_secs(1 << attempt);
                        console.append(format!("Waiting {}s before retry...", wait.as_secs()));
                        sleep(wait).await;
                    }
                }
            }
        }

        if !succeeded {
            console.append(format!(
                "Download failed after {MAX_RETRIES} attempts: {last_error}"
            ));
            summary.fail_count += 1;
            toasts.notify_download_error(id, &last_error);
        }

        console.append("---------- Download finished ----------");
    }

    if lines.len() > 1 {
        if summary.fail_count == 0 {
            toasts.publish(
                ToastKind::Success,
                "All Downloads Complete",
                Some(format!(
                    "{} items downloaded successfully",
                    summary.success_count
                )),
                None,
            );
        } else {
            toasts.publish(
                ToastKind::Warning,
                "Downloads Complete",
                Some(format!(
                    "{} succeeded, {} failed",
                    summary.success_count, summary.fail_count
                )),
                None,
            );
        }
    }

    summary
}

/// Resolves session, account and runtime state, then drives the
/// orchestrator with the real helper-process fetcher.
#[tauri::command]
pub async fn start_batch(
    app: AppHandle,
    console: State<'_, ConsoleState>,
    toasts: State<'_, ToastHub>,
    session: State<'_, SessionState>,
    accounts: State<'_, AccountsState>,
    runtime: State<'_, RuntimeState>,
    links: String,
    app_id: String,
    game_name: String,
) -> Result<BatchSummary, String> {
    let req = BatchRequest {
        links,
        account: session
            .selected_account_id()
            .and_then(|id| accounts.find(&id)),
        app_id,
        game_name,
        download_path: session.download_path(),
        runtime_available: runtime.ensure_checked().await,
    };

    let fetcher = ProcessFetcher::new(app, console.inner().clone());
    Ok(run_batch(&fetcher, &console, &toasts, &req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails each item a scripted number of times, then succeeds.
    struct ScriptedFetcher {
        failures_left: Mutex<HashMap<String, u32>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(failures: &[(&str, u32)]) -> Self {
            Self {
                failures_left: Mutex::new(
                    failures
                        .iter()
                        .map(|(id, n)| (id.to_string(), *n))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl WorkshopFetcher for ScriptedFetcher {
        fn fetch(&self, item: &ItemRequest) -> impl Future<Output = Result<(), String>> + Send {
            self.calls.lock().unwrap().push(item.item_id.clone());
            let result = {
                let mut failures = self.failures_left.lock().unwrap();
                match failures.get_mut(&item.item_id) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        Err(format!("network error for {}", item.item_id))
                    }
                    _ => Ok(()),
                }
            };
            async move { result }
        }
    }

    fn request(links: &str) -> BatchRequest {
        BatchRequest {
            links: links.to_string(),
            account: Some(Account {
                id: "1".to_string(),
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
            app_id: "431960".to_string(),
            game_name: "Wallpaper Engine".to_string(),
            download_path: "/downloads".to_string(),
            runtime_available: true,
        }
    }

    fn log_texts(console: &ConsoleState) -> Vec<String> {
        console.snapshot().into_iter().map(|l| l.text).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_not_set_stops_before_any_fetch() {
        let fetcher = ScriptedFetcher::new(&[]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();
        let req = BatchRequest {
            download_path: PATH_NOT_SET.to_string(),
            ..request("12345678")
        };

        let summary = run_batch(&fetcher, &console, &toasts, &req).await;

        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.fail_count, 0);
        assert!(fetcher.calls().is_empty());
        assert_eq!(log_texts(&console), vec!["Error: Save location is not set"]);
        assert_eq!(toasts.active().len(), 1);
        assert_eq!(toasts.active()[0].kind, ToastKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_missing_logs_guidance() {
        let fetcher = ScriptedFetcher::new(&[]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();
        let req = BatchRequest {
            runtime_available: false,
            ..request("12345678")
        };

        run_batch(&fetcher, &console, &toasts, &req).await;

        assert!(fetcher.calls().is_empty());
        let logs = log_texts(&console);
        assert_eq!(logs.len(), 2);
        assert!(logs[0].contains(".NET 9.0 Runtime is not installed"));
        assert!(logs[1].contains("https://dotnet.microsoft.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_and_missing_account_stop_early() {
        let fetcher = ScriptedFetcher::new(&[]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        run_batch(&fetcher, &console, &toasts, &request("  \n \n")).await;
        assert_eq!(log_texts(&console), vec!["Error: Enter workshop links or IDs"]);

        let req = BatchRequest {
            account: None,
            ..request("12345678")
        };
        run_batch(&fetcher, &console, &toasts, &req).await;
        assert!(fetcher.calls().is_empty());
        assert_eq!(
            log_texts(&console).last().map(String::as_str),
            Some("Error: No account selected")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success_with_backoff() {
        let fetcher = ScriptedFetcher::new(&[("12345678", 2)]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        let started = Instant::now();
        let summary = run_batch(&fetcher, &console, &toasts, &request("12345678")).await;

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 0);
        assert_eq!(fetcher.calls().len(), 3);
        // Backoff after attempt 1 is 2s, after attempt 2 is 4s.
        assert_eq!(started.elapsed(), Duration::from_secs(6));

        let logs = log_texts(&console);
        assert!(logs.iter().any(|l| l == "Waiting 2s before retry..."));
        assert!(logs.iter().any(|l| l == "Waiting 4s before retry..."));
        assert!(logs.iter().any(|l| l == "Download completed: 12345678"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_count_as_failure() {
        let fetcher = ScriptedFetcher::new(&[("12345678", 3)]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        let summary = run_batch(&fetcher, &console, &toasts, &request("12345678")).await;

        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(fetcher.calls().len(), 3);

        let logs = log_texts(&console);
        let attempt_warnings = logs.iter().filter(|l| l.contains("failed:")).count();
        let terminal_failures = logs.iter().filter(|l| l.contains("failed after")).count();
        assert_eq!(attempt_warnings, 3);
        assert_eq!(terminal_failures, 1);

        // Single-line batch: only the per-item error toast, no aggregate.
        let active = toasts.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Download Failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_line_skipped_batch_continues() {
        let fetcher = ScriptedFetcher::new(&[]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        let summary = run_batch(
            &fetcher,
            &console,
            &toasts,
            &request("11111111\nnot a workshop link\n22222222"),
        )
        .await;

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.fail_count, 0);
        assert_eq!(fetcher.calls(), vec!["11111111", "22222222"]);

        let logs = log_texts(&console);
        let warnings = logs.iter().filter(|l| l.starts_with("Invalid link:")).count();
        assert_eq!(warnings, 1);

        // Aggregate toast reflects the two processed outcomes.
        let aggregate = toasts
            .active()
            .into_iter()
            .find(|t| t.title == "All Downloads Complete")
            .expect("aggregate toast present");
        assert_eq!(
            aggregate.message.as_deref(),
            Some("2 items downloaded successfully")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_never_aborts_the_batch() {
        let fetcher = ScriptedFetcher::new(&[("11111111", 3)]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        let summary = run_batch(&fetcher, &console, &toasts, &request("11111111\n22222222")).await;

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 1);
        // 3 exhausted attempts on the first item, then one for the second.
        assert_eq!(
            fetcher.calls(),
            vec!["11111111", "11111111", "11111111", "22222222"]
        );

        let aggregate = toasts
            .active()
            .into_iter()
            .find(|t| t.title == "Downloads Complete")
            .expect("mixed-result aggregate toast present");
        assert_eq!(aggregate.kind, ToastKind::Warning);
        assert_eq!(aggregate.message.as_deref(), Some("1 succeeded, 1 failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_line_batch_has_no_aggregate_toast() {
        let fetcher = ScriptedFetcher::new(&[]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        run_batch(&fetcher, &console, &toasts, &request("12345678")).await;

        let active = toasts.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Download Complete");
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_processed_in_input_order() {
        let fetcher = ScriptedFetcher::new(&[]);
        let console = ConsoleState::new();
        let toasts = ToastHub::new();

        run_batch(
            &fetcher,
            &console,
            &toasts,
            &request("33333333\n11111111\n22222222"),
        )
        .await;

        assert_eq!(fetcher.calls(), vec!["33333333", "11111111", "22222222"]);
    }
}
