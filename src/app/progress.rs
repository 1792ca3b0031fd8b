//! Progress UI (spinner) for download runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bulkdl_core::DispatchProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    progress: Arc<DispatchProgress>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(progress, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    progress: Arc<DispatchProgress>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(progress_message(&progress));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(progress: &DispatchProgress) -> String {
    let total = progress.total();
    let mut message = format!(
        "[{}/{}] Downloading, {} in flight",
        progress.settled().min(total),
        total,
        progress.in_flight()
    );
    let failed = progress.failed();
    if failed > 0 {
        message.push_str(&format!(", {failed} failed"));
    }
    let retried = progress.retried();
    if retried > 0 {
        message.push_str(&format!(", {retried} retries"));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_progress_ui_when_disabled_returns_none_handle_and_stop_already_true() {
        let (handle, stop) = spawn_progress_ui(false, Arc::new(DispatchProgress::default()));

        assert!(handle.is_none());
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn spawn_progress_ui_when_enabled_stops_on_signal() {
        let (handle, stop) = spawn_progress_ui(true, Arc::new(DispatchProgress::default()));
        assert!(!stop.load(Ordering::SeqCst));

        stop.store(true, Ordering::SeqCst);
        handle.unwrap().await.unwrap();
    }

    #[test]
    fn progress_message_for_idle_run() {
        let message = progress_message(&DispatchProgress::default());
        assert_eq!(message, "[0/0] Downloading, 0 in flight");
    }
}
