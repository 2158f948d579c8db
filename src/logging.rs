use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs::DirEntry;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_BASENAME: &str = "sync-tray.log";
const LOG_DIR_ENV: &str = "SYNC_TRAY_LOG_PATH";
const LOG_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Install the global subscriber: daily-rolling file log plus stderr.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn init_logging() -> Result<WorkerGuard> {
    let log_dir = resolve_log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let pruned = prune_old_logs(&log_dir, LOG_RETENTION);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    debug!("Logging to {:?}, pruned {} expired log file(s)", log_dir, pruned);
    Ok(guard)
}

/// `SYNC_TRAY_LOG_PATH`, else a `logs` dir under the platform state/data dir
fn resolve_log_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let dirs = ProjectDirs::from("io", "sync-tray", "agent")
        .context("Failed to determine project directories for log path")?;
    // Only Linux has a state dir
    let base = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(base.join("logs"))
}

/// Delete rotated agent logs not written to within `max_age`.
///
/// Returns how many files were removed. Unreadable entries are left alone.
fn prune_old_logs(log_dir: &Path, max_age: Duration) -> usize {
    let (Some(cutoff), Ok(entries)) = (
        SystemTime::now().checked_sub(max_age),
        std::fs::read_dir(log_dir),
    ) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| is_agent_log(&entry.file_name().to_string_lossy()))
        .filter(|entry| last_written(entry).is_some_and(|written| written < cutoff))
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}

/// The active log and its dated rotations
fn is_agent_log(file_name: &str) -> bool {
    file_name.starts_with(LOG_FILE_BASENAME)
}

fn last_written(entry: &DirEntry) -> Option<SystemTime> {
    let metadata = entry.metadata().ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok()
}
