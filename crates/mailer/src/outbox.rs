//! Staged notification discovery
//!
//! Every file below the outbox whose name contains `@` is a staged
//! notification addressed to that name. Everything else (the run log,
//! editor backups) is ignored.

use anyhow::{Context, Result};
use outage_common::StagedMessage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A staged notification read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub recipient: String,
    pub path: PathBuf,
    pub message: StagedMessage,
}

/// Read every staged notification below `outbox`, ordered by path
pub async fn read_outbox(outbox: &Path) -> Result<Vec<OutboxEntry>> {
    if !tokio::fs::metadata(outbox)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        anyhow::bail!("Outbox folder is not a valid path: {}", outbox.display());
    }

    let mut paths = Vec::new();
    let mut pending = vec![outbox.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to read {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && is_staged(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut staged = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let message = StagedMessage::parse(&contents)
            .with_context(|| format!("Malformed staged message {}", path.display()))?;
        let recipient = file_name(&path).unwrap_or_default().to_string();

        debug!("Staged message for {}: {}", recipient, message.subject);
        staged.push(OutboxEntry {
            recipient,
            path,
            message,
        });
    }

    Ok(staged)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn is_staged(path: &Path) -> bool {
    file_name(path).is_some_and(|name| name.contains('@'))
}
