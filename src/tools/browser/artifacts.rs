//! Where screenshots are written and how they are addressed

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Location of one screenshot on disk and on the web
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub path: PathBuf,
    pub public_path: String,
}

/// Names screenshot files inside the publicly served directory.
///
/// Names combine a millisecond timestamp with a process-wide sequence
/// number, so two captures in the same millisecond still differ.
#[derive(Debug)]
pub struct ScreenshotStore {
    dir: PathBuf,
    url_prefix: String,
    sequence: AtomicU64,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a fresh file name
    pub fn next(&self) -> Screenshot {
        self.next_at(Utc::now())
    }

    fn next_at(&self, now: DateTime<Utc>) -> Screenshot {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let filename = format!(
            "screenshot-{}-{seq}.png",
            now.format("%Y-%m-%dT%H-%M-%S-%3fZ")
        );
        Screenshot {
            path: self.dir.join(&filename),
            public_path: format!("{}/{filename}", self.url_prefix.trim_end_matches('/')),
        }
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }
}
