use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

const PROC_MOUNTS: &str = "/proc/mounts";

/// Answers "is this path currently a mount point". Kept behind a trait so
/// the wait loop can be driven by a stub table in tests.
#[async_trait::async_trait]
pub trait MountTable: Send + Sync {
    async fn is_mounted(&self, path: &Path) -> bool;
}

/// Mount table backed by `/proc/mounts`.
#[derive(Debug, Clone, Default)]
pub struct ProcMounts;

#[async_trait::async_trait]
impl MountTable for ProcMounts {
    async fn is_mounted(&self, path: &Path) -> bool {
        let content = match fs::read_to_string(PROC_MOUNTS).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "failed reading {PROC_MOUNTS}");
                return false;
            }
        };

        table_contains(&content, path)
    }
}

fn table_contains(content: &str, path: &Path) -> bool {
    content.lines().any(|line| {
        line.split_whitespace()
            .nth(1)
            .is_some_and(|target| PathBuf::from(unescape(target)) == path)
    })
}

/// Mount targets in `/proc/mounts` escape whitespace and friends as `\040`
/// style octal triples.
fn unescape(target: &str) -> String {
    let mut out = String::with_capacity(target.len());
    let mut chars = target.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let octal: String = chars.by_ref().take(3).collect();
        match u8::from_str_radix(&octal, 8) {
            Ok(byte) => out.push(byte as char),
            Err(_) => {
                out.push('\\');
                out.push_str(&octal);
            }
        }
    }

    out
}
