use std::fmt::Display;

use serde::Serialize;

/// A named volume advertised by the cluster's volume manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Export(String);

impl Export {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq<str> for Export {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Parse `gluster volume info` output into export names.
///
/// Only `Volume Name:` lines matter (matched case-insensitively after
/// trimming); the name is the second `:`-separated field, with surrounding
/// spaces removed. Order follows the tool's output and duplicates are kept.
pub fn parse_volume_info(output: &str) -> Vec<Export> {
    let mut exports = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if !line.to_lowercase().starts_with("volume name:") {
            continue;
        }
        if let Some(name) = line.split(':').nth(1) {
            exports.push(Export(name.trim().to_string()));
        }
    }

    exports
}
