//! Authorized callsign list: a plain text file plus `AUTHORIZED_CALLSIGNS`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::schema::BridgeConfig;

/// Used when the config does not name a file.
pub const DEFAULT_CALLSIGNS_FILE: &str = "callsigns.txt";

/// Parse one callsign per line. Blank lines and `#` comments are skipped.
pub fn parse_callsigns(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().to_uppercase())
        .filter(|call| !call.is_empty() && !call.starts_with('#'))
        .collect()
}

/// Comma-separated callsigns, as in the `AUTHORIZED_CALLSIGNS` variable.
pub fn parse_callsign_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|call| call.trim().to_uppercase())
        .filter(|call| !call.is_empty())
        .collect()
}

pub fn load_callsigns(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let calls = parse_callsigns(&text);
    info!(path = %path.display(), count = calls.len(), "loaded authorized callsigns");
    Ok(calls)
}

/// File to read: the configured one, else `callsigns.txt` next to the
/// config file or in the working directory, if it exists.
pub fn callsigns_path(config: &BridgeConfig, config_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = &config.callsigns_file {
        return Some(match config_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.clone(),
        });
    }
    config_dir
        .map(|dir| dir.join(DEFAULT_CALLSIGNS_FILE))
        .into_iter()
        .chain(std::iter::once(PathBuf::from(DEFAULT_CALLSIGNS_FILE)))
        .find(|p| p.is_file())
}

/// Add `calls` to `authorized_callsigns` of every `aprs` channel, keeping
/// existing entries and skipping duplicates.
pub fn merge_authorized(config: &mut BridgeConfig, calls: &[String]) {
    if calls.is_empty() {
        return;
    }
    for (name, channel) in config.channels.iter_mut().filter(|(_, c)| c.kind == "aprs") {
        let mut merged: Vec<String> = channel
            .settings
            .get("authorized_callsigns")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_uppercase())
                    .collect()
            })
            .unwrap_or_default();
        for call in calls {
            if !merged.contains(call) {
                merged.push(call.clone());
            }
        }
        debug!(channel = %name, count = merged.len(), "authorized callsigns");
        channel.set("authorized_callsigns", merged);
    }
}
