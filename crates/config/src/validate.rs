//! Configuration validation.
//!
//! Checks a raw config file for syntax errors, unknown or misspelled keys and
//! type errors, then checks the parsed config for routes naming channels
//! that do not exist and similar wiring mistakes.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    env_subst::substitute_env,
    loader::parse_config,
    schema::{BridgeConfig, KNOWN_CHANNEL_TYPES},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "channel",
    /// "route", "bridge", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "routes.radio_to_chat.target_protocols"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Expected shape of the configuration.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// A map with dynamic keys whose values have a known shape.
    Map(Box<KnownKeys>),
    /// Scalar or free-form value: stop recursion.
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Map, Struct};

    let bridge = Struct(HashMap::from([
        ("max_history", Leaf),
        ("queue_capacity", Leaf),
        ("dispatch_workers", Leaf),
        ("connect_timeout_secs", Leaf),
        ("status_interval_secs", Leaf),
    ]));

    let route = Struct(HashMap::from([
        ("source_protocols", Leaf),
        ("target_protocols", Leaf),
        ("message_types", Leaf),
        ("source_filter", Leaf),
        ("bidirectional", Leaf),
        ("enabled", Leaf),
    ]));

    let metrics = Struct(HashMap::from([("enabled", Leaf), ("labels", Leaf)]));

    Struct(HashMap::from([
        ("bridge", bridge),
        // Channel entries are driver-specific; see `driver_keys`.
        ("channels", Map(Box::new(Leaf))),
        ("routes", Map(Box::new(route))),
        ("callsigns_file", Leaf),
        ("metrics", metrics),
    ]))
}

/// Keys each driver understands, including accepted aliases.
fn driver_keys(kind: &str) -> Option<&'static [&'static str]> {
    const COMMON: [&str; 2] = ["type", "enabled"];
    const APRS: &[&str] = &[
        COMMON[0],
        COMMON[1],
        "server",
        "aprs_server",
        "port",
        "aprs_port",
        "callsign",
        "aprs_callsign",
        "passcode",
        "aprs_passcode",
        "filter_lat",
        "filter_lon",
        "filter_distance",
        "authorized_callsigns",
        "message_prefix",
        "require_prefix",
        "dedup_timeout_secs",
        "deduplication_timeout",
        "connect_timeout_secs",
        "login_timeout_secs",
        "keepalive_secs",
    ];
    const DISCORD: &[&str] = &[
        COMMON[0],
        COMMON[1],
        "webhook_url",
        "discord_webhook_url",
        "bot_token",
        "discord_bot_token",
        "channel_id",
        "discord_channel_id",
        "username",
        "discord_username",
        "timeout_secs",
        "discord_timeout",
        "poll_interval_secs",
        "discord_poll_interval",
        "api_base",
        "reply_target",
        "max_tracked",
    ];
    const POCKETBASE: &[&str] = &[
        COMMON[0],
        COMMON[1],
        "url",
        "pocketbase_url",
        "collection",
        "collection_name",
        "timeout_secs",
        "auth_token",
    ];
    match kind {
        "aprs" => Some(APRS),
        "discord" => Some(DISCORD),
        "pocketbase" => Some(POCKETBASE),
        _ => None,
    }
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

fn did_you_mean(base: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("{base} (did you mean \"{s}\"?)"),
        None => base.to_string(),
    }
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Validate a config file on disk. `${VAR}` placeholders are resolved first.
#[must_use]
pub fn validate_file(path: &Path) -> ValidationResult {
    let mut result = match std::fs::read_to_string(path) {
        Ok(raw) => validate_str(&substitute_env(&raw), path),
        Err(e) => {
            let mut result = ValidationResult::default();
            result.push(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            );
            result
        },
    };
    result.config_path = Some(path.to_path_buf());
    result
}

/// Validate raw config text. `path` only selects the format by extension.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut result = ValidationResult::default();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    // 1. Syntax
    let tree = match parse_tree(raw, ext) {
        Ok(tree) => tree,
        Err(message) => {
            result.push(Severity::Error, "syntax", "", message);
            return result;
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&tree, &build_schema_map(), "", &mut result);
    check_driver_keys(&tree, &mut result);

    // 3. Types, then wiring
    match parse_config(raw, path) {
        Ok(config) => result.diagnostics.extend(validate(&config).diagnostics),
        Err(e) => result.push(Severity::Error, "type-error", "", format!("type error: {e}")),
    }
    result
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate(config: &BridgeConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_bridge(config, &mut result);
    check_channels(config, &mut result);
    check_routes(config, &mut result);
    result
}

fn parse_tree(raw: &str, ext: &str) -> Result<serde_json::Value, String> {
    match ext {
        "toml" => toml::from_str::<toml::Value>(raw)
            .map_err(|e| format!("TOML syntax error: {e}"))
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str::<serde_json::Value>(raw)
            .map(|v| if v.is_null() { serde_json::json!({}) } else { v })
            .map_err(|e| format!("YAML syntax error: {e}")),
        "json" => serde_json::from_str(raw).map_err(|e| format!("JSON syntax error: {e}")),
        other => Err(format!("unsupported config format: .{other}")),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    result: &mut ValidationResult,
) {
    let Some(table) = value.as_object() else {
        return;
    };
    match schema {
        KnownKeys::Struct(fields) => {
            let known: Vec<&str> = fields.keys().copied().collect();
            for (key, child) in table {
                let path = join(prefix, key);
                match fields.get(key.as_str()) {
                    Some(child_schema) => check_unknown_fields(child, child_schema, &path, result),
                    None => {
                        let base = if prefix.is_empty() {
                            "unknown field at top level"
                        } else {
                            "unknown field"
                        };
                        let message = did_you_mean(base, suggest(key, &known, 3));
                        result.push(Severity::Error, "unknown-field", path, message);
                    },
                }
            }
        },
        KnownKeys::Map(value_schema) => {
            for (key, child) in table {
                check_unknown_fields(child, value_schema, &join(prefix, key), result);
            }
        },
        KnownKeys::Leaf => {},
    }
}

/// Unknown keys inside a channel are ignored by the driver, so they are
/// warnings rather than errors.
fn check_driver_keys(tree: &serde_json::Value, result: &mut ValidationResult) {
    let Some(channels) = tree.get("channels").and_then(|c| c.as_object()) else {
        return;
    };
    for (name, entry) in channels {
        let Some(keys) = entry
            .get("type")
            .and_then(|t| t.as_str())
            .and_then(driver_keys)
        else {
            continue;
        };
        let Some(fields) = entry.as_object() else {
            continue;
        };
        for key in fields.keys().filter(|k| !keys.contains(&k.as_str())) {
            let message = did_you_mean("unknown channel setting", suggest(key, keys, 3));
            result.push(
                Severity::Warning,
                "unknown-field",
                format!("channels.{name}.{key}"),
                message,
            );
        }
    }
}

fn check_bridge(config: &BridgeConfig, result: &mut ValidationResult) {
    let bridge = &config.bridge;
    for (key, value) in [
        ("queue_capacity", bridge.queue_capacity),
        ("dispatch_workers", bridge.dispatch_workers),
    ] {
        if value == 0 {
            result.push(
                Severity::Warning,
                "bridge",
                format!("bridge.{key}"),
                "0 is treated as 1",
            );
        }
    }
    if bridge.max_history == 0 {
        result.push(
            Severity::Info,
            "bridge",
            "bridge.max_history",
            "message history is disabled",
        );
    }
}

fn check_channels(config: &BridgeConfig, result: &mut ValidationResult) {
    if config.channels.is_empty() {
        result.push(
            Severity::Warning,
            "channel",
            "channels",
            "no channels configured; set APRS_CALLSIGN/APRS_PASSCODE or DISCORD_WEBHOOK_URL, or add [channels.*] entries",
        );
        return;
    }
    for (name, channel) in &config.channels {
        if !KNOWN_CHANNEL_TYPES.contains(&channel.kind.as_str()) {
            let message = did_you_mean(
                &format!("unknown channel type \"{}\"", channel.kind),
                suggest(&channel.kind, KNOWN_CHANNEL_TYPES, 3),
            );
            result.push(Severity::Error, "channel", format!("channels.{name}.type"), message);
        }
    }
}

fn check_routes(config: &BridgeConfig, result: &mut ValidationResult) {
    let channel_names: Vec<&str> = config.channels.keys().map(String::as_str).collect();

    for (name, route) in config.routes.iter().filter(|(_, r)| r.enabled) {
        for (side, list) in [
            ("source_protocols", &route.source_protocols),
            ("target_protocols", &route.target_protocols),
        ] {
            let path = format!("routes.{name}.{side}");
            if list.is_empty() {
                result.push(Severity::Error, "route", &path, "must name at least one channel");
                continue;
            }
            for channel in list {
                match config.channels.get(channel) {
                    None => {
                        let message = did_you_mean(
                            &format!("unknown channel \"{channel}\""),
                            suggest(channel, &channel_names, 3),
                        );
                        result.push(Severity::Error, "route", &path, message);
                    },
                    Some(c) if !c.enabled => result.push(
                        Severity::Warning,
                        "route",
                        &path,
                        format!("channel \"{channel}\" is disabled"),
                    ),
                    Some(_) => {},
                }
            }
        }

        if let Some(pattern) = &route.source_filter
            && let Err(e) = regex::Regex::new(pattern)
        {
            result.push(
                Severity::Error,
                "route",
                format!("routes.{name}.source_filter"),
                format!("invalid regex: {e}"),
            );
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
