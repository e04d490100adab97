use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    callsigns::{callsigns_path, load_callsigns, merge_authorized, parse_callsign_list},
    env_overrides::apply_env_overrides,
    env_subst::substitute_env_with,
    schema::BridgeConfig,
};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &["rarsms.toml", "rarsms.yaml", "rarsms.yml", "rarsms.json"];

/// A fully resolved configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BridgeConfig,
    /// `None` when running on defaults and environment only.
    pub path: Option<PathBuf>,
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    load_config_with(path, &|name| std::env::var(name).ok())
}

fn load_config_with(
    path: &Path,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> anyhow::Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env_with(&raw, lookup);
    parse_config(&raw, path)
}

/// Resolve the effective configuration.
///
/// 1. `explicit`, which must exist, else the first file found by
///    [`find_config_file`], else defaults.
/// 2. `${VAR}` placeholders replaced before parsing.
/// 3. Flat environment variables applied on top.
/// 4. Authorized callsigns from the callsigns file and
///    `AUTHORIZED_CALLSIGNS` merged into every `aprs` channel.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    load_with(explicit, &|name| std::env::var(name).ok())
}

pub fn load_with(
    explicit: Option<&Path>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> anyhow::Result<LoadedConfig> {
    let path = match explicit {
        Some(p) if !p.is_file() => anyhow::bail!("config file not found: {}", p.display()),
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let mut config = match &path {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            load_config_with(p, lookup)?
        },
        None => {
            debug!("no config file found, using defaults and environment");
            BridgeConfig::default()
        },
    };

    apply_env_overrides(&mut config, lookup);

    let config_dir = path.as_deref().and_then(Path::parent).filter(|d| !d.as_os_str().is_empty());
    let mut calls = Vec::new();
    if let Some(file) = callsigns_path(&config, config_dir) {
        match load_callsigns(&file) {
            Ok(found) => calls.extend(found),
            Err(e) => warn!(path = %file.display(), error = %e, "cannot read callsigns file"),
        }
    }
    if let Some(list) = lookup("AUTHORIZED_CALLSIGNS") {
        calls.extend(parse_callsign_list(&list));
    }
    merge_authorized(&mut config, &calls);

    Ok(LoadedConfig { config, path })
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./rarsms.{toml,yaml,yml,json}`
/// 2. `~/.config/rarsms/rarsms.{toml,yaml,yml,json}`
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/rarsms/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "rarsms").map(|d| d.config_dir().to_path_buf())
}

/// Format is chosen by extension; files without one are read as TOML.
pub fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BridgeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
