//! Bridge configuration: file discovery, `${VAR}` substitution, flat
//! environment overrides, authorized callsigns, and validation.
//!
//! Config files: `rarsms.toml`, `rarsms.yaml`, `rarsms.yml` or `rarsms.json`,
//! searched in `./` then `~/.config/rarsms/`.

pub mod callsigns;
pub mod env_overrides;
pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    env_overrides::apply_env_overrides,
    loader::{LoadedConfig, config_dir, find_config_file, load, load_config},
    schema::{BridgeConfig, BridgeSettings, ChannelConfig, MetricsSettings, RouteConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
