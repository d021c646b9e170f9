//! Configuration resolution for the command line.

use std::path::{Path, PathBuf};

use anyhow::Context;

use sheet_sync::{SyncConfig, SyncTarget};

/// Environment variable naming a config file.
pub const ENV_CONFIG: &str = "SHEET_SYNC_CONFIG";

/// Config file picked up from the working directory.
const LOCAL_CONFIG: &str = "sheet-sync.json";

/// Resolve the config file path: explicit flag, then `SHEET_SYNC_CONFIG`,
/// then `./sheet-sync.json` when it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    local.exists().then_some(local)
}

/// Values given as global flags; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub endpoint: Option<String>,
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
}

impl FlagOverrides {
    pub fn apply(&self, mut config: SyncConfig) -> SyncConfig {
        if let Some(ref v) = self.endpoint {
            config.endpoint = Some(v.clone());
        }
        if let Some(ref v) = self.database_url {
            config.database_url = Some(v.clone());
        }
        if let Some(ref v) = self.auth_token {
            config.auth_token = Some(v.clone());
        }
        config
    }
}

/// Defaults, config file, environment, then flags.
pub fn resolve_config(explicit: Option<&Path>, flags: &FlagOverrides) -> anyhow::Result<SyncConfig> {
    let path = resolve_config_path(explicit);
    if let Some(ref p) = path {
        tracing::debug!("using config file {}", p.display());
    }
    let config = SyncConfig::load(path.as_deref()).context("failed to load configuration")?;
    Ok(flags.apply(config))
}

/// Build a sync target, filling sheet name and range from the config.
pub fn target_from(
    config: &SyncConfig,
    path: &str,
    sheet_id: &str,
    sheet_name: Option<&str>,
    range: Option<&str>,
) -> SyncTarget {
    SyncTarget::new(path, sheet_id)
        .with_sheet_name(sheet_name.unwrap_or(&config.sheet_name))
        .with_range(range.unwrap_or(&config.range))
}
