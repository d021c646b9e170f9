//! Configuration: defaults, an optional JSON file, then `SHEET_SYNC_*`
//! environment variables. Command line flags are applied last by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::jobs::OverlapPolicy;
use crate::types::{SyncError, SyncResult, DEFAULT_RANGE, DEFAULT_SHEET_NAME};

pub const ENV_ENDPOINT: &str = "SHEET_SYNC_ENDPOINT";
pub const ENV_DATABASE_URL: &str = "SHEET_SYNC_DATABASE_URL";
pub const ENV_AUTH_TOKEN: &str = "SHEET_SYNC_AUTH_TOKEN";
pub const ENV_SHEET_NAME: &str = "SHEET_SYNC_SHEET_NAME";
pub const ENV_RANGE: &str = "SHEET_SYNC_RANGE";
pub const ENV_INTERVAL_MINUTES: &str = "SHEET_SYNC_INTERVAL_MINUTES";
pub const ENV_OVERLAP: &str = "SHEET_SYNC_OVERLAP";

const DEFAULT_INTERVAL_MINUTES: u64 = 60;

/// Settings shared by every sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// URL of the spreadsheet-writing endpoint.
    pub endpoint: Option<String>,
    /// Realtime database root URL.
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
    pub sheet_name: String,
    pub range: String,
    pub interval_minutes: u64,
    pub overlap: OverlapPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            database_url: None,
            auth_token: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            range: DEFAULT_RANGE.to_string(),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            overlap: OverlapPolicy::Skip,
        }
    }
}

impl SyncConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| SyncError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Defaults, then `file` when given, then the process environment.
    pub fn load(file: Option<&Path>) -> SyncResult<Self> {
        let config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env()
    }

    /// Apply `SHEET_SYNC_*` overrides from the process environment.
    pub fn with_env(self) -> SyncResult<Self> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`. Empty values are ignored.
    pub fn with_env_from<F>(mut self, lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = read(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = read(ENV_DATABASE_URL) {
            self.database_url = Some(v);
        }
        if let Some(v) = read(ENV_AUTH_TOKEN) {
            self.auth_token = Some(v);
        }
        if let Some(v) = read(ENV_SHEET_NAME) {
            self.sheet_name = v;
        }
        if let Some(v) = read(ENV_RANGE) {
            self.range = v;
        }
        if let Some(v) = read(ENV_INTERVAL_MINUTES) {
            self.interval_minutes = v.parse().map_err(|_| {
                SyncError::Config(format!("{ENV_INTERVAL_MINUTES} must be a whole number, got '{v}'"))
            })?;
        }
        if let Some(v) = read(ENV_OVERLAP) {
            self.overlap = v.parse()?;
        }
        Ok(self)
    }

    /// The endpoint URL, or a `Config` error naming how to set it.
    pub fn require_endpoint(&self) -> SyncResult<&str> {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                SyncError::Config(format!("no endpoint configured (use --endpoint or {ENV_ENDPOINT})"))
            })
    }
}
