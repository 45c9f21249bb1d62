//! Configuration parsing for `tcs`.
//!
//! Settings are read from a TOML file (default `./config/tcs.toml`). Every
//! section and key has a default, so a missing file only matters once a
//! command needs API credentials. Credentials and the instance name can be
//! supplied through the environment instead of the file:
//!
//! | Setting | Variables (first set wins) |
//! |---------|----------------------------|
//! | `api.access_id` | `TC_ACCESS_ID`, `tc_accessid` |
//! | `api.secret_key` | `TC_SECRET_KEY`, `tc_secretkey` |
//! | `api.instance` | `TC_INSTANCE`, `tc_company` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use tc_search_core::models::{Scope, SearchRequest};
use tc_search_core::view::SortKey;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub access_id: String,
    #[serde(default)]
    pub secret_key: String,
    /// Instance (company) name used to derive the base URL.
    #[serde(default)]
    pub instance: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Full API base URL; overrides the instance-derived one.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            access_id: String::new(),
            secret_key: String::new(),
            instance: String::new(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_api_version() -> String {
    "v3".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_sort")]
    pub default_sort: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            date_format: default_date_format(),
            default_sort: default_sort(),
        }
    }
}

fn default_page_size() -> usize {
    100
}
fn default_date_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}
fn default_sort() -> String {
    "none".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DefaultsConfig {
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_true")]
    pub auto_detect: bool,
    #[serde(default)]
    pub owner: String,
    #[serde(default = "default_true")]
    pub include_tags: bool,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            auto_detect: true,
            owner: String::new(),
            include_tags: true,
            history_size: default_history_size(),
        }
    }
}

fn default_scope() -> String {
    "indicators".to_string()
}
fn default_true() -> bool {
    true
}
fn default_history_size() -> usize {
    50
}

impl Config {
    /// Scope used when the command line does not name one.
    pub fn scope(&self) -> Result<Scope> {
        self.defaults
            .scope
            .parse::<Scope>()
            .map_err(|e| anyhow::anyhow!("defaults.scope: {}", e))
    }

    pub fn sort_key(&self) -> Result<SortKey> {
        self.ui
            .default_sort
            .parse::<SortKey>()
            .map_err(|e| anyhow::anyhow!("ui.default_sort: {}", e))
    }

    /// Owner restriction from `defaults.owner`, if set.
    pub fn owner(&self) -> Option<&str> {
        let owner = self.defaults.owner.trim();
        if owner.is_empty() {
            None
        } else {
            Some(owner)
        }
    }

    /// API base URL, e.g. `https://acme.threatconnect.com/api/v3`.
    pub fn base_url(&self) -> Result<String> {
        if let Some(url) = self.api.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.trim_end_matches('/').to_string());
        }
        if self.api.instance.trim().is_empty() {
            bail!("api.instance is not set (set it in the config file or via TC_INSTANCE)");
        }
        Ok(format!(
            "https://{}.threatconnect.com/api/{}",
            self.api.instance.trim(),
            self.api.api_version
        ))
    }

    /// Check that API credentials are present. Called only when a backend
    /// client is built, so offline commands work without them.
    pub fn require_credentials(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.api.access_id.trim().is_empty() {
            missing.push("TC_ACCESS_ID");
        }
        if self.api.secret_key.trim().is_empty() {
            missing.push("TC_SECRET_KEY");
        }
        if self.api.instance.trim().is_empty() && self.api.base_url.is_none() {
            missing.push("TC_INSTANCE");
        }
        if !missing.is_empty() {
            bail!(
                "missing API credentials: set {} or configure [api] in the config file",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// A request carrying the configured defaults.
    pub fn base_request(&self, query: &str, scope: Scope) -> SearchRequest {
        let mut req = SearchRequest::new(query, scope)
            .with_page(0, self.ui.page_size)
            .with_auto_detect(self.defaults.auto_detect);
        req.include_tags = self.defaults.include_tags;
        req
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|n| lookup(*n))
                .find(|v| !v.trim().is_empty())
        };
        if let Some(v) = first(&["TC_ACCESS_ID", "tc_accessid"]) {
            self.api.access_id = v;
        }
        if let Some(v) = first(&["TC_SECRET_KEY", "tc_secretkey"]) {
            self.api.secret_key = v;
        }
        if let Some(v) = first(&["TC_INSTANCE", "tc_company"]) {
            self.api.instance = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.ui.page_size < 1 {
            bail!("ui.page_size must be >= 1");
        }
        if self.defaults.history_size < 1 {
            bail!("defaults.history_size must be >= 1");
        }
        match self.api.api_version.as_str() {
            "v2" | "v3" => {}
            other => bail!("Unknown api.api_version: '{}'. Must be v2 or v3.", other),
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be > 0");
        }
        self.scope()?;
        self.sort_key()?;
        Ok(())
    }
}

/// Parse configuration text, apply environment overrides, and validate.
pub fn parse_config(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env(env);
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        String::new()
    };
    parse_config(&content, |name| std::env::var(name).ok())
}

/// Commented default configuration written by `tcs init`.
pub const DEFAULT_CONFIG: &str = r#"# tcs configuration

[api]
# Credentials may also come from TC_ACCESS_ID / TC_SECRET_KEY / TC_INSTANCE.
access_id = ""
secret_key = ""
# https://<instance>.threatconnect.com/api/<api_version>
instance = ""
api_version = "v3"
timeout_secs = 30
# base_url = "http://127.0.0.1:8080/api/v3"

[ui]
page_size = 100
date_format = "%Y-%m-%d %H:%M"
# none | date | rating | confidence
default_sort = "none"

[defaults]
# indicators | groups | both
scope = "indicators"
auto_detect = true
owner = ""
include_tags = true
history_size = 50
"#;

/// Write [`DEFAULT_CONFIG`] to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
