//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_ROUTING__ENDPOINT` sets `routing.endpoint`). Typed accessors cover the
//! `routing`, `data` and `search` sections.

use chrono::{DateTime, Utc};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> { Self::load_from(Path::new(".")) }

    /// Load `config.toml` + `config.<env>.toml` from `base_dir`, then `APP_*` env vars.
    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }

    pub fn routing(&self) -> anyhow::Result<RoutingSettings> {
        let settings: RoutingSettings = self.get("routing")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn data(&self) -> anyhow::Result<DataSettings> { self.get("data") }

    /// The `search` section is optional.
    pub fn search(&self) -> SearchSettings { self.get("search").unwrap_or_default() }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        // Production must be able to reach the travel-time service.
        let required = matches!(env, "prod" | "production");
        if required || self.figment.find_value("routing").is_ok() {
            self.routing()?;
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 { 30 }
fn default_batch_size() -> usize { 10 }
fn default_max_concurrent() -> usize { 3 }

/// `[routing]`: travel-time service endpoint and batching knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSettings {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// RFC 3339; absent means "now" at the start of each run.
    #[serde(default)]
    pub departure_time: Option<String>,
}

impl RoutingSettings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("routing.endpoint must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("routing.batch_size must be at least 1".into()));
        }
        if self.max_concurrent == 0 {
            return Err(Error::InvalidConfig("routing.max_concurrent must be at least 1".into()));
        }
        self.departure()?;
        Ok(())
    }

    pub fn departure(&self) -> crate::error::Result<Option<DateTime<Utc>>> {
        match &self.departure_time {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| Error::InvalidConfig(format!("routing.departure_time '{}': {}", raw, e))),
        }
    }
}

/// `[data]`: dataset locations, relative to the config directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    pub communes_path: String,
    #[serde(default)]
    pub safety_path: Option<String>,
}

impl DataSettings {
    pub fn communes_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.communes_path) }

    pub fn safety_path(&self, base: &Path) -> Option<PathBuf> {
        self.safety_path.as_ref().map(|p| resolve_with_base(base, p))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
