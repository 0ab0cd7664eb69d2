//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults;
//! 2. a TOML file (`--config`, or `config.toml` in the platform config
//!    directory if it exists);
//! 3. `MIRROR_*` environment variables (`MIRROR_SITE`, `MIRROR_OUTPUT`, ...);
//! 4. command-line overrides.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const ENV_PREFIX: &str = "MIRROR_";
const CONFIG_FILE: &str = "config.toml";
/// Name of the history database when it lives inside the output directory.
pub const DATABASE_FILE: &str = ".mirror.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the remote site, e.g. `https://school.instructure.com`.
    pub site: Option<Url>,
    /// Browser-exported `cookies.txt` used to authenticate.
    pub cookies: PathBuf,
    /// Directory the mirror is written to.
    pub output: PathBuf,
    /// History database; defaults to [`DATABASE_FILE`] inside `output`.
    pub database: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub timeout: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: None,
            cookies: PathBuf::from("cookies.txt"),
            output: PathBuf::from("."),
            database: None,
            timeout: None,
            user_agent: None,
        }
    }
}

impl Config {
    /// The configured site, checked to be something requests can be sent to.
    pub fn site(&self) -> Result<&Url> {
        let site = self.site.as_ref().ok_or_else(|| ErrorKind::MissingSite)?;
        if !matches!(site.scheme(), "http" | "https") || site.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidSite(site.to_string()));
        }
        Ok(site)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| self.output.join(DATABASE_FILE))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

/// `config.toml` in the platform's config directory for this application.
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mirror").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Load the configuration from every layer.
///
/// An explicit `file` must exist; the default location is optional.
pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let file = match file {
        Some(file) if !file.is_file() => exn::bail!(ErrorKind::FileNotFound(file.to_path_buf())),
        Some(file) => Some(file.to_path_buf()),
        None => default_path().filter(|path| path.is_file()),
    };
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(file) = &file {
        tracing::debug!(path = %file.display(), "Reading config file");
        figment = figment.merge(Toml::file(file));
    }
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides))
        .extract()
        .or_raise(|| ErrorKind::Invalid)?;
    Ok(config)
}
