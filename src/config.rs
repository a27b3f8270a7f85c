//! Caller-facing configuration.
//!
//! Values come from [`Settings::default`], the `WD_*` environment variables via
//! [`Settings::from_env`], or the `with_*` builder methods.

use crate::error::WebDriverError;
use crate::version::Version;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time-to-live for cached index lookups (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Name of the persisted cache store inside the install directory.
pub const CACHE_FILE: &str = ".webdrivers-cache.json";

/// Which driver version the caller wants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequiredVersion {
    /// Whatever the index says is compatible with the installed browser.
    #[default]
    Latest,
    Exact(Version),
}

impl RequiredVersion {
    /// Parses the caller's string. Empty and `latest` mean [`RequiredVersion::Latest`].
    pub fn parse(input: &str) -> Result<Self, WebDriverError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(RequiredVersion::Latest);
        }
        Version::parse(trimmed).map(RequiredVersion::Exact)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub required_version: RequiredVersion,
    /// Skip update checks and return the existing binary.
    pub assume_offline: bool,
    pub install_dir: PathBuf,
    pub cache_ttl: Duration,
    /// Browser binary to query instead of searching standard locations.
    pub browser_path: Option<PathBuf>,
    /// Overrides the driver's own policy of keeping an existing binary when the
    /// index is unreachable.
    pub offline_fallback: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            required_version: RequiredVersion::Latest,
            assume_offline: false,
            install_dir: default_install_dir(),
            cache_ttl: DEFAULT_CACHE_TTL,
            browser_path: None,
            offline_fallback: None,
        }
    }
}

impl Settings {
    /// Loads settings from environment variables.
    ///
    /// # Environment Variables
    /// - `WD_INSTALL_DIR` - Where drivers and the cache live (default: `~/.webdrivers`)
    /// - `WD_CACHE_TIME` - Cache TTL in seconds (default: 86400)
    /// - `WD_CHROME_PATH` - Browser binary to query
    /// - `WD_REQUIRED_VERSION` - Exact driver version, or `latest`
    /// - `WD_ASSUME_OFFLINE` - `true`/`1` to skip update checks
    pub fn from_env() -> Result<Self, WebDriverError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with `lookup` resolving variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WebDriverError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(dir) = var("WD_INSTALL_DIR") {
            settings.install_dir = PathBuf::from(dir);
        }
        if let Some(secs) = var("WD_CACHE_TIME") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| WebDriverError::InvalidSetting {
                    name: "WD_CACHE_TIME".to_string(),
                    value: secs.clone(),
                })?;
            settings.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(path) = var("WD_CHROME_PATH") {
            settings.browser_path = Some(PathBuf::from(path));
        }
        if let Some(required) = var("WD_REQUIRED_VERSION") {
            settings.required_version = RequiredVersion::parse(&required)?;
        }
        if let Some(flag) = var("WD_ASSUME_OFFLINE") {
            settings.assume_offline = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(settings)
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_required_version(mut self, required: RequiredVersion) -> Self {
        self.required_version = required;
        self
    }

    pub fn with_browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser_path = Some(path.into());
        self
    }

    pub fn with_assume_offline(mut self, offline: bool) -> Self {
        self.assume_offline = offline;
        self
    }

    pub fn with_offline_fallback(mut self, fallback: bool) -> Self {
        self.offline_fallback = Some(fallback);
        self
    }

    /// Install directory with symlinks resolved when it already exists.
    pub fn resolved_install_dir(&self) -> PathBuf {
        canonical_or_self(&self.install_dir)
    }

    pub fn cache_file(&self) -> PathBuf {
        self.resolved_install_dir().join(CACHE_FILE)
    }
}

fn default_install_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".webdrivers"))
        .unwrap_or_else(|| PathBuf::from(".webdrivers"))
}

fn canonical_or_self(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
