//! Decides whether the installed driver is good enough and, if not, which
//! version to install.
//!
//! One [`VersionResolver`] serves exactly one update. Values it looks up along
//! the way (browser version, target version, download URL) live in its
//! [`Resolution`] and are dropped with it, so a changed setting is always
//! honoured by the next update.

use crate::config::RequiredVersion;
use crate::context::ResolveContext;
use crate::error::WebDriverError;
use crate::installer::Installer;
use crate::version::Version;
use crate::Driver;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateReason {
    Missing,
    RequiredVersionMismatch {
        installed: Version,
        required: Version,
    },
    IncompatibleRelease {
        installed: Version,
        browser: Version,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    UpToDate,
    Update(UpdateReason),
}

impl Decision {
    pub fn needs_update(&self) -> bool {
        matches!(self, Decision::Update(_))
    }
}

/// Terminal states of a successful update. Failures are the `Err` side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    UpToDate(PathBuf),
    Installed { path: PathBuf, version: Version },
    /// The index was unreachable and the existing binary was kept.
    KeptExisting(PathBuf),
}

impl Outcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            Outcome::UpToDate(path) | Outcome::KeptExisting(path) => path,
            Outcome::Installed { path, .. } => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Outcome::UpToDate(path) | Outcome::KeptExisting(path) => path,
            Outcome::Installed { path, .. } => path,
        }
    }
}

/// What the installed driver has to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement<'a> {
    /// The caller asked for this exact version.
    Exact(&'a Version),
    /// Any driver compatible with this browser version.
    CompatibleWith(&'a Version),
}

/// Applies the update rules to what is installed. `compatible` receives the
/// installed driver version and the browser version.
pub fn decide(
    installed: Option<&Version>,
    requirement: Requirement<'_>,
    compatible: impl FnOnce(&Version, &Version) -> bool,
) -> Decision {
    let Some(installed) = installed else {
        return Decision::Update(UpdateReason::Missing);
    };

    match requirement {
        Requirement::Exact(required) if required == installed => Decision::UpToDate,
        Requirement::Exact(required) => Decision::Update(UpdateReason::RequiredVersionMismatch {
            installed: installed.clone(),
            required: required.clone(),
        }),
        Requirement::CompatibleWith(browser) if compatible(installed, browser) => Decision::UpToDate,
        Requirement::CompatibleWith(browser) => Decision::Update(UpdateReason::IncompatibleRelease {
            installed: installed.clone(),
            browser: browser.clone(),
        }),
    }
}

/// Major-version match between driver and browser. Drivers older than
/// `legacy_threshold` predate per-release builds and are always accepted.
pub fn release_compatible(
    installed: &Version,
    browser: &Version,
    legacy_threshold: Option<&Version>,
) -> bool {
    let exempt = legacy_threshold.is_some_and(|threshold| installed.is_older_than(threshold));
    exempt || installed.major() == browser.major()
}

/// Values memoized for the lifetime of one update.
#[derive(Debug, Default, Clone)]
pub struct Resolution {
    pub browser_version: Option<Version>,
    pub target_version: Option<Version>,
    pub download_url: Option<String>,
}

pub struct VersionResolver<'a, D: Driver + ?Sized> {
    driver: &'a D,
    ctx: ResolveContext<'a>,
    installer: Installer<'a>,
    resolution: Resolution,
}

impl<'a, D: Driver + ?Sized> VersionResolver<'a, D> {
    pub fn new(driver: &'a D, ctx: ResolveContext<'a>, installer: Installer<'a>) -> Self {
        Self {
            driver,
            ctx,
            installer,
            resolution: Resolution::default(),
        }
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub async fn browser_version(&mut self) -> Result<Version, WebDriverError> {
        if let Some(version) = &self.resolution.browser_version {
            return Ok(version.clone());
        }
        let version = self.driver.browser_version(&self.ctx).await?;
        self.resolution.browser_version = Some(version.clone());
        Ok(version)
    }

    /// Version of the binary at the install path; `None` if absent or unreadable.
    pub async fn installed_version(&self) -> Option<Version> {
        let binary = self.installer.binary();
        if !binary.exists() {
            return None;
        }
        self.driver.binary_version(&binary).await
    }

    /// Installed version as seen by an exact requirement. A binary may report a
    /// longer version than it was installed under (`2.46` prints `2.46.628411`),
    /// so a matching install record wins over the binary's own answer.
    async fn installed_for_requirement(&self, required: &Version) -> Option<Version> {
        let binary = self.installer.binary();
        if !binary.exists() {
            return None;
        }
        match binary.recorded_version().await {
            Some(recorded) if &recorded == required => Some(recorded),
            _ => self.driver.binary_version(&binary).await,
        }
    }

    /// Decides whether an update is needed. The browser is only queried when
    /// no exact version is required.
    pub async fn decide(&mut self) -> Result<Decision, WebDriverError> {
        let settings = self.ctx.settings;
        let driver = self.driver;

        let decision = match &settings.required_version {
            RequiredVersion::Exact(required) => {
                let installed = self.installed_for_requirement(required).await;
                decide(installed.as_ref(), Requirement::Exact(required), |_, _| true)
            }
            RequiredVersion::Latest => {
                let browser = self.browser_version().await?;
                let installed = self.installed_version().await;
                debug!(installed = ?installed.as_ref().map(Version::to_string), browser = %browser, "checking driver");
                decide(installed.as_ref(), Requirement::CompatibleWith(&browser), |installed, browser| {
                    driver.is_compatible(installed, browser)
                })
            }
        };
        Ok(decision)
    }

    /// The caller's exact version, or the newest one the index offers for the
    /// installed browser.
    pub async fn target_version(&mut self) -> Result<Version, WebDriverError> {
        if let Some(version) = &self.resolution.target_version {
            return Ok(version.clone());
        }

        let settings = self.ctx.settings;
        let version = match &settings.required_version {
            RequiredVersion::Exact(version) => version.clone(),
            RequiredVersion::Latest => {
                let browser = self.browser_version().await?;
                self.driver.latest_version(&self.ctx, &browser).await?
            }
        };
        debug!(version = %version, "resolved driver version");
        self.resolution.target_version = Some(version.clone());
        Ok(version)
    }

    pub async fn download_url(&mut self) -> Result<String, WebDriverError> {
        if let Some(url) = &self.resolution.download_url {
            return Ok(url.clone());
        }
        let version = self.target_version().await?;
        let url = self.driver.download_url(&self.ctx, &version).await?;
        debug!(url = %url, "driver download URL");
        self.resolution.download_url = Some(url.clone());
        Ok(url)
    }

    /// Runs the full update: decide, resolve, install.
    pub async fn run(mut self) -> Result<Outcome, WebDriverError> {
        let decision = self.decide().await?;
        let binary_path = self.installer.binary_path();

        let reason = match decision {
            Decision::UpToDate => {
                debug!(path = %binary_path.display(), "driver is up to date");
                return Ok(Outcome::UpToDate(binary_path));
            }
            Decision::Update(reason) => reason,
        };
        info!(reason = ?reason, "driver update required");

        match self.install().await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_connection_error() && self.offline_fallback() && binary_path.is_file() => {
                warn!(error = %e, path = %binary_path.display(), "index unreachable, keeping existing driver");
                Ok(Outcome::KeptExisting(binary_path))
            }
            Err(e) => Err(e),
        }
    }

    async fn install(&mut self) -> Result<Outcome, WebDriverError> {
        let version = self.target_version().await?;
        let url = self.download_url().await?;
        let path = self.installer.install(&version, &url).await?;
        Ok(Outcome::Installed { path, version })
    }

    fn offline_fallback(&self) -> bool {
        self.ctx
            .settings
            .offline_fallback
            .unwrap_or_else(|| self.driver.offline_fallback())
    }
}
