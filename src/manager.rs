//! Entry point tying a [`Driver`] to settings, cache and network.

use crate::cache::CacheStore;
use crate::config::Settings;
use crate::context::ResolveContext;
use crate::error::WebDriverError;
use crate::installer::Installer;
use crate::network::Network;
use crate::platform::Platform;
use crate::resolver::{Outcome, VersionResolver};
use crate::version::Version;
use crate::Driver;
use std::path::PathBuf;
use tracing::debug;

pub struct WebDriverManager<D: Driver> {
    driver: D,
    settings: Settings,
    network: Network,
    platform: Platform,
}

impl<D: Driver> WebDriverManager<D> {
    /// Creates a manager for the platform this process runs on.
    pub fn new(driver: D, settings: Settings) -> Result<Self, WebDriverError> {
        Ok(Self::with_platform(driver, settings, Platform::current()?))
    }

    pub fn with_platform(driver: D, settings: Settings, platform: Platform) -> Self {
        Self {
            driver,
            settings,
            network: Network::default(),
            platform,
        }
    }

    /// Uses `client` for every request, e.g. one configured with a proxy.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.network = Network::new(client);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings changes apply from the next call on; nothing is memoized
    /// between calls.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Where the driver executable lives (whether or not it exists).
    pub fn driver_path(&self) -> PathBuf {
        self.installer().binary_path()
    }

    /// Makes sure a suitable driver is installed and returns its path.
    pub async fn update(&self) -> Result<PathBuf, WebDriverError> {
        if self.settings.assume_offline {
            let path = self.driver_path();
            debug!(path = %path.display(), "assuming offline, skipping update check");
            return if path.is_file() {
                Ok(path)
            } else {
                Err(WebDriverError::DriverExecutableNotFound { path })
            };
        }

        let outcome = self.resolve().await?;
        Ok(outcome.into_path())
    }

    /// Like [`update`](Self::update) but reports which terminal state was reached.
    pub async fn resolve(&self) -> Result<Outcome, WebDriverError> {
        let cache = self.cache();
        let resolver = VersionResolver::new(&self.driver, self.context(&cache), self.installer());
        resolver.run().await
    }

    /// Version of the installed driver, `None` if it is missing or unreadable.
    pub async fn current_version(&self) -> Option<Version> {
        let cache = self.cache();
        VersionResolver::new(&self.driver, self.context(&cache), self.installer())
            .installed_version()
            .await
    }

    /// Newest driver version compatible with the installed browser.
    pub async fn latest_version(&self) -> Result<Version, WebDriverError> {
        let cache = self.cache();
        let ctx = self.context(&cache);
        let browser = self.driver.browser_version(&ctx).await?;
        self.driver.latest_version(&ctx, &browser).await
    }

    pub async fn browser_version(&self) -> Result<Version, WebDriverError> {
        let cache = self.cache();
        self.driver.browser_version(&self.context(&cache)).await
    }

    /// Deletes the installed driver and its version record.
    pub async fn remove(&self) -> Result<(), WebDriverError> {
        self.installer().remove().await
    }

    fn cache(&self) -> CacheStore {
        CacheStore::new(self.settings.cache_file())
    }

    fn context<'a>(&'a self, cache: &'a CacheStore) -> ResolveContext<'a> {
        ResolveContext {
            network: &self.network,
            cache,
            settings: &self.settings,
            platform: self.platform,
        }
    }

    fn installer(&self) -> Installer<'_> {
        Installer::new(
            &self.network,
            self.settings.resolved_install_dir(),
            self.driver.file_name(self.platform),
        )
    }
}
