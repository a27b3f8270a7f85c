//! Keeps a browser driver executable in step with the installed browser.
//!
//! A [`Driver`] describes one driver family (where its index lives, how to
//! read versions, which versions are compatible). [`WebDriverManager`] runs the
//! update flow for it: query the browser, decide whether the installed driver
//! still fits, resolve a version through the cached index, then install.

pub mod browser;
pub mod cache;
pub mod config;
pub mod context;
pub mod drivers;
pub mod error;
pub mod index;
pub mod installer;
pub mod manager;
pub mod network;
pub mod platform;
pub mod resolver;
pub mod version;

pub use config::{RequiredVersion, Settings};
pub use context::ResolveContext;
pub use error::WebDriverError;
pub use installer::DriverBinary;
pub use manager::WebDriverManager;
pub use platform::Platform;
pub use version::Version;

use async_trait::async_trait;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Gets the name of the driver (e.g., "chromedriver").
    fn driver_name(&self) -> &str;

    /// File name of the executable on `platform`.
    fn file_name(&self, platform: Platform) -> String {
        platform.executable_name(self.driver_name())
    }

    /// Gets the version of the browser this driver automates.
    async fn browser_version(&self, ctx: &ResolveContext<'_>) -> Result<Version, WebDriverError>;

    /// Version of an installed binary, or `None` when it cannot be determined.
    ///
    /// The default asks the binary itself via `--version`.
    async fn binary_version(&self, binary: &DriverBinary) -> Option<Version> {
        let output = browser::command_output(binary.path(), &["--version"]).await.ok()?;
        Version::extract(&output).ok()
    }

    /// Whether an installed driver version can drive the given browser version.
    fn is_compatible(&self, installed: &Version, browser: &Version) -> bool;

    /// Newest driver version compatible with `browser`.
    async fn latest_version(
        &self,
        ctx: &ResolveContext<'_>,
        browser: &Version,
    ) -> Result<Version, WebDriverError>;

    /// Gets the download URL for the specified driver version.
    async fn download_url(
        &self,
        ctx: &ResolveContext<'_>,
        version: &Version,
    ) -> Result<String, WebDriverError>;

    /// Keep an existing binary when the index cannot be reached.
    fn offline_fallback(&self) -> bool {
        false
    }
}
