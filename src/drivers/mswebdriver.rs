//! MicrosoftWebDriver for the legacy (EdgeHTML) Microsoft Edge on Windows.
//!
//! The executable cannot report its own version, so the version recorded at
//! install time is used. The matching driver is the one published for the
//! Windows build Edge ships with (second segment of the Edge version).

use crate::browser::edge_version;
use crate::context::ResolveContext;
use crate::error::WebDriverError;
use crate::index::DownloadListing;
use crate::platform::Platform;
use crate::version::Version;
use crate::{Driver, DriverBinary};
use async_trait::async_trait;
use tracing::debug;

pub const DOWNLOADS_URL: &str =
    "https://developer.microsoft.com/en-us/microsoft-edge/tools/webdriver/";

const FILE_NAME: &str = "MicrosoftWebDriver.exe";

/// Last Edge major version that still had a downloadable driver.
const LAST_DOWNLOADABLE_MAJOR: u64 = 44;

#[derive(Debug, Clone)]
pub struct MsWebDriver {
    listing: DownloadListing,
}

impl Default for MsWebDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MsWebDriver {
    pub fn new() -> Self {
        Self::with_downloads_url(DOWNLOADS_URL)
    }

    pub fn with_downloads_url(url: impl Into<String>) -> Self {
        Self {
            listing: DownloadListing::new(url, FILE_NAME),
        }
    }
}

/// The Windows build a legacy Edge version belongs to, e.g. `44.17763.1.0` -> `17763`.
pub fn edge_build(edge: &Version) -> Result<Version, WebDriverError> {
    edge.segments()
        .get(1)
        .map(|build| Version::from_segments(vec![*build]))
        .ok_or_else(|| WebDriverError::VersionParse {
            input: edge.to_string(),
        })
}

#[async_trait]
impl Driver for MsWebDriver {
    fn driver_name(&self) -> &str {
        "MicrosoftWebDriver"
    }

    fn file_name(&self, _platform: Platform) -> String {
        FILE_NAME.to_string()
    }

    async fn browser_version(&self, ctx: &ResolveContext<'_>) -> Result<Version, WebDriverError> {
        edge_version(ctx.platform).await
    }

    async fn binary_version(&self, binary: &DriverBinary) -> Option<Version> {
        binary.recorded_version().await
    }

    fn is_compatible(&self, installed: &Version, browser: &Version) -> bool {
        edge_build(browser).is_ok_and(|build| &build == installed)
    }

    async fn latest_version(
        &self,
        _ctx: &ResolveContext<'_>,
        browser: &Version,
    ) -> Result<Version, WebDriverError> {
        if browser.major() > LAST_DOWNLOADABLE_MAJOR {
            return Err(WebDriverError::Version(
                "MicrosoftWebDriver is not downloadable for this Edge version; run \
                 `DISM.exe /Online /Add-Capability /CapabilityName:Microsoft.WebDriver~~~~0.0.1.0` \
                 as discussed at https://developer.microsoft.com/en-us/microsoft-edge/tools/webdriver/#downloads"
                    .to_string(),
            ));
        }

        let build = edge_build(browser)?;
        debug!(build = %build, "desired build of Microsoft WebDriver");
        Ok(build)
    }

    async fn download_url(
        &self,
        ctx: &ResolveContext<'_>,
        version: &Version,
    ) -> Result<String, WebDriverError> {
        self.listing.download_url(ctx, version.major()).await
    }

    fn offline_fallback(&self) -> bool {
        true
    }
}
