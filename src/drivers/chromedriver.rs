//! Chromedriver for Google Chrome and Chromium.
//!
//! Release lines before 115 come from the chromedriver storage bucket. From
//! 115 on, drivers are published through Chrome for Testing, whose download
//! URLs are listed in a JSON catalog.

use crate::browser::BrowserLocator;
use crate::context::ResolveContext;
use crate::error::WebDriverError;
use crate::index::ReleaseIndex;
use crate::platform::{Arch, Platform};
use crate::resolver::release_compatible;
use crate::version::Version;
use crate::Driver;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub const STORAGE_URL: &str = "https://chromedriver.storage.googleapis.com";
pub const CFT_URL: &str = "https://googlechromelabs.github.io/chrome-for-testing";
const STORAGE_CATALOG: &str = "https://chromedriver.storage.googleapis.com/index.html";
const CFT_CATALOG: &str = "https://googlechromelabs.github.io/chrome-for-testing/";
const KNOWN_GOOD_VERSIONS: &str = "known-good-versions-with-downloads.json";

/// Manages chromedriver. Index locations and version thresholds are fields so
/// they can be pointed at mirrors or adjusted when upstream changes.
#[derive(Debug, Clone)]
pub struct ChromeDriver {
    storage: ReleaseIndex,
    cft: ReleaseIndex,
    /// Drivers older than this predate per-release builds.
    legacy_threshold: Version,
    /// Release lines older than this have no `LATEST_RELEASE_*` files.
    release_file_floor: Version,
    legacy_driver: Version,
    /// First major version published through Chrome for Testing.
    cft_first_major: u64,
}

impl Default for ChromeDriver {
    fn default() -> Self {
        Self {
            storage: storage_index(STORAGE_URL),
            cft: cft_index(CFT_URL),
            legacy_threshold: Version::from_segments(vec![70, 0, 3538]),
            release_file_floor: Version::from_segments(vec![70]),
            legacy_driver: Version::from_segments(vec![2, 41]),
            cft_first_major: 115,
        }
    }
}

impl ChromeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_url(mut self, url: impl Into<String>) -> Self {
        self.storage = storage_index(url);
        self
    }

    pub fn with_cft_url(mut self, url: impl Into<String>) -> Self {
        self.cft = cft_index(url);
        self
    }

    pub fn with_legacy_threshold(mut self, threshold: Version) -> Self {
        self.legacy_threshold = threshold;
        self
    }

    pub fn legacy_threshold(&self) -> &Version {
        &self.legacy_threshold
    }

    fn is_cft(&self, version: &Version) -> bool {
        version.major() >= self.cft_first_major
    }

    async fn cft_download_url(
        &self,
        ctx: &ResolveContext<'_>,
        version: &Version,
    ) -> Result<String, WebDriverError> {
        let platform = cft_platform(ctx.platform, Arch::current()?);
        let key = format!("chromedriver-{}-{}", version, platform);
        let catalog_url = self.cft.resource_url(KNOWN_GOOD_VERSIONS);

        ctx.cache
            .with_cache(&key, ctx.settings.cache_ttl, || async {
                let body = ctx.network.get(&catalog_url).await?;
                let catalog: KnownGoodVersions =
                    serde_json::from_str(&body).map_err(|e| WebDriverError::JsonParse {
                        url: catalog_url.clone(),
                        source: e,
                    })?;
                find_download(&catalog, version, platform)
            })
            .await
    }
}

fn storage_index(url: impl Into<String>) -> ReleaseIndex {
    ReleaseIndex::new(url, "LATEST_RELEASE", "Chrome", "chromedriver", STORAGE_CATALOG)
}

fn cft_index(url: impl Into<String>) -> ReleaseIndex {
    ReleaseIndex::new(url, "LATEST_RELEASE_STABLE", "Chrome", "chromedriver", CFT_CATALOG)
}

/// Archive suffix used by the storage bucket.
fn storage_platform(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "win32",
        Platform::Mac => "mac64",
        Platform::Linux => "linux64",
    }
}

/// Platform identifier used by the Chrome for Testing catalog.
fn cft_platform(platform: Platform, arch: Arch) -> &'static str {
    match (platform, arch) {
        (Platform::Windows, Arch::X86) => "win32",
        (Platform::Windows, _) => "win64",
        (Platform::Mac, Arch::Aarch64) => "mac-arm64",
        (Platform::Mac, _) => "mac-x64",
        (Platform::Linux, _) => "linux64",
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    fn driver_name(&self) -> &str {
        "chromedriver"
    }

    async fn browser_version(&self, ctx: &ResolveContext<'_>) -> Result<Version, WebDriverError> {
        BrowserLocator::new(ctx.platform, ctx.settings.browser_path.clone())
            .browser_version()
            .await
    }

    fn is_compatible(&self, installed: &Version, browser: &Version) -> bool {
        release_compatible(installed, browser, Some(&self.legacy_threshold))
    }

    async fn latest_version(
        &self,
        ctx: &ResolveContext<'_>,
        browser: &Version,
    ) -> Result<Version, WebDriverError> {
        let release = browser.release_line();

        if release.is_older_than(&self.release_file_floor) {
            debug!(release = %release, legacy = %self.legacy_driver, "release predates LATEST_RELEASE files");
            return Ok(self.legacy_driver.clone());
        }

        let index = if self.is_cft(&release) { &self.cft } else { &self.storage };
        let version = index.latest_version(ctx, Some(&release)).await?;
        debug!(version = %version, "latest version available");
        Ok(version)
    }

    async fn download_url(
        &self,
        ctx: &ResolveContext<'_>,
        version: &Version,
    ) -> Result<String, WebDriverError> {
        if self.is_cft(version) {
            return self.cft_download_url(ctx, version).await;
        }

        Ok(format!(
            "{}/{}/chromedriver_{}.zip",
            self.storage.base_url().trim_end_matches('/'),
            version,
            storage_platform(ctx.platform)
        ))
    }
}

/// Represents a single download URL for a specific platform.
#[derive(Debug, Deserialize)]
struct Download {
    platform: String,
    url: String,
}

/// Represents the available downloads for a specific Chromedriver version.
#[derive(Debug, Deserialize)]
struct VersionDownloads {
    chromedriver: Option<Vec<Download>>, // must be optional, early versions have no 'chromedriver' key
}

/// Represents a single version entry in the catalog.
#[derive(Debug, Deserialize)]
struct CatalogVersion {
    version: String,
    downloads: VersionDownloads,
}

/// The top-level structure of the JSON response.
#[derive(Debug, Deserialize)]
struct KnownGoodVersions {
    versions: Vec<CatalogVersion>,
}

fn find_download(
    catalog: &KnownGoodVersions,
    version: &Version,
    platform: &str,
) -> Result<String, WebDriverError> {
    let wanted = version.to_string();
    let not_found = || {
        WebDriverError::Version(format!(
            "no chromedriver {} download for platform {}; please set `required_version` to a known chromedriver version: {}",
            wanted, platform, CFT_CATALOG
        ))
    };

    catalog
        .versions
        .iter()
        .find(|v| v.version == wanted)
        .and_then(|v| v.downloads.chromedriver.as_ref())
        .and_then(|downloads| downloads.iter().find(|d| d.platform == platform))
        .map(|d| d.url.clone())
        .ok_or_else(not_found)
}
