//! Remote catalogs of available driver versions.
//!
//! [`ReleaseIndex`] covers indexes that publish plaintext pointer files
//! (`LATEST_RELEASE`, `LATEST_RELEASE_<release line>`). [`DownloadListing`]
//! covers the older style of an HTML page enumerating one download per build.
//! Successful lookups go through the [`CacheStore`](crate::cache::CacheStore)
//! keyed by resource name.

use crate::context::ResolveContext;
use crate::error::WebDriverError;
use crate::version::Version;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ReleaseIndex {
    base_url: String,
    latest_pointer: String,
    browser: String,
    driver: String,
    catalog_url: String,
}

impl ReleaseIndex {
    /// * `latest_pointer` - resource holding the newest release, e.g. `LATEST_RELEASE`
    /// * `browser`/`driver` - display names used in error messages
    /// * `catalog_url` - where users can browse known driver versions
    pub fn new(
        base_url: impl Into<String>,
        latest_pointer: impl Into<String>,
        browser: impl Into<String>,
        driver: impl Into<String>,
        catalog_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            latest_pointer: latest_pointer.into(),
            browser: browser.into(),
            driver: driver.into(),
            catalog_url: catalog_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), resource)
    }

    /// Newest driver version, optionally restricted to a browser release line.
    pub async fn latest_version(
        &self,
        ctx: &ResolveContext<'_>,
        release_line: Option<&Version>,
    ) -> Result<Version, WebDriverError> {
        match release_line {
            None => self.cached_version(ctx, &self.latest_pointer).await,
            Some(release) => self.latest_point_release(ctx, release).await,
        }
    }

    async fn latest_point_release(
        &self,
        ctx: &ResolveContext<'_>,
        release: &Version,
    ) -> Result<Version, WebDriverError> {
        let resource = format!("LATEST_RELEASE_{}", release);
        match self.cached_version(ctx, &resource).await {
            Ok(version) => Ok(version),
            Err(e) if e.is_missing_resource() || matches!(e, WebDriverError::VersionParse { .. }) => {
                debug!(release = %release, error = %e, "unable to find a driver for release line");
                Err(self.not_found_error(ctx, release).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Builds the error for a release line the index does not list. The extra
    /// fetch only decides which message to give.
    async fn not_found_error(&self, ctx: &ResolveContext<'_>, release: &Version) -> WebDriverError {
        let newest = match ctx.network.get(&self.resource_url(&self.latest_pointer)).await {
            Ok(body) => Version::parse(&body).ok(),
            Err(_) => None,
        };

        let prefix = match newest {
            Some(newest) if release.cmp_padded(&newest) == Ordering::Greater => format!(
                "you appear to be using a non-production version of {}; ",
                self.browser
            ),
            _ => format!(
                "no {} found for {} release line {}; ",
                self.driver, self.browser, release
            ),
        };

        WebDriverError::Version(format!(
            "{}please set `required_version` to a known {} version: {}",
            prefix, self.driver, self.catalog_url
        ))
    }

    async fn cached_version(
        &self,
        ctx: &ResolveContext<'_>,
        resource: &str,
    ) -> Result<Version, WebDriverError> {
        let url = self.resource_url(resource);
        let value = ctx
            .cache
            .with_cache(resource, ctx.settings.cache_ttl, || async {
                let body = ctx.network.get(&url).await?;
                Version::parse(&body).map(|v| v.to_string())
            })
            .await?;
        Version::parse(&value)
    }
}

static DOWNLOAD_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<li[^>]*class\s*=\s*["'][^"']*\bdriver-download\b[^"']*["'][^>]*>.*?<a\s[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#,
    )
    .expect("Invalid DOWNLOAD_ITEM_RE regex")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("Invalid TAG_RE regex"));

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid NUMBER_RE regex"));

/// Maps the first integer of each download anchor's text to its href.
/// Insider builds are skipped.
pub fn parse_download_listing(html: &str) -> BTreeMap<u64, String> {
    DOWNLOAD_ITEM_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let href = caps.get(1)?.as_str().trim();
            let text = TAG_RE.replace_all(caps.get(2)?.as_str(), "");
            let text = text.trim();
            if text.eq_ignore_ascii_case("insiders") {
                return None;
            }
            let key = NUMBER_RE.find(text)?.as_str().parse::<u64>().ok()?;
            Some((key, href.to_string()))
        })
        .collect()
}

/// An HTML page listing one download per browser build.
#[derive(Debug, Clone)]
pub struct DownloadListing {
    page_url: String,
    cache_prefix: String,
}

impl DownloadListing {
    pub fn new(page_url: impl Into<String>, cache_prefix: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            cache_prefix: cache_prefix.into(),
        }
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub async fn downloads(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<BTreeMap<u64, String>, WebDriverError> {
        let html = ctx.network.get(&self.page_url).await?;
        Ok(parse_download_listing(&html))
    }

    /// Download URL for `build`, cached under `<prefix>-<build>`.
    pub async fn download_url(
        &self,
        ctx: &ResolveContext<'_>,
        build: u64,
    ) -> Result<String, WebDriverError> {
        let key = format!("{}-{}", self.cache_prefix, build);
        ctx.cache
            .with_cache(&key, ctx.settings.cache_ttl, || async {
                let downloads = self.downloads(ctx).await?;
                downloads.get(&build).cloned().ok_or_else(|| {
                    WebDriverError::Version(format!(
                        "no download listed for build {} at {}; please set `required_version` to a listed build",
                        build, self.page_url
                    ))
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::config::Settings;
    use crate::network::Network;
    use crate::platform::Platform;
    use mockito::Server;

    struct Fixture {
        _dir: tempfile::TempDir,
        network: Network,
        cache: CacheStore,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let settings = Settings::default().with_install_dir(dir.path());
            Self {
                cache: CacheStore::new(dir.path().join("cache.json")),
                network: Network::default(),
                settings,
                _dir: dir,
            }
        }

        fn ctx(&self) -> ResolveContext<'_> {
            ResolveContext {
                network: &self.network,
                cache: &self.cache,
                settings: &self.settings,
                platform: Platform::Linux,
            }
        }
    }

    fn index(url: &str) -> ReleaseIndex {
        ReleaseIndex::new(
            url,
            "LATEST_RELEASE",
            "Chrome",
            "chromedriver",
            "https://chromedriver.storage.googleapis.com/index.html",
        )
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[tokio::test]
    async fn latest_version_without_constraint_reads_pointer() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/LATEST_RELEASE")
            .with_body("74.0.3729.6\n")
            .create_async()
            .await;
        let fixture = Fixture::new();

        let version = index(&server.url())
            .latest_version(&fixture.ctx(), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(version, v("74.0.3729.6"));
    }

    #[tokio::test]
    async fn release_line_lookup_is_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/LATEST_RELEASE_73.0.3683")
            .with_body("73.0.3683.68")
            .expect(1)
            .create_async()
            .await;
        let fixture = Fixture::new();
        let index = index(&server.url());

        for _ in 0..2 {
            let version = index
                .latest_version(&fixture.ctx(), Some(&v("73.0.3683")))
                .await
                .unwrap();
            assert_eq!(version, v("73.0.3683.68"));
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn newer_than_index_reports_non_production_browser() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/LATEST_RELEASE_999.0.1")
            .with_status(404)
            .create_async()
            .await;
        let _latest = server
            .mock("GET", "/LATEST_RELEASE")
            .with_body("73.0.3683.68")
            .create_async()
            .await;
        let fixture = Fixture::new();

        let err = index(&server.url())
            .latest_version(&fixture.ctx(), Some(&v("999.0.1")))
            .await
            .unwrap_err();

        match err {
            WebDriverError::Version(msg) => {
                assert!(msg.contains("non-production"), "{}", msg);
                assert!(msg.contains("required_version"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unlisted_older_release_reports_generic_not_found() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/LATEST_RELEASE_72.0.9999")
            .with_status(404)
            .create_async()
            .await;
        let _latest = server
            .mock("GET", "/LATEST_RELEASE")
            .with_body("73.0.3683.68")
            .create_async()
            .await;
        let fixture = Fixture::new();

        let err = index(&server.url())
            .latest_version(&fixture.ctx(), Some(&v("72.0.9999")))
            .await
            .unwrap_err();

        match err {
            WebDriverError::Version(msg) => {
                assert!(!msg.contains("non-production"), "{}", msg);
                assert!(msg.contains("no chromedriver found"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_lookup_is_not_cached() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/LATEST_RELEASE_72.0.9999")
            .with_status(404)
            .create_async()
            .await;
        let _latest = server
            .mock("GET", "/LATEST_RELEASE")
            .with_status(500)
            .create_async()
            .await;
        let fixture = Fixture::new();

        let result = index(&server.url())
            .latest_version(&fixture.ctx(), Some(&v("72.0.9999")))
            .await;

        assert!(matches!(result, Err(WebDriverError::Version(_))));
        assert_eq!(
            fixture
                .cache
                .get("LATEST_RELEASE_72.0.9999", fixture.settings.cache_ttl)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn unreachable_index_stays_a_connection_error() {
        let fixture = Fixture::new();

        let err = index("http://127.0.0.1:9")
            .latest_version(&fixture.ctx(), Some(&v("91.0.4472")))
            .await
            .unwrap_err();

        assert!(err.is_connection_error(), "{:?}", err);
    }

    #[tokio::test]
    async fn server_error_on_release_line_is_not_reported_as_missing() {
        let mut server = Server::new_async().await;
        let _broken = server
            .mock("GET", "/LATEST_RELEASE_91.0.4472")
            .with_status(503)
            .create_async()
            .await;
        let latest = server
            .mock("GET", "/LATEST_RELEASE")
            .expect(0)
            .create_async()
            .await;
        let fixture = Fixture::new();

        let err = index(&server.url())
            .latest_version(&fixture.ctx(), Some(&v("91.0.4472")))
            .await
            .unwrap_err();

        assert!(err.is_connection_error(), "{:?}", err);
        assert!(!err.is_missing_resource());
        latest.assert_async().await;
    }

    const LISTING: &str = r#"
        <ul>
          <li class="driver-download"><a class="subtitle" href="https://download.example/17763/MicrosoftWebDriver.exe" aria-label="WebDriver for release number 17763">Release 17763</a></li>
          <li class="driver-download"><a href="https://download.example/17134/MicrosoftWebDriver.exe">Release 17134</a></li>
          <li class="driver-download"><a href="https://download.example/insiders/MicrosoftWebDriver.exe">Insiders</a></li>
          <li class="other"><a href="https://download.example/nope">Release 1</a></li>
        </ul>
    "#;

    #[test]
    fn parse_download_listing_keys_by_build() {
        let downloads = parse_download_listing(LISTING);

        assert_eq!(downloads.len(), 2);
        assert_eq!(
            downloads.get(&17763).map(String::as_str),
            Some("https://download.example/17763/MicrosoftWebDriver.exe")
        );
        assert_eq!(
            downloads.get(&17134).map(String::as_str),
            Some("https://download.example/17134/MicrosoftWebDriver.exe")
        );
    }

    #[tokio::test]
    async fn download_listing_resolves_and_caches_url() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/webdriver/")
            .with_body(LISTING)
            .expect(1)
            .create_async()
            .await;
        let fixture = Fixture::new();
        let listing = DownloadListing::new(format!("{}/webdriver/", server.url()), "MicrosoftWebDriver.exe");

        for _ in 0..2 {
            let url = listing.download_url(&fixture.ctx(), 17134).await.unwrap();
            assert_eq!(url, "https://download.example/17134/MicrosoftWebDriver.exe");
        }
        mock.assert_async().await;

        let missing = listing.download_url(&fixture.ctx(), 10240).await;
        assert!(matches!(missing, Err(WebDriverError::Version(_))));
    }
}
