//! Finds the installed browser and asks it for its version.
//!
//! Location and query tables are chosen with a `match` on [`Platform`], so the
//! same lookup logic runs (and is testable) for every platform.

use crate::error::WebDriverError;
use crate::platform::Platform;
use crate::version::Version;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const VERSION_ERROR: &str =
    "Failed to find Chrome binary or its version; install Chrome or set `browser_path` (WD_CHROME_PATH)";

#[derive(Debug, Clone)]
pub struct BrowserLocator {
    platform: Platform,
    override_path: Option<PathBuf>,
}

impl BrowserLocator {
    pub fn new(platform: Platform, override_path: Option<PathBuf>) -> Self {
        Self {
            platform,
            override_path,
        }
    }

    /// First existing Chrome executable in the platform's standard locations.
    pub fn locate(&self) -> Option<PathBuf> {
        locate_chrome(
            self.platform,
            |name| std::env::var(name).ok(),
            Path::exists,
            |name| which::which(name).ok(),
        )
    }

    /// Raw output of the platform's version query for the binary at `path`.
    pub async fn version(&self, path: &Path) -> Result<String, WebDriverError> {
        match self.platform {
            Platform::Windows => {
                let script = format!(
                    "(Get-ItemProperty '{}').VersionInfo.ProductVersion",
                    powershell_quote(&path.to_string_lossy())
                );
                command_output("powershell", &["-NoProfile", "-Command", script.as_str()]).await
            }
            Platform::Mac => command_output(path, &["--version"]).await,
            Platform::Linux => command_output(path, &["--product-version"]).await,
        }
    }

    /// Version of the configured or discovered browser.
    pub async fn browser_version(&self) -> Result<Version, WebDriverError> {
        let path = self.override_path.clone().or_else(|| self.locate());
        self.browser_version_at(path).await
    }

    async fn browser_version_at(&self, path: Option<PathBuf>) -> Result<Version, WebDriverError> {
        let path = path.ok_or_else(|| WebDriverError::Version(VERSION_ERROR.to_string()))?;

        let raw = self.version(&path).await?;
        if raw.trim().is_empty() {
            return Err(WebDriverError::Version(VERSION_ERROR.to_string()));
        }

        let version =
            Version::extract(&raw).map_err(|_| WebDriverError::Version(VERSION_ERROR.to_string()))?;
        debug!(path = %path.display(), version = %version, "browser version");
        Ok(version)
    }
}

/// Searches the candidate table, then (on linux) `PATH`. `exists` and
/// `on_path` stand in for the filesystem and `which`.
pub fn locate_chrome(
    platform: Platform,
    env: impl Fn(&str) -> Option<String>,
    exists: impl Fn(&Path) -> bool,
    on_path: impl Fn(&str) -> Option<PathBuf>,
) -> Option<PathBuf> {
    let found = chrome_candidates(platform, env)
        .into_iter()
        .find(|path| exists(path.as_path()));

    match (found, platform) {
        (Some(path), _) => Some(path),
        (None, Platform::Linux) => ["google-chrome", "chrome", "chromium", "chromium-browser"]
            .into_iter()
            .find_map(on_path),
        (None, _) => None,
    }
}

/// Standard Chrome and Chromium install locations, most preferred first.
/// `env` resolves environment variables so the Windows table can be tested.
pub fn chrome_candidates(platform: Platform, env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    match platform {
        Platform::Windows => {
            let roots = ["LOCALAPPDATA", "PROGRAMFILES", "PROGRAMFILES(X86)"];
            let directories = ["Google\\Chrome\\Application", "Chromium\\Application"];
            directories
                .iter()
                .flat_map(|dir| {
                    roots
                        .iter()
                        .filter_map(|root| env(*root))
                        .map(move |root| PathBuf::from(format!("{}\\{}\\chrome.exe", root, dir)))
                        .collect::<Vec<_>>()
                })
                .collect()
        }
        Platform::Mac => vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ],
        Platform::Linux => {
            let directories = [
                "/usr/local/sbin",
                "/usr/local/bin",
                "/usr/sbin",
                "/usr/bin",
                "/sbin",
                "/bin",
                "/opt/google/chrome",
            ];
            let files = ["google-chrome", "chrome", "chromium", "chromium-browser"];
            directories
                .iter()
                .flat_map(|dir| files.iter().map(move |file| Path::new(dir).join(file)))
                .collect()
        }
    }
}

/// Escapes `value` for use inside a single-quoted PowerShell string.
fn powershell_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Version of the legacy (AppX packaged) Microsoft Edge. Windows only.
pub async fn edge_version(platform: Platform) -> Result<Version, WebDriverError> {
    if platform != Platform::Windows {
        return Err(WebDriverError::UnsupportedPlatform(format!(
            "Microsoft Edge (legacy) is only available on windows, not {}",
            platform
        )));
    }

    let raw = command_output(
        "powershell",
        &["-NoProfile", "-Command", "(Get-AppxPackage -Name Microsoft.MicrosoftEdge).Version"],
    )
    .await?;

    // Package name changed?
    if raw.trim().is_empty() {
        return Err(WebDriverError::Version(
            "Failed to check Microsoft Edge version".to_string(),
        ));
    }
    debug!(version = raw.trim(), "Microsoft Edge version");
    Version::parse(&raw)
}

/// Runs `program args...` and returns its stdout.
pub(crate) async fn command_output(
    program: impl AsRef<OsStr>,
    args: &[&str],
) -> Result<String, WebDriverError> {
    let program = program.as_ref();
    let command_str = format!("'{}' {}", program.to_string_lossy(), args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| WebDriverError::CommandExecution {
            command: command_str.clone(),
            source: e,
        })?;

    String::from_utf8(output.stdout).map_err(|e| WebDriverError::CommandOutputParsing {
        command: command_str,
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_candidates_search_each_root_per_directory() {
        let env = |name: &str| match name {
            "LOCALAPPDATA" => Some("C:\\Users\\me\\AppData\\Local".to_string()),
            "PROGRAMFILES" => Some("C:\\Program Files".to_string()),
            _ => None,
        };

        let candidates = chrome_candidates(Platform::Windows, env);

        assert_eq!(
            candidates,
            vec![
                PathBuf::from("C:\\Users\\me\\AppData\\Local\\Google\\Chrome\\Application\\chrome.exe"),
                PathBuf::from("C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"),
                PathBuf::from("C:\\Users\\me\\AppData\\Local\\Chromium\\Application\\chrome.exe"),
                PathBuf::from("C:\\Program Files\\Chromium\\Application\\chrome.exe"),
            ]
        );
    }

    #[test]
    fn linux_candidates_prefer_google_chrome_in_local_sbin() {
        let candidates = chrome_candidates(Platform::Linux, |_| None);
        assert_eq!(candidates.len(), 28);
        assert_eq!(candidates[0], PathBuf::from("/usr/local/sbin/google-chrome"));
        assert_eq!(
            candidates.last().unwrap(),
            &PathBuf::from("/opt/google/chrome/chromium-browser")
        );
    }

    #[test]
    fn mac_candidates_include_chromium() {
        let candidates = chrome_candidates(Platform::Mac, |_| None);
        assert!(candidates[1].ends_with("Chromium"));
    }

    #[cfg(unix)]
    fn fake_browser(dir: &Path, output: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-chrome");
        std::fs::write(&path, format!("#!/bin/sh\necho \"{}\"\n", output)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn browser_version_reads_override_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_browser(dir.path(), "Google Chrome 73.0.3683.75 ");
        let platform = Platform::current().unwrap();

        let version = BrowserLocator::new(platform, Some(path))
            .browser_version()
            .await
            .unwrap();

        assert_eq!(version.to_string(), "73.0.3683.75");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_version_output_is_a_version_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_browser(dir.path(), "");
        let platform = Platform::current().unwrap();

        let result = BrowserLocator::new(platform, Some(path))
            .browser_version()
            .await;

        match result {
            Err(WebDriverError::Version(msg)) => assert!(msg.contains("Failed to find Chrome")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn locate_falls_back_to_path_lookup_on_linux() {
        let found = locate_chrome(Platform::Linux, |_| None, |_| false, |name| {
            (name == "chromium").then(|| PathBuf::from("/snap/bin/chromium"))
        });
        assert_eq!(found, Some(PathBuf::from("/snap/bin/chromium")));

        let preferred = locate_chrome(
            Platform::Linux,
            |_| None,
            |path| path == Path::new("/usr/bin/chromium-browser"),
            |_| Some(PathBuf::from("/snap/bin/chromium")),
        );
        assert_eq!(preferred, Some(PathBuf::from("/usr/bin/chromium-browser")));
    }

    #[test]
    fn locate_finds_nothing_on_an_empty_system() {
        for platform in [Platform::Windows, Platform::Mac, Platform::Linux] {
            assert_eq!(locate_chrome(platform, |_| None, |_| false, |_| None), None);
        }
    }

    #[tokio::test]
    async fn missing_browser_is_a_version_error() {
        let result = BrowserLocator::new(Platform::Linux, None)
            .browser_version_at(None)
            .await;

        match result {
            Err(WebDriverError::Version(msg)) => assert!(msg.contains("Failed to find Chrome")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn powershell_paths_escape_single_quotes() {
        assert_eq!(
            powershell_quote("C:\\Users\\o'brien\\chrome.exe"),
            "C:\\Users\\o''brien\\chrome.exe"
        );
    }

    #[tokio::test]
    async fn edge_version_is_windows_only() {
        let result = edge_version(Platform::Linux).await;
        assert!(matches!(result, Err(WebDriverError::UnsupportedPlatform(_))));
    }
}
