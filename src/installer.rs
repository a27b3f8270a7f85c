//! Downloads a driver archive and places the executable atomically.
//!
//! Everything is staged in a temporary directory inside the install directory,
//! so the final `rename` stays on one filesystem and readers never observe a
//! partially written binary. Any previous binary is replaced, not merged.

use crate::error::WebDriverError;
use crate::network::Network;
use crate::version::Version;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Suffix of the file recording the installed version next to the binary.
pub const VERSION_RECORD_SUFFIX: &str = ".version";

#[derive(Debug, Clone)]
pub struct Installer<'a> {
    network: &'a Network,
    install_dir: PathBuf,
    file_name: String,
}

impl<'a> Installer<'a> {
    pub fn new(network: &'a Network, install_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            network,
            install_dir: install_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(&self.file_name)
    }

    pub fn version_record_path(&self) -> PathBuf {
        self.install_dir
            .join(format!("{}{}", self.file_name, VERSION_RECORD_SUFFIX))
    }

    /// The binary this installer owns, whether or not it exists yet.
    pub fn binary(&self) -> DriverBinary {
        DriverBinary {
            path: self.binary_path(),
            record: self.version_record_path(),
        }
    }

    /// Installs `version` from `url` and returns the path of the executable.
    pub async fn install(&self, version: &Version, url: &str) -> Result<PathBuf, WebDriverError> {
        fs::create_dir_all(&self.install_dir)
            .await
            .map_err(|e| WebDriverError::io(&self.install_dir, e))?;

        let temp_dir = tempfile::Builder::new()
            .prefix(".webdrivers-")
            .tempdir_in(&self.install_dir)
            .map_err(|e| WebDriverError::io(&self.install_dir, e))?;

        let archive_path = temp_dir.path().join(archive_name(url));
        self.network.download(url, &archive_path).await?;

        let staged = if is_zip(&archive_path) {
            let extract_to = temp_dir.path().join("extracted");
            unzip_file(&archive_path, &extract_to).await?;
            find_driver_executable(&extract_to, &self.file_name)?
        } else {
            archive_path
        };

        make_executable(&staged)?;

        let binary = self.binary_path();
        fs::rename(&staged, &binary)
            .await
            .map_err(|e| WebDriverError::io(&binary, e))?;

        let record = self.version_record_path();
        fs::write(&record, version.to_string())
            .await
            .map_err(|e| WebDriverError::io(&record, e))?;

        info!(path = %binary.display(), version = %version, "installed driver");
        Ok(binary)
    }

    pub async fn recorded_version(&self) -> Option<Version> {
        self.binary().recorded_version().await
    }

    /// Deletes the binary and its version record. Missing files are fine.
    pub async fn remove(&self) -> Result<(), WebDriverError> {
        for path in [self.binary_path(), self.version_record_path()] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(WebDriverError::io(path, e)),
            }
        }
        Ok(())
    }
}

/// An installed (or expected) driver executable. Read-only outside the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverBinary {
    path: PathBuf,
    record: PathBuf,
}

impl DriverBinary {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Version written by the last successful install, if readable.
    pub async fn recorded_version(&self) -> Option<Version> {
        let content = fs::read_to_string(&self.record).await.ok()?;
        Version::parse(&content).ok()
    }
}

fn archive_name(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
        .to_string()
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), WebDriverError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| WebDriverError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), WebDriverError> {
    Ok(())
}

/// Decompresses a .zip archive to a specified directory.
///
/// The core zip logic is synchronous, so we wrap it in `spawn_blocking` to
/// avoid blocking the Tokio runtime.
pub async fn unzip_file(archive_path: &Path, extract_to: &Path) -> Result<(), WebDriverError> {
    let archive_path_buf = archive_path.to_path_buf();
    let extract_to_buf = extract_to.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path_buf)
            .map_err(|e| WebDriverError::io(&archive_path_buf, e))?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| WebDriverError::Zip {
            path: archive_path_buf.clone(),
            source: e,
        })?;

        std::fs::create_dir_all(&extract_to_buf)
            .map_err(|e| WebDriverError::io(&extract_to_buf, e))?;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| WebDriverError::Zip {
                path: archive_path_buf.clone(),
                source: e,
            })?;

            // Entries escaping the target directory are skipped.
            let outpath = match file.enclosed_name() {
                Some(path) => extract_to_buf.join(path),
                None => continue,
            };

            if file.is_dir() {
                std::fs::create_dir_all(&outpath).map_err(|e| WebDriverError::io(&outpath, e))?;
                continue;
            }

            if let Some(p) = outpath.parent() {
                std::fs::create_dir_all(p).map_err(|e| WebDriverError::io(p, e))?;
            }

            let mut outfile =
                std::fs::File::create(&outpath).map_err(|e| WebDriverError::io(&outpath, e))?;
            std::io::copy(&mut file, &mut outfile).map_err(|e| WebDriverError::io(&outpath, e))?;
        }
        Ok(())
    })
    .await?
}

/// Searches a directory for the driver executable file. Archives may nest it
/// in a top-level directory.
fn find_driver_executable(search_path: &Path, file_name: &str) -> Result<PathBuf, WebDriverError> {
    for entry in WalkDir::new(search_path) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(search_path).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("WalkDir error"));
            WebDriverError::io(path, source)
        })?;
        if entry.file_type().is_file() && entry.file_name().to_str() == Some(file_name) {
            return Ok(entry.path().to_path_buf());
        }
    }

    Err(WebDriverError::DriverExecutableNotFound {
        path: search_path.join(file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default().unix_permissions(0o644))
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn archive_name_uses_last_path_segment() {
        assert_eq!(
            archive_name("https://host/2.46/chromedriver_linux64.zip?x=1"),
            "chromedriver_linux64.zip"
        );
        assert_eq!(archive_name("https://host/"), "download");
    }

    #[tokio::test]
    async fn install_extracts_nested_executable_and_records_version() {
        let mut server = Server::new_async().await;
        let body = zip_with(&[
            ("chromedriver-linux64/LICENSE.chromedriver", b"license"),
            ("chromedriver-linux64/chromedriver", b"binary"),
        ]);
        let _mock = server
            .mock("GET", "/115.0.5790.170/chromedriver-linux64.zip")
            .with_body(body)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let network = Network::default();
        let installer = Installer::new(&network, dir.path(), "chromedriver");

        let path = installer
            .install(
                &v("115.0.5790.170"),
                &format!("{}/115.0.5790.170/chromedriver-linux64.zip", server.url()),
            )
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("chromedriver"));
        assert_eq!(std::fs::read(&path).unwrap(), b"binary");
        assert_eq!(installer.recorded_version().await, Some(v("115.0.5790.170")));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }

        // Staging directories are cleaned up.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".webdrivers-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn install_replaces_previous_binary() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/MicrosoftWebDriver.exe")
            .with_body("new binary")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MicrosoftWebDriver.exe"), "old binary").unwrap();
        let network = Network::default();
        let installer = Installer::new(&network, dir.path(), "MicrosoftWebDriver.exe");

        let path = installer
            .install(&v("17134"), &format!("{}/MicrosoftWebDriver.exe", server.url()))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "new binary");
        assert_eq!(installer.recorded_version().await, Some(v("17134")));
    }

    #[tokio::test]
    async fn archive_without_executable_fails_and_keeps_old_binary() {
        let mut server = Server::new_async().await;
        let body = zip_with(&[("README", b"nothing useful")]);
        let _mock = server
            .mock("GET", "/chromedriver_linux64.zip")
            .with_body(body)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chromedriver"), "old binary").unwrap();
        let network = Network::default();
        let installer = Installer::new(&network, dir.path(), "chromedriver");

        let result = installer
            .install(&v("2.46"), &format!("{}/chromedriver_linux64.zip", server.url()))
            .await;

        assert!(matches!(result, Err(WebDriverError::DriverExecutableNotFound { .. })));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("chromedriver")).unwrap(),
            "old binary"
        );
    }

    #[tokio::test]
    async fn unreachable_download_is_a_connection_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/chromedriver_linux64.zip")
            .with_status(404)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let network = Network::default();
        let installer = Installer::new(&network, dir.path(), "chromedriver");

        let result = installer
            .install(&v("2.46"), &format!("{}/chromedriver_linux64.zip", server.url()))
            .await;

        assert!(result.unwrap_err().is_connection_error());
        assert!(!installer.binary_path().exists());
    }

    #[tokio::test]
    async fn remove_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let network = Network::default();
        let installer = Installer::new(&network, dir.path(), "chromedriver");
        std::fs::write(installer.binary_path(), "binary").unwrap();

        installer.remove().await.unwrap();
        installer.remove().await.unwrap();

        assert!(!installer.binary_path().exists());
    }
}
