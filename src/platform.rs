//! Host platform detection.

use crate::error::WebDriverError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Mac,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86,
    X86_64,
    Aarch64,
}

impl Platform {
    /// Detects the platform this process runs on.
    pub fn current() -> Result<Self, WebDriverError> {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Result<Self, WebDriverError> {
        match os {
            "windows" => Ok(Platform::Windows),
            "macos" => Ok(Platform::Mac),
            "linux" => Ok(Platform::Linux),
            other => Err(WebDriverError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Appends the executable extension used on this platform.
    pub fn executable_name(&self, stem: &str) -> String {
        match self {
            Platform::Windows => format!("{}.exe", stem),
            Platform::Mac | Platform::Linux => stem.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "windows",
            Platform::Mac => "mac",
            Platform::Linux => "linux",
        };
        f.write_str(name)
    }
}

impl Arch {
    pub fn current() -> Result<Self, WebDriverError> {
        match std::env::consts::ARCH {
            "x86" => Ok(Arch::X86),
            "x86_64" => Ok(Arch::X86_64),
            "aarch64" => Ok(Arch::Aarch64),
            other => Err(WebDriverError::UnsupportedPlatform(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_os_maps_known_families() {
        assert_eq!(Platform::from_os("windows").unwrap(), Platform::Windows);
        assert_eq!(Platform::from_os("macos").unwrap(), Platform::Mac);
        assert_eq!(Platform::from_os("linux").unwrap(), Platform::Linux);
        assert!(matches!(
            Platform::from_os("freebsd"),
            Err(WebDriverError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn executable_name_adds_exe_only_on_windows() {
        assert_eq!(Platform::Windows.executable_name("chromedriver"), "chromedriver.exe");
        assert_eq!(Platform::Linux.executable_name("chromedriver"), "chromedriver");
        assert_eq!(Platform::Mac.executable_name("chromedriver"), "chromedriver");
    }
}
