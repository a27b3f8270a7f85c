//! Dotted numeric versions as used by browsers and their drivers.
//!
//! Equality is structural: `70.0.3538` and `70.0.3538.0` are different values.
//! Ordering treats missing trailing segments as zero and only falls back to the
//! segment count when the padded segments tie, which keeps `Ord` consistent
//! with `Eq`. Use [`Version::cmp_padded`] for the pure zero-padded comparison.

use crate::error::WebDriverError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

static STRICT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("Invalid STRICT_RE regex"));

// Google Chrome 73.0.3683.75 -> 73.0.3683.75, ChromeDriver 2.46.628411 -> 2.46.628411
static EMBEDDED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d+(\.\d+)?(\.\d+)?").expect("Invalid EMBEDDED_RE regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Parses a strictly numeric dotted string. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, WebDriverError> {
        let trimmed = input.trim();
        if !STRICT_RE.is_match(trimmed) {
            return Err(WebDriverError::VersionParse {
                input: input.to_string(),
            });
        }

        let segments = trimmed
            .split('.')
            .map(|s| s.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| WebDriverError::VersionParse {
                input: input.to_string(),
            })?;

        Ok(Self { segments })
    }

    /// Finds the first version-looking run inside arbitrary command output.
    pub fn extract(text: &str) -> Result<Self, WebDriverError> {
        let found = EMBEDDED_RE
            .find(text)
            .ok_or_else(|| WebDriverError::VersionParse {
                input: text.trim().to_string(),
            })?;
        Self::parse(found.as_str())
    }

    pub fn from_segments(segments: Vec<u64>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn major(&self) -> u64 {
        self.segments.first().copied().unwrap_or(0)
    }

    /// Truncates to `major.minor.build`, the prefix used to find a compatible driver.
    ///
    /// `73.0.3683.75` becomes `73.0.3683`. Shorter versions are returned as-is.
    pub fn release_line(&self) -> Self {
        Self {
            segments: self.segments.iter().take(3).copied().collect(),
        }
    }

    /// Compares with missing trailing segments treated as zero.
    pub fn cmp_padded(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| {
                let a = self.segments.get(i).copied().unwrap_or(0);
                let b = other.segments.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    pub fn is_older_than(&self, other: &Self) -> bool {
        self.cmp_padded(other) == Ordering::Less
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_padded(other)
            .then_with(|| self.segments.len().cmp(&other.segments.len()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = WebDriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}
