//! Component version parsing and ordering.
//!
//! Versions are a numeric `major.minor.patch` triple with an optional
//! pre-release tag. Accepted tags follow the common Python and semver
//! spellings (`a1`, `-alpha.1`, `b2`, `rc1`, `.dev3`) and all normalize to the
//! same structural form, so `2.0.0-alpha.1` and `2.0.0a1` are equal.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^v?
        (?P<major>0|[1-9]\d*)\.(?P<minor>0|[1-9]\d*)\.(?P<patch>0|[1-9]\d*)
        (?:
            [-_.]?
            (?P<tag>dev|alpha|a|beta|b|rc|c|pre|preview)
            [-_.]?
            (?P<number>\d+)?
        )?
        $",
    )
    .expect("version pattern is valid")
});

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Error returned when a version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string is not a recognizable version.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
}

/// Kind of pre-release tag, ordered from least to most mature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseKind {
    Dev,
    Alpha,
    Beta,
    ReleaseCandidate,
}

/// A pre-release tag such as `a1` or `dev3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    pub kind: PreReleaseKind,
    pub number: u64,
}

/// An immutable, totally ordered component version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<PreRelease>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PreReleaseKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "dev" => Some(Self::Dev),
            "a" | "alpha" => Some(Self::Alpha),
            "b" | "beta" => Some(Self::Beta),
            "rc" | "c" | "pre" | "preview" => Some(Self::ReleaseCandidate),
            _ => None,
        }
    }

    /// Canonical tag used when displaying a version.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::ReleaseCandidate => "rc",
        }
    }
}

impl Version {
    /// The version assumed for a branch that has never been published.
    pub const ZERO: Version = Version::new(0, 0, 0);

    /// Create a release version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Create a pre-release version.
    pub const fn with_pre(major: u64, minor: u64, patch: u64, pre: PreRelease) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Some(pre),
        }
    }

    /// Parse a version string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion(s.to_string());
        let caps = VERSION_PATTERN.captures(s.trim()).ok_or_else(invalid)?;

        let number = |name: &str| -> Result<u64, VersionError> {
            caps.name(name)
                .map_or(Ok(0), |m| m.as_str().parse::<u64>())
                .map_err(|_| invalid())
        };

        let pre = match caps.name("tag") {
            Some(tag) => Some(PreRelease {
                kind: PreReleaseKind::from_tag(tag.as_str()).ok_or_else(invalid)?,
                number: number("number")?,
            }),
            None => None,
        };

        Ok(Self {
            major: number("major")?,
            minor: number("minor")?,
            patch: number("patch")?,
            pre,
        })
    }

    /// Whether this version carries a pre-release tag.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// The pre-release tag, if any.
    pub fn pre(&self) -> Option<PreRelease> {
        self.pre
    }

    /// The `(major, minor, patch)` triple.
    pub fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple()
            .cmp(&other.triple())
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if let Some(pre) = &self.pre {
            s.push_str(&format!("{}{}", pre.kind.tag(), pre.number));
        }
        f.pad(&s)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
