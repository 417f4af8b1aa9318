//! Version parsing and vulnerable-range matching
//!
//! Versions compare as `(major, minor, patch)` tuples. Parsing is lossy on
//! purpose: every character outside `[0-9.]` is dropped first, so
//! `1.2.3-beta` and `^1.2.3` both read as `1.2.3`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `None` when the sanitized input does not start with a digit.
    pub fn parse(input: &str) -> Option<Self> {
        let sanitized: String = input
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        if !sanitized.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        let mut parts = [0u64; 3];
        for (slot, component) in parts.iter_mut().zip(sanitized.split('.')) {
            if component.is_empty() {
                continue;
            }
            *slot = component.parse().ok()?;
        }

        Some(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_or_above: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<String>,
}

impl VersionRange {
    pub fn new(at_or_above: Option<&str>, below: Option<&str>) -> Self {
        Self {
            at_or_above: at_or_above.map(str::to_string),
            below: below.map(str::to_string),
        }
    }

    /// A range with no bounds, or with a bound that does not parse, contains nothing.
    pub fn contains(&self, version: &Version) -> bool {
        if self.at_or_above.is_none() && self.below.is_none() {
            return false;
        }

        if let Some(lower) = &self.at_or_above {
            match Version::parse(lower) {
                Some(lower) if *version >= lower => {}
                _ => return false,
            }
        }

        if let Some(upper) = &self.below {
            match Version::parse(upper) {
                Some(upper) if *version < upper => {}
                _ => return false,
            }
        }

        true
    }
}

pub fn is_vulnerable(version: &str, ranges: &[VersionRange]) -> bool {
    let Some(version) = Version::parse(version) else {
        return false;
    };

    ranges.iter().any(|range| range.contains(&version))
}
