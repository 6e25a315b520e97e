//! Semantic version triple used by firmware and flight controllers.

use std::fmt;

/// Plain major.minor.patch version with ordinary ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// User-visible version name.
    ///
    /// Firmware builds with minor 99 are pre-releases of the next
    /// major version: 1.99.0 is shown as 2.0.0-beta.1.
    pub fn display_name(&self) -> String {
        if self.minor == 99 {
            format!("{}.0.0-beta.{}", self.major + 1, self.patch + 1)
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
