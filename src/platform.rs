//! Target client platforms.

use std::fmt;

use crate::Error;

/// Platform is a client dialect that producers can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Quantumult X
    Qx,
    /// Surge
    Surge,
    /// Loon
    Loon,
    /// Clash
    Clash,
}

impl Platform {
    /// All registered platforms.
    pub const ALL: [Platform; 4] = [Platform::Qx, Platform::Surge, Platform::Loon, Platform::Clash];

    /// Get the string representation, as used in capability maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Qx => "QX",
            Platform::Surge => "Surge",
            Platform::Loon => "Loon",
            Platform::Clash => "Clash",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "QX" | "QUANTUMULTX" => Ok(Platform::Qx),
            "SURGE" => Ok(Platform::Surge),
            "LOON" => Ok(Platform::Loon),
            "CLASH" => Ok(Platform::Clash),
            _ => Err(Error::UnsupportedPlatform(s.to_string())),
        }
    }
}
