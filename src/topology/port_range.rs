// Port ranges used by firewall rules and flow matrix lines

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AttackGraphError, Result};

/// Either every port, or the inclusive range `min..=max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    pub any: bool,
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    pub fn any() -> Self {
        Self { any: true, min: 0, max: 0 }
    }

    pub fn new(min: u16, max: u16) -> Self {
        Self { any: false, min, max }
    }

    pub fn single(port: u16) -> Self {
        Self::new(port, port)
    }

    pub fn in_range(&self, port: u16) -> bool {
        self.any || (port >= self.min && port <= self.max)
    }

    /// Whether `other` lies completely inside this range
    pub fn contains_range(&self, other: &PortRange) -> bool {
        self.any || (other.max <= self.max && other.min >= self.min)
    }
}

fn parse_port(value: &str, original: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| AttackGraphError::InvalidPortRange(original.to_string()))
}

impl FromStr for PortRange {
    type Err = AttackGraphError;

    /// Accepts "any", "all", "*", "min-max", "httpport" or a single port
    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.to_lowercase();
        if lowered.contains("any") || lowered.contains("all") || lowered.contains('*') {
            Ok(Self::any())
        } else if let Some((min, max)) = lowered.split_once('-') {
            Ok(Self::new(parse_port(min, value)?, parse_port(max, value)?))
        } else if lowered.contains("httpport") {
            Ok(Self::single(80))
        } else {
            Ok(Self::single(parse_port(&lowered, value)?))
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = AttackGraphError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PortRange> for String {
    fn from(value: PortRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.any {
            write!(f, "any")
        } else if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}
