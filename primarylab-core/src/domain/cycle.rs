//! Election cycles covered by the dataset.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A Democratic presidential primary season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Cycle {
    Y2016,
    Y2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported election cycle {0} (expected 2016 or 2020)")]
pub struct UnsupportedCycle(pub u16);

impl Cycle {
    pub const ALL: [Cycle; 2] = [Cycle::Y2016, Cycle::Y2020];

    pub fn year(self) -> u16 {
        match self {
            Cycle::Y2016 => 2016,
            Cycle::Y2020 => 2020,
        }
    }

    pub fn from_year(year: u16) -> Option<Self> {
        match year {
            2016 => Some(Cycle::Y2016),
            2020 => Some(Cycle::Y2020),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Cycle {
    type Error = UnsupportedCycle;

    fn try_from(year: u16) -> Result<Self, Self::Error> {
        Cycle::from_year(year).ok_or(UnsupportedCycle(year))
    }
}

impl From<Cycle> for u16 {
    fn from(cycle: Cycle) -> u16 {
        cycle.year()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_roundtrip() {
        for cycle in Cycle::ALL {
            assert_eq!(Cycle::try_from(cycle.year()), Ok(cycle));
        }
    }

    #[test]
    fn rejects_other_years() {
        assert_eq!(Cycle::try_from(2024), Err(UnsupportedCycle(2024)));
    }

    #[test]
    fn serializes_as_year() {
        let json = serde_json::to_string(&Cycle::Y2020).unwrap();
        assert_eq!(json, "2020");
        let parsed: Cycle = serde_json::from_str("2016").unwrap();
        assert_eq!(parsed, Cycle::Y2016);
        assert!(serde_json::from_str::<Cycle>("2008").is_err());
    }
}
