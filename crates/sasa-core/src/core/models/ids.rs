use std::fmt;
use std::str::FromStr;

/// Identifier of the residue that occludes (owns) a sample point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ResidueId(pub i64);

impl fmt::Display for ResidueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResidueId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ResidueId)
    }
}

impl From<i64> for ResidueId {
    fn from(value: i64) -> Self {
        ResidueId(value)
    }
}
