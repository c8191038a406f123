use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size class of a dyno
///
/// The set is closed. Names are matched ignoring case and punctuation, so
/// `standard-1x`, `standard1x` and `Standard_1X` all refer to
/// [`DynoType::Standard1X`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DynoType {
    Free,
    Hobby,
    Standard1X,
    Standard2X,
    PerformanceM,
    PerformanceL,
}

impl DynoType {
    pub const ALL: [DynoType; 6] = [
        DynoType::Free,
        DynoType::Hobby,
        DynoType::Standard1X,
        DynoType::Standard2X,
        DynoType::PerformanceM,
        DynoType::PerformanceL,
    ];

    /// The name the platform uses for this size
    pub fn as_str(&self) -> &'static str {
        use DynoType::*;
        match *self {
            Free => "free",
            Hobby => "hobby",
            Standard1X => "standard-1x",
            Standard2X => "standard-2x",
            PerformanceM => "performance-m",
            PerformanceL => "performance-l",
        }
    }

    /// Find the dyno type for a loosely written name
    pub fn canonicalize(name: &str) -> Option<DynoType> {
        let key = squash(name);
        DynoType::ALL
            .into_iter()
            .find(|dyno| squash(dyno.as_str()) == key)
    }
}

// lowercase, alphanumerics only
fn squash(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for DynoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dyno type '{0}'")]
pub struct UnknownDynoType(pub String);

impl FromStr for DynoType {
    type Err = UnknownDynoType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DynoType::canonicalize(s).ok_or_else(|| UnknownDynoType(s.to_string()))
    }
}

impl Serialize for DynoType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DynoType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
