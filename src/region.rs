//! Region codes used for keyword identity.

use serde::{Deserialize, Serialize};

/// Region a keyword was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Tw,
    Hk,
    Jp,
    Kr,
    Us,
    Sg,
    Global,
}

impl Region {
    /// Parse a region code such as "TW" or "us".
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "TW" => Some(Region::Tw),
            "HK" => Some(Region::Hk),
            "JP" => Some(Region::Jp),
            "KR" => Some(Region::Kr),
            "US" => Some(Region::Us),
            "SG" => Some(Region::Sg),
            "GLOBAL" => Some(Region::Global),
            _ => None,
        }
    }

    /// The canonical code string stored in the database.
    pub fn code(&self) -> &'static str {
        match self {
            Region::Tw => "TW",
            Region::Hk => "HK",
            Region::Jp => "JP",
            Region::Kr => "KR",
            Region::Us => "US",
            Region::Sg => "SG",
            Region::Global => "GLOBAL",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Region::from_code(s).ok_or_else(|| format!("Unknown region code: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(Region::from_code("TW"), Some(Region::Tw));
        assert_eq!(Region::from_code("us"), Some(Region::Us));
        assert_eq!(Region::from_code("global"), Some(Region::Global));
        assert_eq!(Region::from_code("XX"), None);
    }

    #[test]
    fn test_round_trip() {
        for code in ["TW", "HK", "JP", "KR", "US", "SG", "GLOBAL"] {
            let region = Region::from_code(code).unwrap();
            assert_eq!(region.code(), code);
        }
    }
}
