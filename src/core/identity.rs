//! Simulation run identifiers
//!
//! Runs are identified as `RUN-<ULID>`, so ids sort by creation time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Prefix for simulation run ids
pub const RUN_PREFIX: &str = "RUN";

/// Unique id of a persisted simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(Ulid);

#[derive(Debug, Error, PartialEq)]
pub enum IdParseError {
    #[error("Run id must start with 'RUN-', got '{0}'")]
    MissingPrefix(String),

    #[error("Invalid ULID in run id '{0}'")]
    InvalidUlid(String),
}

impl RunId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", RUN_PREFIX, self.0)
    }
}

impl FromStr for RunId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (prefix, ulid) = trimmed
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingPrefix(s.to_string()))?;
        if !prefix.eq_ignore_ascii_case(RUN_PREFIX) {
            return Err(IdParseError::MissingPrefix(s.to_string()));
        }
        Ulid::from_string(&ulid.to_ascii_uppercase())
            .map(RunId)
            .map_err(|_| IdParseError::InvalidUlid(s.to_string()))
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_display_and_parse() {
        let id = RunId::new();
        let s = id.to_string();
        assert!(s.starts_with("RUN-"));
        assert_eq!(s.len(), 30);
        assert_eq!(s.parse::<RunId>().unwrap(), id);
        assert_eq!(s.to_lowercase().parse::<RunId>().unwrap(), id);
    }

    #[test]
    fn test_run_id_rejects_garbage() {
        assert!(matches!(
            "REQ-01ARZ3NDEKTSV4RRFFQ69G5FAV".parse::<RunId>(),
            Err(IdParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            "RUN-not-a-ulid".parse::<RunId>(),
            Err(IdParseError::InvalidUlid(_))
        ));
        assert!("".parse::<RunId>().is_err());
    }

    #[test]
    fn test_run_id_json() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
