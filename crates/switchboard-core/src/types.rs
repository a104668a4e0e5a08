use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// A backend capability the console can route a prompt to.
///
/// Declaration order is the canonical fan-out order and the iteration order of
/// any `BTreeSet<Target>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Retrieval / question answering over documents and policies.
    Knowledge,
    /// Query generation, tabular answers and charts.
    Analytics,
    /// Issue tracker digests, tickets and standups.
    Tasks,
}

impl Target {
    /// Every target, in declaration order.
    pub const ALL: [Target; 3] = [Target::Knowledge, Target::Analytics, Target::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Knowledge => "knowledge",
            Target::Analytics => "analytics",
            Target::Tasks => "tasks",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knowledge" => Ok(Target::Knowledge),
            "analytics" => Ok(Target::Analytics),
            "tasks" => Ok(Target::Tasks),
            other => Err(format!("unknown target: {}", other)),
        }
    }
}

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

/// Identifier of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of one analytics stream within a session.
///
/// Issued in increasing order; a stream id is never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_target_serde_snake_case() {
        let json = serde_json::to_string(&Target::Analytics).unwrap();
        assert_eq!(json, "\"analytics\"");
        let back: Target = serde_json::from_str("\"tasks\"").unwrap();
        assert_eq!(back, Target::Tasks);
    }

    #[test]
    fn test_target_all_is_declaration_order() {
        assert_eq!(
            Target::ALL,
            [Target::Knowledge, Target::Analytics, Target::Tasks]
        );
    }

    #[test]
    fn test_target_set_iterates_in_declaration_order() {
        let set: BTreeSet<Target> = [Target::Tasks, Target::Knowledge, Target::Analytics]
            .into_iter()
            .collect();
        let ordered: Vec<Target> = set.into_iter().collect();
        assert_eq!(ordered, Target::ALL.to_vec());
    }

    #[test]
    fn test_target_from_str() {
        assert_eq!("Knowledge".parse::<Target>().unwrap(), Target::Knowledge);
        assert_eq!(" tasks ".parse::<Target>().unwrap(), Target::Tasks);
        assert!("mixed".parse::<Target>().is_err());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::Analytics.to_string(), "analytics");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_stream_id_ordering_and_display() {
        assert!(StreamId(1) < StreamId(2));
        assert_eq!(StreamId(7).to_string(), "stream-7");
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Timestamp::now();
        assert_eq!(ts.to_datetime().timestamp(), ts.0);
    }
}
