//! User identification.
//!
//! Players are addressed by an opaque string id assigned by the host
//! (account id, session id, bot name). The engine only compares and orders
//! them; it never parses them.

use serde::{Deserialize, Serialize};

/// Opaque user identifier.
///
/// Ordered so it can key `BTreeMap`s deterministically - patch output and
/// playerboard iteration must not depend on hash order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_basics() {
        let id = UserId::new("alice");
        assert_eq!(id.as_str(), "alice");
        assert_eq!(format!("{}", id), "alice");
    }

    #[test]
    fn test_user_id_ordering() {
        let mut ids = vec![UserId::new("carol"), UserId::new("alice"), UserId::new("bob")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "alice");
        assert_eq!(ids[2].as_str(), "carol");
    }

    #[test]
    fn test_user_id_serde() {
        let id = UserId::new("bot-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"bot-1\"");

        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
