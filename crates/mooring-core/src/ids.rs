//! Project and session identifiers
//!
//! Explicit validation on construction, immutable after creation.
//!
//! Storage is namespaced per project; every checkpoint and memory item
//! is owned by a `(ProjectId, SessionId)` pair and nothing references
//! state across that boundary.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

fn valid_chars(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Identifier for a project namespace
///
/// Sanitized on construction: key prefixes (the "table names" of the
/// persistence layer) are derived from it, so only alphanumerics,
/// dash, underscore, and dot are allowed.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a new ProjectId with validation
    ///
    /// # Errors
    /// Returns error if the id is empty, exceeds the length limit, or
    /// contains characters unsafe for storage namespacing.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidProjectId {
                id,
                reason: "project id must not be empty".into(),
            });
        }

        if id.len() > PROJECT_ID_LENGTH_BYTES_MAX {
            return Err(Error::InvalidProjectId {
                reason: format!(
                    "length {} exceeds limit {}",
                    id.len(),
                    PROJECT_ID_LENGTH_BYTES_MAX
                ),
                id,
            });
        }

        if !valid_chars(&id) {
            return Err(Error::InvalidProjectId {
                id,
                reason: "contains invalid characters".into(),
            });
        }

        Ok(Self(id))
    }

    /// Get the id as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an agent session within a project
///
/// Many checkpoints and memory items belong to one session; one
/// logical agent process drives one session at a time.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId with validation
    ///
    /// # Errors
    /// Returns error if the id is empty, exceeds the length limit, or
    /// contains characters unsafe for storage keys.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidSessionId {
                id,
                reason: "session id must not be empty".into(),
            });
        }

        if id.len() > SESSION_ID_LENGTH_BYTES_MAX {
            return Err(Error::InvalidSessionId {
                reason: format!(
                    "length {} exceeds limit {}",
                    id.len(),
                    SESSION_ID_LENGTH_BYTES_MAX
                ),
                id,
            });
        }

        if !valid_chars(&id) {
            return Err(Error::InvalidSessionId {
                id,
                reason: "contains invalid characters".into(),
            });
        }

        Ok(Self(id))
    }

    /// Get the id as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_valid() {
        let id = ProjectId::new("my-project.v2").unwrap();
        assert_eq!(id.as_str(), "my-project.v2");
    }

    #[test]
    fn test_project_id_invalid_chars() {
        assert!(ProjectId::new("proj/1").is_err());
        assert!(ProjectId::new("proj 1").is_err());
    }

    #[test]
    fn test_project_id_empty() {
        assert!(ProjectId::new("").is_err());
    }

    #[test]
    fn test_project_id_too_long() {
        let long = "a".repeat(PROJECT_ID_LENGTH_BYTES_MAX + 1);
        assert!(matches!(
            ProjectId::new(long),
            Err(Error::InvalidProjectId { .. })
        ));
    }

    #[test]
    fn test_session_id_valid() {
        let id = SessionId::new("session_123").unwrap();
        assert_eq!(id.to_string(), "session_123");
    }

    #[test]
    fn test_session_id_invalid() {
        assert!(SessionId::new("s:1").is_err());
        assert!(SessionId::new("").is_err());
    }
}
