//! User context structure for handling caller-related information

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Coarse caller role supplied by the auth collaborator. This subsystem
/// only uses it to gate admin-scoped reads and the restore path; real
/// authorization happens upstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    User,
    Anonymous,
}

impl Default for Role {
    fn default() -> Self {
        Role::Anonymous
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "user" => Ok(Role::User),
            "anonymous" => Ok(Role::Anonymous),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// Caller context containing all user-related information
/// This struct makes it easy to add new fields without changing function signatures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    /// User ID, used for storage-key namespacing
    pub user_id: String,
    /// Coarse role
    pub role: Role,
    /// Optional additional metadata that can be extended in the future
    pub metadata: HashMap<String, String>,
}

impl UserContext {
    /// Create a new UserContext with the default role
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            role: Role::User,
            metadata: HashMap::new(),
        }
    }

    /// Create a new UserContext with an explicit role
    pub fn with_role(user_id: String, role: Role) -> Self {
        Self {
            user_id,
            role,
            metadata: HashMap::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Set a metadata field
    pub fn set_metadata(&mut self, key: String, value: String) {
        self.metadata.insert(key, value);
    }

    /// Get a metadata field
    pub fn get_metadata(&self, key: &str) -> Option<&String> {
        self.metadata.get(key)
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::new("default_user".to_string())
    }
}
