use crate::SchemaError;
use serde::{Deserialize, Serialize};

/// Name of the highest-privilege user. Always holds ID 0.
pub const ROOT_USER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
}

impl User {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// ID to assign to `name` given the users already known: the existing ID
    /// when present, 0 for root, otherwise one past the current maximum.
    pub fn next_id(existing: &[User], name: &str) -> Result<(u32, bool), SchemaError> {
        if let Some(user) = existing.iter().find(|u| u.name == name) {
            return Ok((user.id, false));
        }
        if name == ROOT_USER {
            return Ok((0, true));
        }
        let Some(max) = existing.iter().map(|u| u.id).max() else {
            return Ok((1, true));
        };
        let next = max
            .checked_add(1)
            .ok_or_else(|| SchemaError::UserIdsExhausted(name.to_owned()))?;
        Ok((next.max(1), true))
    }
}
