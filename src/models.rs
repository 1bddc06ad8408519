use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::service::Entity;

/// Role
///
/// The closed set of roles the backend assigns to an account. Used for
/// Role-Based Access Control by the navigation guard and `can_manage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Librarian,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Librarian => "Librarian",
            Role::User => "User",
        }
    }

    /// Admins and librarians may create, edit and delete catalogue entries.
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Admin | Role::Librarian)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Librarian" => Ok(Role::Librarian),
            "User" => Ok(Role::User),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

/// AuthorRecord
///
/// An author as served by `GET /author`. Identity is the server-assigned `id`;
/// a record without one has not been created yet.
///
/// Only `name` is typed. Every other descriptive field the backend returns is
/// kept in `details` and sent back unchanged on update. A missing or `null`
/// name reads as empty so one incomplete row does not fail a whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AuthorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl AuthorRecord {
    /// A record pending creation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            details: Map::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl Entity for AuthorRecord {
    const ENDPOINT: &'static str = "/author";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
