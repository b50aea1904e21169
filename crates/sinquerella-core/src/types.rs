use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one reporting session
///
/// Every artifact in the session store is scoped by this id. A session lives
/// from the diagram selection until completion or abandonment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a fresh random session id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which vehicle of the diagram the reporting driver was driving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverRole {
    /// Vehicle "A" of the diagram
    A,
    /// Vehicle "B" of the diagram
    B,
}

impl DriverRole {
    /// The role of the other party
    #[inline]
    pub fn counterpart(self) -> Self {
        match self {
            DriverRole::A => DriverRole::B,
            DriverRole::B => DriverRole::A,
        }
    }
}

impl fmt::Display for DriverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverRole::A => f.write_str("A"),
            DriverRole::B => f.write_str("B"),
        }
    }
}
