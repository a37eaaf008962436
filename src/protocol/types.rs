use serde::{Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Length of the random suffix appended to every generated client id.
pub const CLIENT_ID_SUFFIX_LEN: usize = 9;

/// Opaque identifier assigned to a connection when it is accepted.
///
/// Ids are never reused within a process: each one embeds a monotonically
/// increasing sequence number followed by a random alphanumeric suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Arc<str>);

impl ClientId {
    /// Build an id from a sequence number, drawing the suffix from `fastrand`.
    pub fn generate(sequence: u64) -> Self {
        let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(CLIENT_ID_SUFFIX_LEN)
            .collect();
        Self(Arc::from(format!("client_{sequence:x}_{suffix}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for ClientId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
