use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a participant (the platform account id).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    /// Display name with colour codes stripped. Empty until the client has loaded.
    #[serde(default)]
    pub name: String
}

impl Participant {
    pub fn new(id: u64, name: &str) -> Participant {
        Participant {
            id: ParticipantId(id),
            name: name.to_string()
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}
