pub mod memory;

use thiserror::Error;

use crate::model::structures::{category::Category, participant::ParticipantId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize store: {0}")]
    Serialization(#[from] serde_json::Error)
}

/// The server's persistent key-value store.
///
/// Only consulted when the in-memory store has nothing, so implementations may be slow but
/// must not block for long.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);

    /// Returns true if the key existed.
    fn delete(&mut self, key: &str) -> bool;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// `rating:{participant}:{category}`, holding an integer rating.
pub fn rating_key(participant: ParticipantId, category: Category) -> String {
    format!("rating:{}:{}", participant, category)
}

/// `oldname:{participant}`, holding the name to look the participant up by.
pub fn alias_key(participant: ParticipantId) -> String {
    format!("oldname:{}", participant)
}
