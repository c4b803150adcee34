use std::collections::HashMap;

use crate::model::structures::{category::Category, participant::ParticipantId};

/// In-memory ratings for the lifetime of the process.
///
/// Absence of an entry means "not rated yet", never zero. Reads through [`RatingStore::get`]
/// fall back to the configured default so balancing can always produce a number.
pub struct RatingStore {
    ratings: HashMap<ParticipantId, HashMap<Category, i32>>,
    default_rating: i32
}

impl RatingStore {
    pub fn new(default_rating: i32) -> RatingStore {
        RatingStore {
            ratings: HashMap::new(),
            default_rating
        }
    }

    pub fn has(&self, participant: ParticipantId, category: Category) -> bool {
        self.rating(participant, category).is_some()
    }

    /// The stored rating, if any.
    pub fn rating(&self, participant: ParticipantId, category: Category) -> Option<i32> {
        self.ratings
            .get(&participant)
            .and_then(|by_category| by_category.get(&category))
            .copied()
    }

    pub fn get(&self, participant: ParticipantId, category: Category) -> i32 {
        self.rating(participant, category).unwrap_or(self.default_rating)
    }

    pub fn set(&mut self, participant: ParticipantId, category: Category, rating: i32) {
        self.ratings.entry(participant).or_default().insert(category, rating);
    }

    /// Stores the default rating for a participant that could not be resolved.
    pub fn set_default(&mut self, participant: ParticipantId, category: Category) {
        self.set(participant, category, self.default_rating);
    }

    pub fn remove(&mut self, participant: ParticipantId, category: Category) {
        if let Some(by_category) = self.ratings.get_mut(&participant) {
            by_category.remove(&category);
            if by_category.is_empty() {
                self.ratings.remove(&participant);
            }
        }
    }

    pub fn default_rating(&self) -> i32 {
        self.default_rating
    }

    /// Participants in `participants` without a stored rating, in input order.
    pub fn missing(&self, participants: &[ParticipantId], category: Category) -> Vec<ParticipantId> {
        participants
            .iter()
            .filter(|p| !self.has(**p, category))
            .copied()
            .collect()
    }
}
