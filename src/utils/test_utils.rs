use std::{
    collections::HashMap,
    sync::{Arc, Mutex}
};

use futures::future::BoxFuture;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    api::{api_structs::LookupResults, LookupError, RatingLookup},
    database::{memory::MemoryStore, rating_key, KeyValueStore},
    host::{roster::RosterHost, Teams},
    model::structures::{category::Category, participant::Participant}
};

/// A scripted rating service.
///
/// Answers with the configured ratings for the requested names (case-insensitively, with the
/// capitalisation the script uses) and records every batch it was asked for.
#[derive(Clone, Default)]
pub struct StubLookup {
    ratings: Arc<Mutex<LookupResults>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    failing: bool
}

impl StubLookup {
    pub fn new() -> StubLookup {
        StubLookup::default()
    }

    /// Every lookup fails with a 503.
    pub fn failing() -> StubLookup {
        StubLookup {
            failing: true,
            ..StubLookup::default()
        }
    }

    pub fn with_rating(self, name: &str, category: Category, rating: i32) -> StubLookup {
        if let Ok(mut ratings) = self.ratings.lock() {
            ratings.entry(name.to_string()).or_default().insert(category, rating);
        }
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn answer(&self, names: &[String]) -> Result<LookupResults, LookupError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(names.to_vec());
        }

        if self.failing {
            return Err(LookupError::Status(503));
        }

        let ratings = self.ratings.lock().map(|r| r.clone()).unwrap_or_default();

        Ok(ratings
            .into_iter()
            .filter(|(nick, _)| names.iter().any(|name| name.eq_ignore_ascii_case(nick)))
            .collect())
    }
}

impl RatingLookup for StubLookup {
    fn lookup(&self, names: Vec<String>) -> BoxFuture<'static, Result<LookupResults, LookupError>> {
        let stub = self.clone();
        Box::pin(async move { stub.answer(&names) })
    }
}

/// `red` and `blue` participants named `player{id}`, ids counting up from 1.
pub fn generate_teams(red: usize, blue: usize) -> Teams {
    let participant = |id: usize| Participant::new(id as u64, &format!("player{}", id));

    Teams {
        red: (1..=red).map(participant).collect(),
        blue: (red + 1..=red + blue).map(participant).collect(),
        ..Teams::default()
    }
}

/// Persisted ratings drawn uniformly from `low..=high` for everyone in `teams`.
pub fn generate_store(teams: &Teams, category: Category, low: i32, high: i32, seed: u64) -> MemoryStore {
    // Seeded so failures reproduce
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut store = MemoryStore::new();

    for id in teams.everyone() {
        let rating = rng.random_range(low..=high);
        store.set(&rating_key(id, category), &rating.to_string());
    }

    store
}

/// A host holding `red` + `blue` generated participants with persisted random ratings.
pub fn generate_roster(red: usize, blue: usize, category: Category, seed: u64) -> (RosterHost, MemoryStore) {
    let teams = generate_teams(red, blue);
    let store = generate_store(&teams, category, 800, 2400, seed);

    (RosterHost::from_teams(teams, category), store)
}

/// Ratings as a service payload would report them, keyed by nick.
pub fn lookup_results(entries: &[(&str, Category, i32)]) -> LookupResults {
    let mut results: LookupResults = HashMap::new();

    for (nick, category, rating) in entries {
        results.entry(nick.to_string()).or_default().insert(*category, *rating);
    }

    results
}
