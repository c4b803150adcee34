use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api::{api_structs::LookupResults, LookupError},
    model::{
        resolver::RequestId,
        structures::{category::Category, participant::ParticipantId}
    }
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupId(Uuid);

impl LookupId {
    pub fn new() -> LookupId {
        LookupId(Uuid::new_v4())
    }
}

impl Default for LookupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameStatus {
    Pending(LookupId),
    Found(HashMap<Category, i32>),
    Failed
}

impl NameStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NameStatus::Pending(_) => "pending",
            NameStatus::Found(_) => "found",
            NameStatus::Failed => "failed"
        }
    }
}

#[derive(Debug, Clone)]
pub struct NameEntry {
    pub claimant: ParticipantId,
    pub status: NameStatus
}

/// What a participant gets when it asks for a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClaim {
    /// The name resolved with a rating for the requested category.
    Rated(i32),
    /// The lookup finished without a rating for the requested category.
    Unrated,
    Pending(LookupId),
    /// Another participant already owns the name.
    Collision { owner: ParticipantId },
    Unclaimed
}

/// One outstanding batched query. Released on completion whatever the outcome.
#[derive(Debug)]
pub struct PendingLookup {
    pub id: LookupId,
    pub category: Category,
    pub names: Vec<(ParticipantId, String)>,
    pub waiters: Vec<RequestId>
}

/// Work handed to the lookup worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupJob {
    pub id: LookupId,
    pub names: Vec<String>
}

#[derive(Debug)]
pub struct CompletedLookup {
    pub category: Category,
    pub waiters: Vec<RequestId>,
    pub found: Vec<String>,
    pub failed: Vec<String>
}

/// Deduplicates outbound lookups by normalized name.
///
/// Entries live for the whole process and double as a cache across categories: a name that
/// was found once answers every later request without another network round trip.
#[derive(Default)]
pub struct NameResolutionTracker {
    entries: IndexMap<String, NameEntry>,
    lookups: HashMap<LookupId, PendingLookup>
}

impl NameResolutionTracker {
    pub fn new() -> NameResolutionTracker {
        NameResolutionTracker::default()
    }

    pub fn entry(&self, name: &str) -> Option<&NameEntry> {
        self.entries.get(name)
    }

    pub fn is_found(&self, name: &str) -> bool {
        matches!(self.entries.get(name).map(|e| &e.status), Some(NameStatus::Found(_)))
    }

    pub fn pending_lookups(&self) -> usize {
        self.lookups.len()
    }

    pub fn claim(&self, name: &str, participant: ParticipantId, category: Category) -> NameClaim {
        let Some(entry) = self.entries.get(name) else {
            return NameClaim::Unclaimed;
        };

        if entry.claimant != participant {
            return NameClaim::Collision { owner: entry.claimant };
        }

        match &entry.status {
            NameStatus::Pending(id) => NameClaim::Pending(*id),
            NameStatus::Found(ratings) => match ratings.get(&category) {
                Some(rating) => NameClaim::Rated(*rating),
                None => NameClaim::Unrated
            },
            NameStatus::Failed => NameClaim::Unrated
        }
    }

    /// Claims every name for its participant and groups them into one lookup.
    pub fn start_lookup(
        &mut self,
        category: Category,
        claims: Vec<(ParticipantId, String)>,
        waiter: RequestId
    ) -> LookupJob {
        let id = LookupId::new();

        for (participant, name) in &claims {
            self.entries.insert(
                name.clone(),
                NameEntry {
                    claimant: *participant,
                    status: NameStatus::Pending(id)
                }
            );
        }

        let names = claims.iter().map(|(_, name)| name.clone()).collect::<Vec<_>>();
        info!(lookup = %id, %category, names = %names.join(","), "Searching ratings");

        self.lookups.insert(
            id,
            PendingLookup {
                id,
                category,
                names: claims,
                waiters: vec![waiter]
            }
        );

        LookupJob { id, names }
    }

    /// Registers interest in a lookup started by another request.
    /// Returns false if the lookup already completed.
    pub fn wait_on(&mut self, lookup: LookupId, waiter: RequestId) -> bool {
        match self.lookups.get_mut(&lookup) {
            Some(pending) => {
                if !pending.waiters.contains(&waiter) {
                    pending.waiters.push(waiter);
                }
                true
            }
            None => false
        }
    }

    /// Settles every name owned by the lookup. Names missing from a successful payload and
    /// every name of a failed batch end up [`NameStatus::Failed`].
    pub fn complete_lookup(
        &mut self,
        id: LookupId,
        outcome: Result<LookupResults, LookupError>
    ) -> Option<CompletedLookup> {
        let Some(lookup) = self.lookups.remove(&id) else {
            warn!(lookup = %id, "Completion for unknown lookup");
            return None;
        };

        let results = match outcome {
            Ok(results) => results,
            Err(error) => {
                warn!(lookup = %id, %error, "Rating lookup failed, treating batch as unresolved");
                LookupResults::new()
            }
        };

        // The service may echo names with different casing
        let mut by_name: HashMap<String, HashMap<Category, i32>> = results
            .into_iter()
            .map(|(name, ratings)| (name.to_lowercase(), ratings))
            .collect();

        let mut found = Vec::new();
        let mut failed = Vec::new();

        for (_, name) in &lookup.names {
            let status = match by_name.remove(&name.to_lowercase()) {
                Some(ratings) => {
                    found.push(name.clone());
                    NameStatus::Found(ratings)
                }
                None => {
                    failed.push(name.clone());
                    NameStatus::Failed
                }
            };

            if let Some(entry) = self.entries.get_mut(name) {
                if entry.status == NameStatus::Pending(id) {
                    entry.status = status;
                }
            }
        }

        for name in by_name.keys() {
            warn!(lookup = %id, %name, "Rating service answered for a name that was not requested");
        }

        info!(lookup = %id, found = found.len(), failed = failed.len(), "Rating lookup settled");

        Some(CompletedLookup {
            category: lookup.category,
            waiters: lookup.waiters,
            found,
            failed
        })
    }
}

/// Recovers a likely historical account name from a decorated display name: non-ASCII
/// characters and periods are dropped and the longest space-separated token is kept.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_ascii() && *c != '.').collect();

    let longest = cleaned
        .split(' ')
        .fold("", |best, part| if part.len() > best.len() { part } else { best });

    if longest.is_empty() {
        cleaned
    } else {
        longest.to_string()
    }
}
