use std::{
    collections::{HashMap, HashSet},
    time::Duration
};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    api::{api_structs::LookupResults, LookupError},
    database::{alias_key, rating_key, KeyValueStore},
    host::GameHost,
    model::{
        name_tracker::{normalize_name, LookupId, LookupJob, NameClaim, NameResolutionTracker},
        rating_store::RatingStore,
        structures::{category::Category, participant::ParticipantId}
    }
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("participants fell through every resolution branch: {participants:?}")]
    Unaccounted { participants: Vec<ParticipantId> }
}

/// A request to make sure every participant holds a rating for `category`, carrying the
/// work to resume once that is true.
#[derive(Debug)]
pub struct ResolveRequest<K> {
    pub participants: Vec<ParticipantId>,
    pub category: Category,
    /// Looked up instead of the persisted alias or display name.
    pub alias: Option<String>,
    pub continuation: K
}

impl<K> ResolveRequest<K> {
    pub fn new(participants: Vec<ParticipantId>, category: Category, continuation: K) -> ResolveRequest<K> {
        ResolveRequest {
            participants,
            category,
            alias: None,
            continuation
        }
    }

    pub fn with_alias(mut self, alias: &str) -> ResolveRequest<K> {
        self.alias = Some(alias.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveNotice {
    /// `participant` wanted `name`, which `owner` already claimed.
    Collision {
        participant: ParticipantId,
        owner: ParticipantId,
        name: String,
        rating: i32
    },
    /// The service holds no rating for `name`.
    NoRating { name: String, category: Category },
    /// The display name never became available.
    NameUnavailable { participant: ParticipantId, rating: i32 }
}

/// Work the resolver cannot do itself; the caller owns timers and the lookup worker.
#[derive(Debug)]
pub enum ResolverEffect<K> {
    Lookup(LookupJob),
    Wake { request: RequestId, delay: Duration },
    Notice(ResolveNotice),
    Completed(ResolveRequest<K>),
    Fault(ResolveError)
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub max_name_retries: u32,
    pub retry_delay: Duration
}

struct ParkedRequest<K> {
    request: ResolveRequest<K>,
    retry: u32,
    wake_scheduled: bool
}

enum LookupName {
    Name(String),
    NotLoaded
}

/// Drives participants from "no rating" to "some rating".
///
/// Each pass checks, in order: the in-memory store, the persisted rating, and finally the
/// external service through the [`NameResolutionTracker`]. Requests that cannot finish in one
/// pass are parked and resumed by [`RatingResolver::wake`] or
/// [`RatingResolver::lookup_finished`].
pub struct RatingResolver<K> {
    store: RatingStore,
    tracker: NameResolutionTracker,
    parked: HashMap<RequestId, ParkedRequest<K>>,
    next_request: u64,
    settings: ResolverSettings
}

impl<K> RatingResolver<K> {
    pub fn new(default_rating: i32, settings: ResolverSettings) -> RatingResolver<K> {
        RatingResolver {
            store: RatingStore::new(default_rating),
            tracker: NameResolutionTracker::new(),
            parked: HashMap::new(),
            next_request: 0,
            settings
        }
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RatingStore {
        &mut self.store
    }

    pub fn tracker(&self) -> &NameResolutionTracker {
        &self.tracker
    }

    pub fn parked_requests(&self) -> usize {
        self.parked.len()
    }

    pub fn resolve(
        &mut self,
        request: ResolveRequest<K>,
        host: &dyn GameHost,
        kv: &dyn KeyValueStore
    ) -> Vec<ResolverEffect<K>> {
        let id = RequestId(self.next_request);
        self.next_request += 1;

        self.parked.insert(
            id,
            ParkedRequest {
                request,
                retry: 0,
                wake_scheduled: false
            }
        );

        self.run_pass(id, host, kv)
    }

    /// A scheduled retry fired.
    pub fn wake(&mut self, id: RequestId, host: &dyn GameHost, kv: &dyn KeyValueStore) -> Vec<ResolverEffect<K>> {
        match self.parked.get_mut(&id) {
            Some(parked) => {
                parked.retry += 1;
                parked.wake_scheduled = false;
            }
            None => {
                debug!(request = id.0, "Wake for a request that already completed");
                return Vec::new();
            }
        }

        self.run_pass(id, host, kv)
    }

    /// Settles a lookup and re-runs every request waiting on it.
    pub fn lookup_finished(
        &mut self,
        lookup: LookupId,
        outcome: Result<LookupResults, LookupError>,
        host: &dyn GameHost,
        kv: &dyn KeyValueStore
    ) -> Vec<ResolverEffect<K>> {
        let Some(completed) = self.tracker.complete_lookup(lookup, outcome) else {
            return Vec::new();
        };

        let mut effects: Vec<ResolverEffect<K>> = completed
            .failed
            .into_iter()
            .map(|name| {
                ResolverEffect::Notice(ResolveNotice::NoRating {
                    name,
                    category: completed.category
                })
            })
            .collect();

        for waiter in completed.waiters {
            if self.parked.contains_key(&waiter) {
                effects.extend(self.run_pass(waiter, host, kv));
            }
        }

        effects
    }

    fn run_pass(&mut self, id: RequestId, host: &dyn GameHost, kv: &dyn KeyValueStore) -> Vec<ResolverEffect<K>> {
        let Some(mut parked) = self.parked.remove(&id) else {
            return Vec::new();
        };

        let category = parked.request.category;
        let participants = parked.request.participants.clone();
        let mut effects = Vec::new();

        for participant in self.store.missing(&participants, category) {
            let persisted = kv
                .get(&rating_key(participant, category))
                .and_then(|value| value.trim().parse::<i32>().ok());

            if let Some(rating) = persisted {
                self.store.set(participant, category, rating);
            }
        }

        let mut accounted = HashSet::new();
        let mut wait_for_name = false;
        let mut new_claims: IndexMap<String, ParticipantId> = IndexMap::new();

        for participant in self.store.missing(&participants, category) {
            let raw = match Self::lookup_name(participant, parked.request.alias.as_deref(), host, kv) {
                LookupName::Name(raw) => raw,
                LookupName::NotLoaded if parked.retry < self.settings.max_name_retries => {
                    wait_for_name = true;
                    accounted.insert(participant);
                    continue;
                }
                LookupName::NotLoaded => {
                    warn!(%participant, retries = parked.retry, "No display name after retries, using default rating");
                    self.store.set_default(participant, category);
                    effects.push(ResolverEffect::Notice(ResolveNotice::NameUnavailable {
                        participant,
                        rating: self.store.default_rating()
                    }));
                    continue;
                }
            };

            let name = normalize_name(&raw);
            if name.trim().is_empty() {
                self.store.set_default(participant, category);
                continue;
            }

            match self.tracker.claim(&name, participant, category) {
                NameClaim::Rated(rating) => self.store.set(participant, category, rating),
                NameClaim::Unrated => self.store.set_default(participant, category),
                NameClaim::Pending(lookup) => {
                    if self.tracker.wait_on(lookup, id) {
                        accounted.insert(participant);
                    }
                }
                NameClaim::Collision { owner } => {
                    effects.push(self.collision(participant, owner, name, category));
                }
                NameClaim::Unclaimed => match new_claims.get(&name) {
                    Some(owner) if *owner != participant => {
                        let owner = *owner;
                        effects.push(self.collision(participant, owner, name, category));
                    }
                    Some(_) => {
                        accounted.insert(participant);
                    }
                    None => {
                        new_claims.insert(name, participant);
                        accounted.insert(participant);
                    }
                }
            }
        }

        let missing = self.store.missing(&participants, category);
        if missing.is_empty() {
            effects.push(ResolverEffect::Completed(parked.request));
            return effects;
        }

        let unaccounted = missing
            .into_iter()
            .filter(|participant| !accounted.contains(participant))
            .collect::<Vec<_>>();

        if !unaccounted.is_empty() {
            error!(request = id.0, participants = ?unaccounted, "Participants fell through every resolution branch");
            effects.push(ResolverEffect::Fault(ResolveError::Unaccounted {
                participants: unaccounted
            }));
            return effects;
        }

        if !new_claims.is_empty() {
            let claims = new_claims.into_iter().map(|(name, participant)| (participant, name)).collect();
            effects.push(ResolverEffect::Lookup(self.tracker.start_lookup(category, claims, id)));
        }

        if wait_for_name && !parked.wake_scheduled {
            parked.wake_scheduled = true;
            effects.push(ResolverEffect::Wake {
                request: id,
                delay: self.settings.retry_delay
            });
        }

        self.parked.insert(id, parked);
        effects
    }

    fn collision(
        &mut self,
        participant: ParticipantId,
        owner: ParticipantId,
        name: String,
        category: Category
    ) -> ResolverEffect<K> {
        warn!(%participant, %owner, %name, "Name already claimed, using default rating");
        self.store.set_default(participant, category);

        ResolverEffect::Notice(ResolveNotice::Collision {
            participant,
            owner,
            name,
            rating: self.store.default_rating()
        })
    }

    /// Explicit alias, then the persisted alias, then the current display name.
    fn lookup_name(
        participant: ParticipantId,
        alias: Option<&str>,
        host: &dyn GameHost,
        kv: &dyn KeyValueStore
    ) -> LookupName {
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            return LookupName::Name(alias.to_string());
        }

        if let Some(alias) = kv.get(&alias_key(participant)).filter(|a| !a.is_empty()) {
            return LookupName::Name(alias);
        }

        match host.participant(participant) {
            Some(p) if p.has_name() => LookupName::Name(p.name),
            _ => LookupName::NotLoaded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RatingResolver, ResolveNotice, ResolveRequest, ResolverEffect, ResolverSettings};
    use crate::{
        api::{api_structs::LookupResults, LookupError},
        database::{memory::MemoryStore, rating_key, KeyValueStore},
        host::roster::RosterHost,
        model::structures::{category::Category, participant::ParticipantId}
    };
    use std::{collections::HashMap, time::Duration};

    fn resolver() -> RatingResolver<&'static str> {
        RatingResolver::new(
            1250,
            ResolverSettings {
                max_name_retries: 20,
                retry_delay: Duration::from_secs(1)
            }
        )
    }

    fn completed<K>(effects: &[ResolverEffect<K>]) -> bool {
        effects.iter().any(|e| matches!(e, ResolverEffect::Completed(_)))
    }

    #[test]
    fn test_already_rated_completes_immediately() {
        let host = RosterHost::new();
        let kv = MemoryStore::new();
        let mut resolver = resolver();
        resolver.store_mut().set(ParticipantId(1), Category::Ca, 1600);

        let effects = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done"), &host, &kv);

        assert_eq!(effects.len(), 1);
        assert!(completed(&effects));
        assert_eq!(resolver.parked_requests(), 0);
    }

    #[test]
    fn test_persisted_rating_is_adopted() {
        let host = RosterHost::new();
        let mut kv = MemoryStore::new();
        kv.set(&rating_key(ParticipantId(1), Category::Ca), "1700");
        let mut resolver = resolver();

        let effects = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done"), &host, &kv);

        assert!(completed(&effects));
        assert_eq!(resolver.store().rating(ParticipantId(1), Category::Ca), Some(1700));
    }

    #[test]
    fn test_lookup_then_complete() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "rapha");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let effects = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done"), &host, &kv);
        let job = match &effects[..] {
            [ResolverEffect::Lookup(job)] => job.clone(),
            other => panic!("unexpected effects {:?}", other)
        };
        assert_eq!(job.names, vec!["rapha".to_string()]);

        let mut results = LookupResults::new();
        results.insert("rapha".to_string(), HashMap::from([(Category::Ca, 2100)]));
        let effects = resolver.lookup_finished(job.id, Ok(results), &host, &kv);

        assert!(completed(&effects));
        assert_eq!(resolver.store().rating(ParticipantId(1), Category::Ca), Some(2100));
    }

    #[test]
    fn test_failed_lookup_falls_back_to_default() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "rapha");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let effects = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done"), &host, &kv);
        let ResolverEffect::Lookup(job) = &effects[0] else {
            panic!("expected a lookup");
        };

        let effects = resolver.lookup_finished(job.id, Err(LookupError::UnexpectedShape), &host, &kv);

        assert!(effects
            .iter()
            .any(|e| matches!(e, ResolverEffect::Notice(ResolveNotice::NoRating { .. }))));
        assert!(completed(&effects));
        assert_eq!(resolver.store().rating(ParticipantId(1), Category::Ca), Some(1250));
    }

    #[test]
    fn test_missing_name_schedules_one_wake() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let effects = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done"), &host, &kv);
        let request = match &effects[..] {
            [ResolverEffect::Wake { request, delay }] => {
                assert_eq!(*delay, Duration::from_secs(1));
                *request
            }
            other => panic!("unexpected effects {:?}", other)
        };

        host.rename(1, "rapha");
        let effects = resolver.wake(request, &host, &kv);
        assert!(matches!(&effects[..], [ResolverEffect::Lookup(_)]));
    }

    #[test]
    fn test_name_retry_bound_forces_default() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let mut effects = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done"), &host, &kv);
        let mut wakes = 0;

        while let Some(ResolverEffect::Wake { request, .. }) = effects.first() {
            wakes += 1;
            let request = *request;
            effects = resolver.wake(request, &host, &kv);
        }

        assert_eq!(wakes, 20);
        assert!(completed(&effects));
        assert_eq!(resolver.store().rating(ParticipantId(1), Category::Ca), Some(1250));
    }

    #[test]
    fn test_collision_gets_default() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "rapha");
        host.add_spectator(2, "[x] rapha");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let effects = resolver.resolve(
            ResolveRequest::new(vec![ParticipantId(1), ParticipantId(2)], Category::Ca, "done"),
            &host,
            &kv
        );

        assert!(effects.iter().any(|e| matches!(
            e,
            ResolverEffect::Notice(ResolveNotice::Collision { participant: ParticipantId(2), .. })
        )));
        assert_eq!(resolver.store().rating(ParticipantId(2), Category::Ca), Some(1250));
        assert_eq!(
            effects
                .iter()
                .filter(|e| matches!(e, ResolverEffect::Lookup(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_second_request_waits_on_first_lookup() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "rapha");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let first = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "first"), &host, &kv);
        let second = resolver.resolve(ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "second"), &host, &kv);

        assert!(second.is_empty());
        assert_eq!(resolver.parked_requests(), 2);

        let ResolverEffect::Lookup(job) = &first[0] else {
            panic!("expected a lookup");
        };
        let effects = resolver.lookup_finished(job.id, Ok(LookupResults::new()), &host, &kv);

        let continuations = effects
            .iter()
            .filter_map(|e| match e {
                ResolverEffect::Completed(request) => Some(request.continuation),
                _ => None
            })
            .collect::<Vec<_>>();
        assert_eq!(continuations, vec!["first", "second"]);
        assert_eq!(resolver.parked_requests(), 0);
    }

    #[test]
    fn test_alias_overrides_display_name() {
        let mut host = RosterHost::new();
        host.add_spectator(1, "newname");
        let kv = MemoryStore::new();
        let mut resolver = resolver();

        let effects = resolver.resolve(
            ResolveRequest::new(vec![ParticipantId(1)], Category::Ca, "done").with_alias("oldname"),
            &host,
            &kv
        );

        let ResolverEffect::Lookup(job) = &effects[0] else {
            panic!("expected a lookup");
        };
        assert_eq!(job.names, vec!["oldname".to_string()]);
    }
}
