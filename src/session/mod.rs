pub mod commands;
pub mod events;

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    time::Duration
};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use strum::IntoEnumIterator;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::{
    api::{api_structs::LookupResults, LookupError},
    config::BalanceConfig,
    database::{alias_key, rating_key, KeyValueStore},
    host::{ChatChannel, GameHost},
    model::{
        agreement::{AgreeOutcome, SwitchAgreement, SwitchPair},
        balancer::{BalanceError, BalanceOutcome, SwapSuggestion, TeamBalancer, TeamSnapshot},
        name_tracker::{normalize_name, LookupId, LookupJob, NameStatus},
        rating_store::RatingStore,
        requirements::{self, RequirementVerdict},
        resolver::{RatingResolver, RequestId, ResolveError, ResolveNotice, ResolveRequest, ResolverEffect},
        structures::{category::Category, participant::ParticipantId, team::Team}
    }
};

use self::{
    commands::{Command, CommandError},
    events::{EventKind, EventResponse, GameEvent}
};

/// What to do once every participant of a resolve request holds a rating.
#[derive(Debug)]
pub enum Continuation {
    CheckRequirements {
        participant: ParticipantId,
        new_team: Team
    },
    TeamsInfo {
        channel: ChatChannel
    },
    Balance {
        channel: ChatChannel
    },
    ReportRatings {
        participants: Vec<ParticipantId>,
        channel: ChatChannel
    },
    AllRatings {
        channel: ChatChannel
    },
    /// The alias is kept only if its lookup found a rating.
    ConfirmAlias {
        participant: ParticipantId,
        alias: String,
        channel: ChatChannel
    },
    Ratings(oneshot::Sender<HashMap<ParticipantId, i32>>),
    Suggest {
        snapshot: TeamSnapshot,
        reply: oneshot::Sender<Option<SwapSuggestion>>
    },
    ApplyBalance {
        snapshot: TeamSnapshot,
        reply: oneshot::Sender<Result<BalanceOutcome, BalanceError>>
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayedAction {
    BalanceAfterShuffle,
    Loaded(ParticipantId),
    Kick(ParticipantId)
}

/// Deferred work for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Lookup(LookupJob),
    Wake { request: RequestId, delay: Duration },
    Delayed { delay: Duration, action: DelayedAction }
}

/// Rating resolution, balancing and switch consent for one game server.
///
/// Nothing in here blocks or sleeps. Anything that has to happen later comes back to the
/// caller as a [`Dispatch`], and its result is fed back through [`Session::lookup_finished`],
/// [`Session::wake`] or [`Session::run_delayed`].
pub struct Session {
    config: BalanceConfig,
    resolver: RatingResolver<Continuation>,
    agreement: SwitchAgreement,
    flagged: HashSet<ParticipantId>,
    loaded: HashSet<ParticipantId>,
    vote: Option<String>,
    countdown: Option<DateTime<Utc>>
}

impl Session {
    pub fn new(config: BalanceConfig) -> Session {
        Session {
            resolver: RatingResolver::new(config.default_rating, config.resolver_settings()),
            config,
            agreement: SwitchAgreement::default(),
            flagged: HashSet::new(),
            loaded: HashSet::new(),
            vote: None,
            countdown: None
        }
    }

    /// Events a host has to forward.
    pub fn subscriptions() -> Vec<EventKind> {
        EventKind::iter().collect()
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn store(&self) -> &RatingStore {
        self.resolver.store()
    }

    pub fn resolver(&self) -> &RatingResolver<Continuation> {
        &self.resolver
    }

    pub fn agreement(&self) -> &SwitchAgreement {
        &self.agreement
    }

    pub fn is_flagged(&self, participant: ParticipantId) -> bool {
        self.flagged.contains(&participant)
    }

    pub fn is_loaded(&self, participant: ParticipantId) -> bool {
        self.loaded.contains(&participant)
    }

    pub fn resolve(
        &mut self,
        request: ResolveRequest<Continuation>,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let effects = self.resolver.resolve(request, &*host, &*kv);
        self.apply(effects, host, kv)
    }

    pub fn lookup_finished(
        &mut self,
        lookup: LookupId,
        outcome: Result<LookupResults, LookupError>,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let effects = self.resolver.lookup_finished(lookup, outcome, &*host, &*kv);
        self.apply(effects, host, kv)
    }

    pub fn wake(&mut self, request: RequestId, host: &mut dyn GameHost, kv: &mut dyn KeyValueStore) -> Vec<Dispatch> {
        let effects = self.resolver.wake(request, &*host, &*kv);
        self.apply(effects, host, kv)
    }

    pub fn handle_event(
        &mut self,
        event: GameEvent,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> (EventResponse, Vec<Dispatch>) {
        debug!(?event, "Game event");

        match event {
            GameEvent::VoteCalled { caller, vote, .. } => (self.vote_called(caller, &vote, host), Vec::new()),
            GameEvent::VoteEnded { passed } => {
                let vote = self.vote.take();

                if passed && vote.as_deref() == Some("shuffle") && self.config.auto_balance {
                    let delayed = Dispatch::Delayed {
                        delay: self.config.shuffle_balance_delay,
                        action: DelayedAction::BalanceAfterShuffle
                    };
                    return (EventResponse::Continue, vec![delayed]);
                }

                (EventResponse::Continue, Vec::new())
            }
            GameEvent::PlayerConnect(participant) => {
                let request = ResolveRequest::new(
                    vec![participant],
                    host.category(),
                    Continuation::CheckRequirements {
                        participant,
                        new_team: Team::Spectator
                    }
                );
                (EventResponse::Continue, self.resolve(request, host, kv))
            }
            GameEvent::PlayerDisconnect(participant) => {
                self.loaded.remove(&participant);

                if let Some((a, b)) = self.agreement.pair() {
                    if participant == a || participant == b {
                        self.agreement.clear();
                    }
                }

                (EventResponse::Continue, Vec::new())
            }
            GameEvent::PlayerLoaded(participant) => {
                let delayed = Dispatch::Delayed {
                    delay: self.config.loaded_notice_delay,
                    action: DelayedAction::Loaded(participant)
                };
                (EventResponse::Continue, vec![delayed])
            }
            GameEvent::TeamSwitch { participant, old, new } => self.team_switch(participant, old, new, host, kv),
            GameEvent::RoundCountdown => {
                self.countdown = Some(host.now());

                if let Some(pair) = self.agreement.round_countdown() {
                    self.execute_switch(pair, host);
                }

                (EventResponse::Continue, Vec::new())
            }
            GameEvent::GameEnd => {
                self.agreement.clear();
                self.countdown = None;
                (EventResponse::Continue, Vec::new())
            }
        }
    }

    pub fn handle_command(
        &mut self,
        caller: ParticipantId,
        channel: ChatChannel,
        args: &[&str],
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Result<Vec<Dispatch>, CommandError> {
        let command = Command::parse(args)?;
        let category = host.category();
        debug!(%caller, ?command, "Command");

        let dispatches = match command {
            Command::Teams => {
                let teams = host.teams();

                if teams.red.len() != teams.blue.len() {
                    host.send(channel, "Both teams should have the same number of players.");
                    return Ok(Vec::new());
                }

                let request = ResolveRequest::new(teams.playing(), category, Continuation::TeamsInfo { channel });
                self.resolve(request, host, kv)
            }
            Command::Balance => {
                let playing = host.teams().playing();

                if playing.len() % 2 == 1 {
                    host.send(channel, "I can't balance when the total number of players is not an even number.");
                    return Ok(Vec::new());
                }

                self.resolve(ResolveRequest::new(playing, category, Continuation::Balance { channel }), host, kv)
            }
            Command::Do => {
                match self.agreement.force() {
                    Some(pair) => self.execute_switch(pair, host),
                    None => host.send(channel, "There is no suggested switch to do.")
                }
                Vec::new()
            }
            Command::Agree => {
                let window = chrono::Duration::seconds(self.config.agree_window.as_secs() as i64);
                let outcome = self
                    .agreement
                    .agree(caller, host.game_state(), self.countdown, host.now(), window);

                match outcome {
                    AgreeOutcome::Execute(pair) => self.execute_switch(pair, host),
                    AgreeOutcome::Deferred => {
                        host.send(ChatChannel::Chat, "The switch will be executed at the start of the next round.")
                    }
                    AgreeOutcome::Recorded => {
                        let message = format!("{} agreed to the switch.", display_name(&*host, caller));
                        host.send(ChatChannel::Chat, &message);
                    }
                    AgreeOutcome::Ignored => {}
                }
                Vec::new()
            }
            Command::SetAliasFor { target, alias } => {
                if !ensure_connected(target, channel, host) {
                    return Ok(Vec::new());
                }

                match alias {
                    Some(alias) => self.claim_alias(target, &alias, true, channel, category, host, kv),
                    None => {
                        kv.delete(&alias_key(target));
                        self.resolver.store_mut().remove(target, category);
                        info!(participant = %target, "Alias removed");
                        let message = format!("{}'s alias has been removed.", display_name(&*host, target));
                        host.send(channel, &message);
                        Vec::new()
                    }
                }
            }
            Command::SetAlias { alias } => self.claim_alias(caller, &alias, false, channel, category, host, kv),
            Command::GetAlias { target } => {
                let target = target.unwrap_or(caller);
                if !ensure_connected(target, channel, host) {
                    return Ok(Vec::new());
                }

                let name = display_name(&*host, target);
                let message = match kv.get(&alias_key(target)) {
                    Some(alias) => format!("{}'s alias is set to {}.", name, alias),
                    None => format!("{} has no alias set.", name)
                };
                host.send(channel, &message);
                Vec::new()
            }
            Command::SetRating { target, rating } => {
                if !ensure_connected(target, channel, host) {
                    return Ok(Vec::new());
                }

                kv.set(&rating_key(target, category), &rating.to_string());
                self.resolver.store_mut().remove(target, category);
                info!(participant = %target, %category, rating, "Rating set by command");

                let message = format!("{}'s {} rating is set to {}.", display_name(&*host, target), category, rating);
                host.send(channel, &message);
                Vec::new()
            }
            Command::GetRating { target } => {
                let target = target.unwrap_or(caller);
                if !ensure_connected(target, channel, host) {
                    return Ok(Vec::new());
                }

                let continuation = Continuation::ReportRatings {
                    participants: vec![target],
                    channel
                };
                self.resolve(ResolveRequest::new(vec![target], category, continuation), host, kv)
            }
            Command::AllRatings => {
                let everyone = host.teams().everyone();
                self.resolve(ResolveRequest::new(everyone, category, Continuation::AllRatings { channel }), host, kv)
            }
            Command::RemoveRating { target } => {
                let target = target.unwrap_or(caller);
                if !ensure_connected(target, channel, host) {
                    return Ok(Vec::new());
                }

                let key = rating_key(target, category);
                let name = display_name(&*host, target);

                if !kv.contains(&key) && !self.resolver.store().has(target, category) {
                    host.send(channel, &format!("{} has no {} rating yet.", name, category));
                    return Ok(Vec::new());
                }

                kv.delete(&key);
                self.resolver.store_mut().remove(target, category);
                info!(participant = %target, %category, "Rating removed by command");
                host.send(channel, &format!("{}'s {} rating has been removed.", name, category));
                Vec::new()
            }
            Command::RatingInfo => {
                self.rating_info(caller, channel, category, host, &*kv);
                Vec::new()
            }
        };

        Ok(dispatches)
    }

    pub fn run_delayed(
        &mut self,
        action: DelayedAction,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        match action {
            DelayedAction::BalanceAfterShuffle => {
                let playing = host.teams().playing();

                if playing.len() % 2 == 1 {
                    host.send(
                        ChatChannel::Chat,
                        "I can't balance when the total number of players is not an even number."
                    );
                    return Vec::new();
                }

                let request = ResolveRequest::new(
                    playing,
                    host.category(),
                    Continuation::Balance {
                        channel: ChatChannel::Chat
                    }
                );
                self.resolve(request, host, kv)
            }
            DelayedAction::Loaded(participant) => {
                self.greet(participant, host, &*kv);
                Vec::new()
            }
            DelayedAction::Kick(participant) => {
                if host.participant(participant).is_some() {
                    info!(%participant, "Kicking participant outside the rating limits");
                    host.ban(participant);
                    host.kick(participant, "You do not meet the rating requirements of this server.");
                }
                Vec::new()
            }
        }
    }

    /// Suggest the best single switch for `snapshot` once everyone on it is rated.
    pub fn suggest(
        &mut self,
        snapshot: TeamSnapshot,
        category: Category,
        reply: oneshot::Sender<Option<SwapSuggestion>>,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let participants = snapshot.everyone();
        let request = ResolveRequest::new(participants, category, Continuation::Suggest { snapshot, reply });
        self.resolve(request, host, kv)
    }

    /// Balance `snapshot` on the host once everyone on it is rated.
    pub fn balance(
        &mut self,
        snapshot: TeamSnapshot,
        category: Category,
        reply: oneshot::Sender<Result<BalanceOutcome, BalanceError>>,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let participants = snapshot.everyone();
        let request = ResolveRequest::new(participants, category, Continuation::ApplyBalance { snapshot, reply });
        self.resolve(request, host, kv)
    }

    fn apply(
        &mut self,
        effects: Vec<ResolverEffect<Continuation>>,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();

        for effect in effects {
            match effect {
                ResolverEffect::Lookup(job) => dispatches.push(Dispatch::Lookup(job)),
                ResolverEffect::Wake { request, delay } => dispatches.push(Dispatch::Wake { request, delay }),
                ResolverEffect::Notice(notice) => announce(notice, host),
                ResolverEffect::Completed(request) => dispatches.extend(self.resume(request, host, kv)),
                ResolverEffect::Fault(fault) => {
                    error!(%fault, "Rating resolution gave up");
                    let ResolveError::Unaccounted { participants } = fault;
                    let names = participants.iter().map(|p| display_name(&*host, *p)).join(", ");
                    host.send(ChatChannel::Chat, &format!("{} fell through all nets.", names));
                }
            }
        }

        dispatches
    }

    fn resume(
        &mut self,
        request: ResolveRequest<Continuation>,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let category = request.category;

        match request.continuation {
            Continuation::CheckRequirements { participant, new_team } => {
                let verdict = requirements::check(self.resolver.store().rating(participant, category), &self.config.limits());
                self.enforce(participant, verdict, new_team.is_playing(), host)
            }
            Continuation::TeamsInfo { channel } => self.teams_info(channel, category, host, kv),
            Continuation::Balance { channel } => self.balance_teams(channel, category, host, kv),
            Continuation::ReportRatings { participants, channel } => {
                for participant in participants {
                    let message = format!(
                        "{}'s {} rating is {}.",
                        display_name(&*host, participant),
                        category,
                        self.resolver.store().get(participant, category)
                    );
                    host.send(channel, &message);
                }
                Vec::new()
            }
            Continuation::AllRatings { channel } => {
                let teams = host.teams();
                let store = self.resolver.store();

                for team in [Team::Red, Team::Blue, Team::Free, Team::Spectator] {
                    let members = teams.members(team);
                    if members.is_empty() {
                        continue;
                    }

                    let listing = members
                        .iter()
                        .map(|p| format!("{} ({})", p.name, store.get(p.id, category)))
                        .join(", ");
                    host.send(channel, &format!("{}: {}", team, listing));
                }
                Vec::new()
            }
            Continuation::ConfirmAlias {
                participant,
                alias,
                channel
            } => {
                let found = self
                    .resolver
                    .tracker()
                    .entry(&normalize_name(&alias))
                    .is_some_and(|entry| entry.claimant == participant && matches!(entry.status, NameStatus::Found(_)));
                let name = display_name(&*host, participant);
                let rating = self.resolver.store().get(participant, category);

                if found {
                    kv.set(&alias_key(participant), &alias);
                    info!(%participant, %alias, "Alias set");
                    host.send(
                        channel,
                        &format!("{}'s alias is now set to {}. {} rating: {}.", name, alias, category, rating)
                    );
                } else {
                    host.send(
                        channel,
                        &format!("{} was not found. {} keeps the {} rating of {}.", alias, name, category, rating)
                    );
                }
                Vec::new()
            }
            Continuation::Ratings(reply) => {
                let store = self.resolver.store();
                let ratings = request
                    .participants
                    .iter()
                    .map(|p| (*p, store.get(*p, category)))
                    .collect();
                let _ = reply.send(ratings);
                Vec::new()
            }
            Continuation::Suggest { snapshot, reply } => {
                let suggestion = TeamBalancer::new(self.resolver.store(), category).suggest_switch(&snapshot);
                let _ = reply.send(suggestion);
                Vec::new()
            }
            Continuation::ApplyBalance { mut snapshot, reply } => {
                let result = TeamBalancer::new(self.resolver.store(), category).balance(&mut snapshot, host);
                if result.is_ok() {
                    self.agreement.clear();
                }
                let _ = reply.send(result);
                Vec::new()
            }
        }
    }

    fn vote_called(&mut self, caller: ParticipantId, vote: &str, host: &mut dyn GameHost) -> EventResponse {
        if self.flagged.contains(&caller) {
            host.send(ChatChannel::Tell(caller), "You are not allowed to call votes on this server.");
            return EventResponse::Stop;
        }

        let vote = vote.to_lowercase();
        if vote == "shuffle" && self.config.veto_uneven_shuffle && host.teams().playing().len() % 2 == 1 {
            host.send(
                ChatChannel::Chat,
                "Only call shuffle votes when the total number of players is an even number."
            );
            return EventResponse::Stop;
        }

        self.vote = Some(vote);
        EventResponse::Continue
    }

    fn team_switch(
        &mut self,
        participant: ParticipantId,
        old: Team,
        new: Team,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> (EventResponse, Vec<Dispatch>) {
        if !new.is_playing() {
            return (EventResponse::Continue, Vec::new());
        }

        if self.flagged.contains(&participant) {
            host.send(ChatChannel::Tell(participant), "You are not allowed to join a team on this server.");
            return (EventResponse::Stop, Vec::new());
        }

        let limits = self.config.limits();
        if !limits.is_enabled() {
            return (EventResponse::Continue, Vec::new());
        }

        let category = host.category();

        // Known ratings are judged before the switch happens so it can be refused outright
        if self.resolver.store().has(participant, category) {
            let verdict = requirements::check(self.resolver.store().rating(participant, category), &limits);
            if verdict == RequirementVerdict::Allowed {
                return (EventResponse::Continue, Vec::new());
            }

            let dispatches = self.enforce(participant, verdict, old.is_playing(), host);
            return (EventResponse::Stop, dispatches);
        }

        let request = ResolveRequest::new(
            vec![participant],
            category,
            Continuation::CheckRequirements {
                participant,
                new_team: new
            }
        );
        (EventResponse::Continue, self.resolve(request, host, kv))
    }

    fn enforce(
        &mut self,
        participant: ParticipantId,
        verdict: RequirementVerdict,
        move_to_spectators: bool,
        host: &mut dyn GameHost
    ) -> Vec<Dispatch> {
        let reason = match verdict {
            RequirementVerdict::Allowed => return Vec::new(),
            RequirementVerdict::Spectate(reason) | RequirementVerdict::Remove(reason) => reason
        };

        if move_to_spectators {
            host.send(ChatChannel::Tell(participant), "You don't meet the rating requirements to play here.");
            if let Err(err) = host.put(participant, Team::Spectator) {
                warn!(%participant, %err, "Could not move participant to spectators");
            }
        }
        host.send(ChatChannel::Tell(participant), &reason.to_string());

        let RequirementVerdict::Remove(_) = verdict else {
            return Vec::new();
        };

        if !self.flagged.insert(participant) {
            return Vec::new();
        }

        info!(%participant, ?reason, "Participant flagged for removal");
        host.mute(participant);
        host.send(
            ChatChannel::Tell(participant),
            "You do not meet the rating requirements on this server. You will be kicked shortly."
        );

        vec![Dispatch::Delayed {
            delay: self.config.kick_delay,
            action: DelayedAction::Kick(participant)
        }]
    }

    fn teams_info(
        &mut self,
        channel: ChatChannel,
        category: Category,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let snapshot = TeamSnapshot::from_teams(&host.teams());
        let balancer = TeamBalancer::new(self.resolver.store(), category);

        let unrated = balancer.unrated(&snapshot);
        if !unrated.is_empty() {
            // Someone joined while the ratings were being fetched
            let request = ResolveRequest::new(unrated, category, Continuation::TeamsInfo { channel });
            return self.resolve(request, host, kv);
        }

        match balancer.teams_info(&snapshot, self.config.minimum_suggestion_difference) {
            Ok(report) => {
                let (red, blue) = (report.red_average.round(), report.blue_average.round());
                host.send(
                    channel,
                    &format!("RED: {} vs BLUE: {} - DIFFERENCE: {}", red, blue, (red - blue).abs())
                );

                match report.suggestion {
                    Some(suggestion) => {
                        self.agreement.suggest(suggestion.pair());
                        let message = format!(
                            "SUGGESTION: switch {} with {}. Both type !a to agree.",
                            display_name(&*host, suggestion.red),
                            display_name(&*host, suggestion.blue)
                        );
                        host.send(ChatChannel::Chat, &message);
                    }
                    None => {
                        self.agreement.clear();
                        host.send(channel, "Teams look good!");
                    }
                }
            }
            Err(err) => {
                debug!(%err, "No teams report");
                host.send(channel, &describe(&err));
            }
        }

        Vec::new()
    }

    fn balance_teams(
        &mut self,
        channel: ChatChannel,
        category: Category,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        let mut snapshot = TeamSnapshot::from_teams(&host.teams());

        let unrated = TeamBalancer::new(self.resolver.store(), category).unrated(&snapshot);
        if !unrated.is_empty() {
            let request = ResolveRequest::new(unrated, category, Continuation::Balance { channel });
            return self.resolve(request, host, kv);
        }

        match TeamBalancer::new(self.resolver.store(), category).balance(&mut snapshot, host) {
            Ok(outcome) => {
                self.agreement.clear();

                if outcome.swaps.is_empty() && outcome.moved.is_empty() {
                    host.send(channel, "Teams are good! Nothing to balance.");
                } else {
                    let (red, blue) = (outcome.red_average.round(), outcome.blue_average.round());
                    host.send(
                        channel,
                        &format!(
                            "Balancing done. RED: {} vs BLUE: {} - DIFFERENCE: {}",
                            red,
                            blue,
                            (red - blue).abs()
                        )
                    );
                }
            }
            Err(err) => {
                warn!(%err, "Balance failed");
                host.send(channel, &describe(&err));
            }
        }

        Vec::new()
    }

    fn claim_alias(
        &mut self,
        participant: ParticipantId,
        alias: &str,
        force: bool,
        channel: ChatChannel,
        category: Category,
        host: &mut dyn GameHost,
        kv: &mut dyn KeyValueStore
    ) -> Vec<Dispatch> {
        if !force {
            if let Some(existing) = kv.get(&alias_key(participant)) {
                let message = format!(
                    "{}'s alias is already set to {}. Ask an admin to change it.",
                    display_name(&*host, participant),
                    existing
                );
                host.send(channel, &message);
                return Vec::new();
            }
        }

        self.resolver.store_mut().remove(participant, category);

        let continuation = Continuation::ConfirmAlias {
            participant,
            alias: alias.to_string(),
            channel
        };
        let request = ResolveRequest::new(vec![participant], category, continuation).with_alias(alias);
        self.resolve(request, host, kv)
    }

    fn rating_info(
        &self,
        participant: ParticipantId,
        channel: ChatChannel,
        category: Category,
        host: &mut dyn GameHost,
        kv: &dyn KeyValueStore
    ) {
        let name = display_name(&*host, participant);
        let alias = kv.get(&alias_key(participant));
        let persisted = kv.get(&rating_key(participant, category));
        let in_memory = self.resolver.store().rating(participant, category);

        let lookup_name = normalize_name(alias.as_deref().unwrap_or(&name));
        let status = self
            .resolver
            .tracker()
            .entry(&lookup_name)
            .map(|entry| entry.status.label())
            .unwrap_or("not requested");

        let message = format!(
            "{} ({}): stored {}, alias {}, in memory {}, lookup of {} {}",
            name,
            category,
            or_none(persisted),
            or_none(alias),
            or_none(in_memory),
            lookup_name,
            status
        );
        host.send(channel, &message);
    }

    fn greet(&mut self, participant: ParticipantId, host: &mut dyn GameHost, kv: &dyn KeyValueStore) {
        let Some(connected) = host.participant(participant) else {
            return;
        };

        self.loaded.insert(participant);
        host.send(
            ChatChannel::Tell(participant),
            "This server is rating managed. Type !teams to compare the team ratings."
        );

        if self.flagged.contains(&participant) {
            return;
        }

        let name = kv.get(&alias_key(participant)).unwrap_or(connected.name);
        let failed = matches!(
            self.resolver.tracker().entry(&normalize_name(&name)).map(|e| &e.status),
            Some(NameStatus::Failed)
        );

        if failed {
            host.send(
                ChatChannel::Tell(participant),
                &format!("No rating was found for {}. Type !iam <old nick> if you played under another name.", name)
            );
        }
    }

    fn execute_switch(&mut self, (a, b): SwitchPair, host: &mut dyn GameHost) {
        let message = format!("Switching {} with {}.", display_name(&*host, a), display_name(&*host, b));

        match host.switch(a, b) {
            Ok(()) => {
                info!(%a, %b, "Switch executed");
                host.send(ChatChannel::Chat, &message);
            }
            Err(err) => {
                warn!(%a, %b, %err, "Switch failed");
                host.send(ChatChannel::Chat, "The switch could not be executed.");
            }
        }
    }
}

fn announce(notice: ResolveNotice, host: &mut dyn GameHost) {
    match notice {
        ResolveNotice::Collision {
            participant,
            owner,
            name,
            rating
        } => {
            let message = format!(
                "{} is already used by {}. {} gets the default rating of {}.",
                name,
                display_name(&*host, owner),
                display_name(&*host, participant),
                rating
            );
            host.send(ChatChannel::Chat, &message);
        }
        ResolveNotice::NoRating { name, category } => {
            host.send(ChatChannel::Console, &format!("No {} rating found for {}.", category, name));
        }
        ResolveNotice::NameUnavailable { participant, rating } => {
            host.send(
                ChatChannel::Console,
                &format!("Name of {} never loaded, using the default rating of {}.", participant, rating)
            );
        }
    }
}

fn describe(err: &BalanceError) -> String {
    match err {
        BalanceError::UnevenTotal => {
            "I can't balance when the total number of players is not an even number.".to_string()
        }
        BalanceError::UnevenTeams => "Both teams should have the same number of players.".to_string(),
        BalanceError::Unrated(_) => "Not everyone has a rating yet, try again in a moment.".to_string(),
        BalanceError::Host(err) => format!("The server refused: {}.", err)
    }
}

/// Tells the channel when `participant` is not connected.
fn ensure_connected(participant: ParticipantId, channel: ChatChannel, host: &mut dyn GameHost) -> bool {
    if host.participant(participant).is_some() {
        return true;
    }

    host.send(channel, "Player not found.");
    false
}

fn display_name(host: &dyn GameHost, participant: ParticipantId) -> String {
    host.participant(participant)
        .filter(|p| p.has_name())
        .map(|p| p.name)
        .unwrap_or_else(|| participant.to_string())
}

fn or_none<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
}
