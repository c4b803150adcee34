use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::{
    host::{ChatChannel, GameHost, GameState, HostError, Teams},
    model::structures::{
        category::Category,
        participant::{Participant, ParticipantId},
        team::Team
    }
};

/// A game host backed by an in-memory roster.
///
/// Used by the command line tool to balance a roster file, and by tests to observe what the
/// session asked the server to do.
pub struct RosterHost {
    pub teams: Teams,
    pub state: GameState,
    pub category: Category,
    pub clock: DateTime<Utc>,
    pub messages: Vec<(ChatChannel, String)>,
    pub switches: Vec<(ParticipantId, ParticipantId)>,
    pub moves: Vec<(ParticipantId, Team)>,
    pub muted: Vec<ParticipantId>,
    pub kicked: Vec<ParticipantId>,
    pub banned: Vec<ParticipantId>,
    pub locked: Vec<Team>
}

impl Default for RosterHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterHost {
    pub fn new() -> RosterHost {
        RosterHost::from_teams(Teams::default(), Category::Ca)
    }

    pub fn from_teams(teams: Teams, category: Category) -> RosterHost {
        RosterHost {
            teams,
            state: GameState::Warmup,
            category,
            clock: Utc::now(),
            messages: Vec::new(),
            switches: Vec::new(),
            moves: Vec::new(),
            muted: Vec::new(),
            kicked: Vec::new(),
            banned: Vec::new(),
            locked: Vec::new()
        }
    }

    pub fn add(&mut self, id: u64, name: &str, team: Team) {
        self.teams.members_mut(team).push(Participant::new(id, name));
    }

    pub fn add_red(&mut self, id: u64, name: &str) {
        self.add(id, name, Team::Red);
    }

    pub fn add_blue(&mut self, id: u64, name: &str) {
        self.add(id, name, Team::Blue);
    }

    pub fn add_spectator(&mut self, id: u64, name: &str) {
        self.add(id, name, Team::Spectator);
    }

    pub fn remove(&mut self, id: u64) -> Option<Participant> {
        let id = ParticipantId(id);
        let team = self.teams.team_of(id)?;
        let members = self.teams.members_mut(team);
        let index = members.iter().position(|p| p.id == id)?;
        Some(members.remove(index))
    }

    pub fn rename(&mut self, id: u64, name: &str) {
        for team in [Team::Red, Team::Blue, Team::Spectator, Team::Free] {
            for participant in self.teams.members_mut(team).iter_mut() {
                if participant.id == ParticipantId(id) {
                    participant.name = name.to_string();
                }
            }
        }
    }

    pub fn advance(&mut self, seconds: i64) {
        self.clock += Duration::seconds(seconds);
    }

    pub fn said(&self, fragment: &str) -> bool {
        self.messages.iter().any(|(_, message)| message.contains(fragment))
    }

    fn move_to(&mut self, id: ParticipantId, team: Team) -> Result<(), HostError> {
        let current = self.teams.team_of(id).ok_or(HostError::UnknownParticipant(id))?;
        let members = self.teams.members_mut(current);
        let index = members
            .iter()
            .position(|p| p.id == id)
            .ok_or(HostError::UnknownParticipant(id))?;
        let participant = members.remove(index);
        self.teams.members_mut(team).push(participant);
        Ok(())
    }
}

impl GameHost for RosterHost {
    fn teams(&self) -> Teams {
        self.teams.clone()
    }

    fn participant(&self, id: ParticipantId) -> Option<Participant> {
        let team = self.teams.team_of(id)?;
        self.teams.members(team).iter().find(|p| p.id == id).cloned()
    }

    fn game_state(&self) -> GameState {
        self.state
    }

    fn category(&self) -> Category {
        self.category
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    fn put(&mut self, id: ParticipantId, team: Team) -> Result<(), HostError> {
        self.move_to(id, team)?;
        self.moves.push((id, team));
        Ok(())
    }

    fn switch(&mut self, a: ParticipantId, b: ParticipantId) -> Result<(), HostError> {
        let team_a = self.teams.team_of(a).ok_or(HostError::UnknownParticipant(a))?;
        let team_b = self.teams.team_of(b).ok_or(HostError::UnknownParticipant(b))?;

        if team_a.opponent() != Some(team_b) {
            return Err(HostError::Rejected(format!(
                "{} ({}) and {} ({}) are not on opposing teams",
                a, team_a, b, team_b
            )));
        }

        self.move_to(a, team_b)?;
        self.move_to(b, team_a)?;
        self.switches.push((a, b));
        Ok(())
    }

    fn lock(&mut self, team: Team) {
        if !self.locked.contains(&team) {
            self.locked.push(team);
        }
    }

    fn unlock(&mut self, team: Team) {
        self.locked.retain(|t| *t != team);
    }

    fn mute(&mut self, id: ParticipantId) {
        self.muted.push(id);
    }

    fn kick(&mut self, id: ParticipantId, reason: &str) {
        self.kicked.push(id);
        let _ = self.remove(id.0);
    }

    fn ban(&mut self, id: ParticipantId) {
        self.banned.push(id);
    }

    fn send(&mut self, channel: ChatChannel, message: &str) {
        info!(?channel, "{}", message);
        self.messages.push((channel, message.to_string()));
    }
}
