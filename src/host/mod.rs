pub mod roster;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::structures::{
    category::Category,
    participant::{Participant, ParticipantId},
    team::Team
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("participant {0} is not connected")]
    UnknownParticipant(ParticipantId),

    #[error("game server rejected the request: {0}")]
    Rejected(String)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Warmup,
    Countdown,
    InProgress
}

/// Where a message should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatChannel {
    Chat,
    Console,
    Tell(ParticipantId)
}

/// Current team membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    #[serde(default)]
    pub red: Vec<Participant>,
    #[serde(default)]
    pub blue: Vec<Participant>,
    #[serde(default)]
    pub spectator: Vec<Participant>,
    #[serde(default)]
    pub free: Vec<Participant>
}

impl Teams {
    pub fn playing(&self) -> Vec<ParticipantId> {
        self.red.iter().chain(self.blue.iter()).map(|p| p.id).collect()
    }

    pub fn everyone(&self) -> Vec<ParticipantId> {
        self.red
            .iter()
            .chain(self.blue.iter())
            .chain(self.free.iter())
            .chain(self.spectator.iter())
            .map(|p| p.id)
            .collect()
    }

    pub fn team_of(&self, id: ParticipantId) -> Option<Team> {
        let contains = |members: &[Participant]| members.iter().any(|p| p.id == id);

        if contains(&self.red) {
            Some(Team::Red)
        } else if contains(&self.blue) {
            Some(Team::Blue)
        } else if contains(&self.spectator) {
            Some(Team::Spectator)
        } else if contains(&self.free) {
            Some(Team::Free)
        } else {
            None
        }
    }

    pub fn ids(&self, team: Team) -> Vec<ParticipantId> {
        self.members(team).iter().map(|p| p.id).collect()
    }

    pub fn members(&self, team: Team) -> &[Participant] {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
            Team::Spectator => &self.spectator,
            Team::Free => &self.free
        }
    }

    pub fn members_mut(&mut self, team: Team) -> &mut Vec<Participant> {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
            Team::Spectator => &mut self.spectator,
            Team::Free => &mut self.free
        }
    }
}

/// The game server the session runs inside.
///
/// Mutations go straight to the server; the session never assumes they are reflected in a
/// previously fetched [`Teams`] snapshot.
pub trait GameHost {
    fn teams(&self) -> Teams;

    fn participant(&self, id: ParticipantId) -> Option<Participant>;

    fn game_state(&self) -> GameState;

    fn category(&self) -> Category;

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn put(&mut self, id: ParticipantId, team: Team) -> Result<(), HostError>;

    fn switch(&mut self, a: ParticipantId, b: ParticipantId) -> Result<(), HostError>;

    fn lock(&mut self, team: Team);

    fn unlock(&mut self, team: Team);

    fn mute(&mut self, id: ParticipantId);

    fn kick(&mut self, id: ParticipantId, reason: &str);

    fn ban(&mut self, id: ParticipantId);

    fn send(&mut self, channel: ChatChannel, message: &str);
}
