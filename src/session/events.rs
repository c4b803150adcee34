use strum_macros::EnumIter;

use crate::model::structures::{participant::ParticipantId, team::Team};

/// Game server notifications the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    VoteCalled {
        caller: ParticipantId,
        vote: String,
        args: String
    },
    VoteEnded {
        passed: bool
    },
    PlayerConnect(ParticipantId),
    PlayerDisconnect(ParticipantId),
    /// The participant finished loading the map and can read chat.
    PlayerLoaded(ParticipantId),
    TeamSwitch {
        participant: ParticipantId,
        old: Team,
        new: Team
    },
    RoundCountdown,
    GameEnd
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum EventKind {
    VoteCalled,
    VoteEnded,
    PlayerConnect,
    PlayerDisconnect,
    PlayerLoaded,
    TeamSwitch,
    RoundCountdown,
    GameEnd
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::VoteCalled { .. } => EventKind::VoteCalled,
            GameEvent::VoteEnded { .. } => EventKind::VoteEnded,
            GameEvent::PlayerConnect(_) => EventKind::PlayerConnect,
            GameEvent::PlayerDisconnect(_) => EventKind::PlayerDisconnect,
            GameEvent::PlayerLoaded(_) => EventKind::PlayerLoaded,
            GameEvent::TeamSwitch { .. } => EventKind::TeamSwitch,
            GameEvent::RoundCountdown => EventKind::RoundCountdown,
            GameEvent::GameEnd => EventKind::GameEnd
        }
    }
}

/// Whether the host should go on with its own handling of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    Continue,
    /// Veto the vote or the team change.
    Stop
}
