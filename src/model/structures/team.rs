use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

#[derive(Deserialize_repr, Serialize_repr, Debug, Eq, PartialEq, Copy, Clone, Hash)]
#[repr(u8)]
pub enum Team {
    Free = 0,
    Red = 1,
    Blue = 2,
    Spectator = 3
}

impl Team {
    /// Red and blue are the two competing teams; everything else is watching.
    pub fn is_playing(&self) -> bool {
        matches!(self, Team::Red | Team::Blue)
    }

    pub fn opponent(&self) -> Option<Team> {
        match self {
            Team::Red => Some(Team::Blue),
            Team::Blue => Some(Team::Red),
            _ => None
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Team::Free => "free",
            Team::Red => "red",
            Team::Blue => "blue",
            Team::Spectator => "spectator"
        };
        f.write_str(name)
    }
}

impl From<Team> for i32 {
    fn from(team: Team) -> Self {
        team as i32
    }
}
