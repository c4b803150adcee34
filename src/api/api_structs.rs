use serde::Deserialize;
use std::collections::HashMap;

use crate::model::structures::category::Category;

/// Per-name ratings reported by the rating service, keyed by the name the service echoed.
pub type LookupResults = HashMap<String, HashMap<Category, i32>>;

#[derive(Deserialize, Debug)]
pub struct RankResponse {
    pub players: Vec<RankRecord>
}

#[derive(Deserialize, Debug, Default)]
pub struct RankRecord {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub ca: Option<ModeRank>,
    #[serde(default)]
    pub ffa: Option<ModeRank>,
    #[serde(default)]
    pub ctf: Option<ModeRank>,
    #[serde(default)]
    pub duel: Option<ModeRank>,
    #[serde(default)]
    pub tdm: Option<ModeRank>
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ModeRank {
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub elo: Option<i32>
}

impl ModeRank {
    /// A rank of zero (or none) means the service holds no usable rating for the mode.
    pub fn usable_rating(&self) -> Option<i32> {
        match self.rank {
            Some(rank) if rank != 0 => self.elo,
            _ => None
        }
    }
}

impl RankRecord {
    pub fn mode(&self, category: Category) -> Option<&ModeRank> {
        match category {
            Category::Ca => self.ca.as_ref(),
            Category::Ffa => self.ffa.as_ref(),
            Category::Ctf => self.ctf.as_ref(),
            Category::Duel => self.duel.as_ref(),
            Category::Tdm => self.tdm.as_ref()
        }
    }
}
