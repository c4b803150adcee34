use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    host::{GameHost, HostError, Teams},
    model::{
        rating_store::RatingStore,
        structures::{category::Category, participant::ParticipantId, team::Team}
    }
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("the total number of players is not an even number")]
    UnevenTotal,

    #[error("both teams should have the same number of players")]
    UnevenTeams,

    #[error("participants without a rating: {0:?}")]
    Unrated(Vec<ParticipantId>),

    #[error(transparent)]
    Host(#[from] HostError)
}

/// The balancer's own view of the two teams. Kept in sync with every move it makes so later
/// iterations never suggest a swap that was already applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamSnapshot {
    pub red: Vec<ParticipantId>,
    pub blue: Vec<ParticipantId>
}

impl TeamSnapshot {
    pub fn new(red: Vec<ParticipantId>, blue: Vec<ParticipantId>) -> TeamSnapshot {
        TeamSnapshot { red, blue }
    }

    pub fn from_teams(teams: &Teams) -> TeamSnapshot {
        TeamSnapshot::new(teams.ids(Team::Red), teams.ids(Team::Blue))
    }

    pub fn total(&self) -> usize {
        self.red.len() + self.blue.len()
    }

    pub fn everyone(&self) -> Vec<ParticipantId> {
        self.red.iter().chain(self.blue.iter()).copied().collect()
    }

    fn apply_swap(&mut self, red: ParticipantId, blue: ParticipantId) {
        self.red.retain(|p| *p != red);
        self.blue.retain(|p| *p != blue);
        self.red.push(blue);
        self.blue.push(red);
    }
}

/// One red and one blue participant whose exchange narrows the gap between team averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapSuggestion {
    pub red: ParticipantId,
    pub blue: ParticipantId,
    /// How much the average gap shrinks.
    pub improvement: f64
}

impl SwapSuggestion {
    pub fn pair(&self) -> (ParticipantId, ParticipantId) {
        (self.red, self.blue)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamsReport {
    pub red_average: f64,
    pub blue_average: f64,
    pub suggestion: Option<SwapSuggestion>
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BalanceOutcome {
    /// Participants moved to even out team sizes.
    pub moved: Vec<(ParticipantId, Team)>,
    pub swaps: Vec<SwapSuggestion>,
    pub red_average: f64,
    pub blue_average: f64
}

pub struct TeamBalancer<'a> {
    store: &'a RatingStore,
    category: Category
}

impl<'a> TeamBalancer<'a> {
    pub fn new(store: &'a RatingStore, category: Category) -> TeamBalancer<'a> {
        TeamBalancer { store, category }
    }

    /// Mean rating of the team, 0 for an empty team.
    pub fn team_average(&self, team: &[ParticipantId]) -> f64 {
        if team.is_empty() {
            return 0.0;
        }

        self.sum(team) as f64 / team.len() as f64
    }

    pub fn unrated(&self, snapshot: &TeamSnapshot) -> Vec<ParticipantId> {
        self.store.missing(&snapshot.everyone(), self.category)
    }

    /// Finds the single red/blue exchange that minimises the gap between team averages.
    ///
    /// Pairs are scanned red-major in snapshot order and the first minimum wins. Returns
    /// `None` unless the best exchange is a strict improvement.
    pub fn suggest_switch(&self, snapshot: &TeamSnapshot) -> Option<SwapSuggestion> {
        let (n_red, n_blue) = (snapshot.red.len() as i64, snapshot.blue.len() as i64);
        if n_red == 0 || n_blue == 0 {
            return None;
        }

        let red_sum = self.sum(&snapshot.red);
        let blue_sum = self.sum(&snapshot.blue);
        let current = scaled_gap(red_sum, blue_sum, n_red, n_blue);

        let (best_gap, red, blue) = snapshot
            .red
            .iter()
            .cartesian_product(snapshot.blue.iter())
            .map(|(red, blue)| {
                let r = self.rating(*red);
                let b = self.rating(*blue);
                let gap = scaled_gap(red_sum - r + b, blue_sum - b + r, n_red, n_blue);
                (gap, *red, *blue)
            })
            .min_by_key(|(gap, _, _)| *gap)?;

        if best_gap >= current {
            return None;
        }

        Some(SwapSuggestion {
            red,
            blue,
            improvement: (current - best_gap) as f64 / (n_red * n_blue) as f64
        })
    }

    /// Averages plus a suggestion, if it improves the gap by at least `minimum_improvement`.
    pub fn teams_info(&self, snapshot: &TeamSnapshot, minimum_improvement: i32) -> Result<TeamsReport, BalanceError> {
        if snapshot.red.len() != snapshot.blue.len() {
            return Err(BalanceError::UnevenTeams);
        }

        let suggestion = self
            .suggest_switch(snapshot)
            .filter(|s| s.improvement >= minimum_improvement as f64);

        Ok(TeamsReport {
            red_average: self.team_average(&snapshot.red),
            blue_average: self.team_average(&snapshot.blue),
            suggestion
        })
    }

    /// Evens out team sizes, then applies improving swaps until none is left.
    pub fn balance(&self, snapshot: &mut TeamSnapshot, host: &mut dyn GameHost) -> Result<BalanceOutcome, BalanceError> {
        if snapshot.total() % 2 == 1 {
            return Err(BalanceError::UnevenTotal);
        }

        let unrated = self.unrated(snapshot);
        if !unrated.is_empty() {
            return Err(BalanceError::Unrated(unrated));
        }

        let mut outcome = BalanceOutcome {
            moved: even_out(snapshot),
            ..Default::default()
        };

        for (participant, team) in &outcome.moved {
            host.put(*participant, *team)?;
        }

        if let Some(first) = self.suggest_switch(snapshot) {
            host.lock(Team::Red);
            host.lock(Team::Blue);

            let result = self.apply_swaps(first, snapshot, host, &mut outcome.swaps);

            host.unlock(Team::Red);
            host.unlock(Team::Blue);
            result?;
        }

        outcome.red_average = self.team_average(&snapshot.red);
        outcome.blue_average = self.team_average(&snapshot.blue);
        info!(
            swaps = outcome.swaps.len(),
            moved = outcome.moved.len(),
            red = outcome.red_average,
            blue = outcome.blue_average,
            "Balance finished"
        );

        Ok(outcome)
    }

    fn apply_swaps(
        &self,
        first: SwapSuggestion,
        snapshot: &mut TeamSnapshot,
        host: &mut dyn GameHost,
        applied: &mut Vec<SwapSuggestion>
    ) -> Result<(), HostError> {
        let mut next = Some(first);

        while let Some(swap) = next {
            debug!(red = %swap.red, blue = %swap.blue, improvement = swap.improvement, "Switching");
            host.switch(swap.red, swap.blue)?;
            snapshot.apply_swap(swap.red, swap.blue);
            applied.push(swap);
            next = self.suggest_switch(snapshot);
        }

        Ok(())
    }

    fn rating(&self, participant: ParticipantId) -> i64 {
        self.store.get(participant, self.category) as i64
    }

    fn sum(&self, team: &[ParticipantId]) -> i64 {
        team.iter().map(|p| self.rating(*p)).sum()
    }
}

/// |avg(red) - avg(blue)| scaled by `n_red * n_blue`, so comparisons stay exact.
fn scaled_gap(red_sum: i64, blue_sum: i64, n_red: i64, n_blue: i64) -> i64 {
    (red_sum * n_blue - blue_sum * n_red).abs()
}

/// Moves participants from the larger team until sizes differ by at most one.
/// Ratings are not considered; the last listed members move first.
pub fn even_out(snapshot: &mut TeamSnapshot) -> Vec<(ParticipantId, Team)> {
    let mut moved = Vec::new();

    while snapshot.red.len() > snapshot.blue.len() + 1 {
        if let Some(p) = snapshot.red.pop() {
            snapshot.blue.push(p);
            moved.push((p, Team::Blue));
        }
    }

    while snapshot.blue.len() > snapshot.red.len() + 1 {
        if let Some(p) = snapshot.blue.pop() {
            snapshot.red.push(p);
            moved.push((p, Team::Red));
        }
    }

    moved
}

#[cfg(test)]
mod tests {
    use super::{even_out, BalanceError, TeamBalancer, TeamSnapshot};
    use crate::{
        host::roster::RosterHost,
        model::{
            rating_store::RatingStore,
            structures::{category::Category, participant::ParticipantId, team::Team}
        }
    };
    use approx::assert_relative_eq;

    fn ids(ids: &[u64]) -> Vec<ParticipantId> {
        ids.iter().map(|id| ParticipantId(*id)).collect()
    }

    fn store(ratings: &[(u64, i32)]) -> RatingStore {
        let mut store = RatingStore::new(1250);
        for (id, rating) in ratings {
            store.set(ParticipantId(*id), Category::Ca, *rating);
        }
        store
    }

    #[test]
    fn test_team_average() {
        let store = store(&[(1, 1400), (2, 1200)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);

        assert_relative_eq!(balancer.team_average(&ids(&[1, 2])), 1300.0);
        assert_relative_eq!(balancer.team_average(&[]), 0.0);
    }

    #[test]
    fn test_suggest_switch_tie_breaks_on_scan_order() {
        // red=[1400,1200], blue=[1000,1000]: every exchange leaves a gap of 100
        let store = store(&[(1, 1400), (2, 1200), (3, 1000), (4, 1000)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let snapshot = TeamSnapshot::new(ids(&[1, 2]), ids(&[3, 4]));

        let suggestion = balancer.suggest_switch(&snapshot).unwrap();

        assert_eq!(suggestion.pair(), (ParticipantId(1), ParticipantId(3)));
        assert_relative_eq!(suggestion.improvement, 200.0);
    }

    #[test]
    fn test_suggest_switch_none_when_no_improvement() {
        let store = store(&[(1, 1500), (2, 1000), (3, 1500), (4, 1000)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let snapshot = TeamSnapshot::new(ids(&[1, 2]), ids(&[3, 4]));

        assert!(balancer.suggest_switch(&snapshot).is_none());
    }

    #[test]
    fn test_suggest_switch_empty_team() {
        let store = store(&[(1, 1500)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);

        assert!(balancer.suggest_switch(&TeamSnapshot::new(ids(&[1]), vec![])).is_none());
    }

    #[test]
    fn test_unrated_participants_count_as_default() {
        let store = store(&[(1, 2250)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);

        // 2 has the default 1250
        assert_relative_eq!(balancer.team_average(&ids(&[1, 2])), 1750.0);
    }

    #[test]
    fn test_teams_info_threshold() {
        let store = store(&[(1, 1300), (2, 1260), (3, 1240), (4, 1200)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let snapshot = TeamSnapshot::new(ids(&[1, 2]), ids(&[3, 4]));

        let report = balancer.teams_info(&snapshot, 25).unwrap();
        assert_relative_eq!(report.red_average, 1280.0);
        assert_relative_eq!(report.blue_average, 1220.0);
        assert!(report.suggestion.is_some());

        let report = balancer.teams_info(&snapshot, 100).unwrap();
        assert!(report.suggestion.is_none());
    }

    #[test]
    fn test_teams_info_rejects_uneven_teams() {
        let store = store(&[]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let snapshot = TeamSnapshot::new(ids(&[1, 2]), ids(&[3]));

        assert_eq!(balancer.teams_info(&snapshot, 0), Err(BalanceError::UnevenTeams));
    }

    #[test]
    fn test_even_out_moves_half_the_difference() {
        let mut snapshot = TeamSnapshot::new(ids(&[1, 2, 3, 4, 5]), ids(&[6]));
        let moved = even_out(&mut snapshot);

        assert_eq!(moved, vec![(ParticipantId(5), Team::Blue), (ParticipantId(4), Team::Blue)]);
        assert_eq!(snapshot.red.len(), 3);
        assert_eq!(snapshot.blue.len(), 3);
    }

    #[test]
    fn test_even_out_leaves_off_by_one() {
        let mut snapshot = TeamSnapshot::new(ids(&[1]), ids(&[2, 3]));
        assert!(even_out(&mut snapshot).is_empty());
    }

    #[test]
    fn test_balance_rejects_odd_total() {
        let store = store(&[]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let mut host = RosterHost::new();
        let mut snapshot = TeamSnapshot::new(ids(&[1, 2]), ids(&[3]));

        assert_eq!(balancer.balance(&mut snapshot, &mut host), Err(BalanceError::UnevenTotal));
        assert!(host.switches.is_empty());
    }

    #[test]
    fn test_balance_requires_ratings() {
        let store = store(&[(1, 1000)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let mut host = RosterHost::new();
        let mut snapshot = TeamSnapshot::new(ids(&[1]), ids(&[2]));

        assert_eq!(
            balancer.balance(&mut snapshot, &mut host),
            Err(BalanceError::Unrated(ids(&[2])))
        );
    }

    #[test]
    fn test_balance_evens_and_swaps() {
        let store = store(&[(1, 2000), (2, 1900), (3, 1100), (4, 1000)]);
        let balancer = TeamBalancer::new(&store, Category::Ca);
        let mut host = RosterHost::new();
        host.add_red(1, "a");
        host.add_red(2, "b");
        host.add_red(3, "c");
        host.add_red(4, "d");
        let mut snapshot = TeamSnapshot::from_teams(&host.teams);

        let outcome = balancer.balance(&mut snapshot, &mut host).unwrap();

        assert_eq!(outcome.moved.len(), 2);
        assert_eq!(snapshot.red.len(), 2);
        assert_eq!(snapshot.blue.len(), 2);
        assert_relative_eq!(outcome.red_average, outcome.blue_average);
        assert_eq!(outcome.swaps.len(), host.switches.len());
        assert!(host.locked.is_empty());
        assert_eq!(TeamSnapshot::from_teams(&host.teams).red.len(), 2);
    }
}
