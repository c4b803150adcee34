use chrono::{DateTime, Duration, Utc};

use crate::{host::GameState, model::structures::participant::ParticipantId};

pub type SwitchPair = (ParticipantId, ParticipantId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreeOutcome {
    /// No suggestion, the caller is not part of it, or both already agreed.
    Ignored,
    Recorded,
    /// Both agreed mid-round; the switch waits for the next round countdown.
    Deferred,
    Execute(SwitchPair)
}

/// Consent gate in front of a suggested mid-match switch.
///
/// Only one suggestion is tracked. A switch leaves this state machine only when both named
/// participants agreed or someone forced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchAgreement {
    #[default]
    None,
    Suggested { pair: SwitchPair, consent: [bool; 2] }
}

impl SwitchAgreement {
    pub fn pair(&self) -> Option<SwitchPair> {
        match self {
            SwitchAgreement::None => None,
            SwitchAgreement::Suggested { pair, .. } => Some(*pair)
        }
    }

    pub fn is_agreed(&self) -> bool {
        matches!(self, SwitchAgreement::Suggested { consent: [true, true], .. })
    }

    /// Tracks `pair`. Consent resets only when the pair changes; returns whether it did.
    pub fn suggest(&mut self, pair: SwitchPair) -> bool {
        if self.pair() == Some(pair) {
            return false;
        }

        *self = SwitchAgreement::Suggested {
            pair,
            consent: [false, false]
        };
        true
    }

    pub fn clear(&mut self) {
        *self = SwitchAgreement::None;
    }

    /// Records `participant`'s consent.
    ///
    /// Once both agreed the switch runs right away, unless the match is in progress and the
    /// last round countdown is older than `window`.
    pub fn agree(
        &mut self,
        participant: ParticipantId,
        state: GameState,
        countdown: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        window: Duration
    ) -> AgreeOutcome {
        let SwitchAgreement::Suggested { pair, consent } = self else {
            return AgreeOutcome::Ignored;
        };

        if consent[0] && consent[1] {
            return AgreeOutcome::Ignored;
        }

        if participant == pair.0 {
            consent[0] = true;
        } else if participant == pair.1 {
            consent[1] = true;
        } else {
            return AgreeOutcome::Ignored;
        }

        if !(consent[0] && consent[1]) {
            return AgreeOutcome::Recorded;
        }

        if let (GameState::InProgress, Some(countdown)) = (state, countdown) {
            if (now - countdown).num_seconds() > window.num_seconds() {
                return AgreeOutcome::Deferred;
            }
        }

        let pair = *pair;
        self.clear();
        AgreeOutcome::Execute(pair)
    }

    /// Executes regardless of consent.
    pub fn force(&mut self) -> Option<SwitchPair> {
        let pair = self.pair();
        self.clear();
        pair
    }

    /// A new round is counting down; a deferred switch runs now.
    pub fn round_countdown(&mut self) -> Option<SwitchPair> {
        if !self.is_agreed() {
            return None;
        }

        self.force()
    }
}

#[cfg(test)]
mod tests {
    use super::{AgreeOutcome, SwitchAgreement};
    use crate::{host::GameState, model::structures::participant::ParticipantId};
    use chrono::{Duration, Utc};

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);
    const C: ParticipantId = ParticipantId(3);

    fn window() -> Duration {
        Duration::seconds(7)
    }

    #[test]
    fn test_agree_without_suggestion() {
        let mut agreement = SwitchAgreement::default();
        let outcome = agreement.agree(A, GameState::Warmup, None, Utc::now(), window());

        assert_eq!(outcome, AgreeOutcome::Ignored);
    }

    #[test]
    fn test_both_agree_in_warmup_executes() {
        let mut agreement = SwitchAgreement::default();
        agreement.suggest((A, B));
        let now = Utc::now();

        assert_eq!(agreement.agree(A, GameState::Warmup, None, now, window()), AgreeOutcome::Recorded);
        assert_eq!(agreement.agree(B, GameState::Warmup, None, now, window()), AgreeOutcome::Execute((A, B)));
        assert_eq!(agreement, SwitchAgreement::None);
    }

    #[test]
    fn test_outsider_cannot_agree() {
        let mut agreement = SwitchAgreement::default();
        agreement.suggest((A, B));
        let now = Utc::now();

        assert_eq!(agreement.agree(C, GameState::Warmup, None, now, window()), AgreeOutcome::Ignored);
        assert_eq!(agreement.agree(A, GameState::Warmup, None, now, window()), AgreeOutcome::Recorded);
        assert_eq!(agreement.agree(A, GameState::Warmup, None, now, window()), AgreeOutcome::Recorded);
        assert!(!agreement.is_agreed());
    }

    #[test]
    fn test_new_pair_resets_consent() {
        let mut agreement = SwitchAgreement::default();
        agreement.suggest((A, B));
        agreement.agree(A, GameState::Warmup, None, Utc::now(), window());

        assert!(!agreement.suggest((A, B)));
        assert!(agreement.suggest((C, B)));
        assert_eq!(
            agreement,
            SwitchAgreement::Suggested {
                pair: (C, B),
                consent: [false, false]
            }
        );
    }

    #[test]
    fn test_mid_round_agreement_is_deferred() {
        let mut agreement = SwitchAgreement::default();
        agreement.suggest((A, B));
        let countdown = Utc::now();
        let now = countdown + Duration::seconds(30);

        agreement.agree(A, GameState::InProgress, Some(countdown), now, window());
        let outcome = agreement.agree(B, GameState::InProgress, Some(countdown), now, window());

        assert_eq!(outcome, AgreeOutcome::Deferred);
        assert!(agreement.is_agreed());
        // Further agreement is ignored while waiting
        assert_eq!(
            agreement.agree(A, GameState::InProgress, Some(countdown), now, window()),
            AgreeOutcome::Ignored
        );
        assert_eq!(agreement.round_countdown(), Some((A, B)));
        assert_eq!(agreement, SwitchAgreement::None);
    }

    #[test]
    fn test_agreement_inside_grace_window_executes() {
        let mut agreement = SwitchAgreement::default();
        agreement.suggest((A, B));
        let countdown = Utc::now();
        let now = countdown + Duration::seconds(5);

        agreement.agree(A, GameState::InProgress, Some(countdown), now, window());
        let outcome = agreement.agree(B, GameState::InProgress, Some(countdown), now, window());

        assert_eq!(outcome, AgreeOutcome::Execute((A, B)));
    }

    #[test]
    fn test_round_countdown_without_consent() {
        let mut agreement = SwitchAgreement::default();
        agreement.suggest((A, B));

        assert_eq!(agreement.round_countdown(), None);
        assert_eq!(agreement.pair(), Some((A, B)));
    }

    #[test]
    fn test_force_ignores_consent() {
        let mut agreement = SwitchAgreement::default();
        assert_eq!(agreement.force(), None);

        agreement.suggest((A, B));
        assert_eq!(agreement.force(), Some((A, B)));
        assert_eq!(agreement.pair(), None);
    }
}
