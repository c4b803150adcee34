use std::fmt;

/// Rating bounds a participant must fall within to play. A bound of 0 is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingLimits {
    pub minimum: i32,
    pub maximum: i32,
    pub allow_spectators: bool
}

impl RatingLimits {
    pub fn is_enabled(&self) -> bool {
        self.minimum != 0 || self.maximum != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementReason {
    AboveMaximum { rating: i32, maximum: i32 },
    BelowMinimum { rating: i32, minimum: i32 },
    /// No rating at all while a minimum is in force.
    Unrated { minimum: i32 }
}

impl fmt::Display for RequirementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementReason::AboveMaximum { rating, maximum } => {
                write!(f, "Your rating is {}, which is more than the maximum of {}.", rating, maximum)
            }
            RequirementReason::BelowMinimum { rating, minimum } => {
                write!(f, "Your rating is {}, which is less than the minimum of {}.", rating, minimum)
            }
            RequirementReason::Unrated { minimum } => write!(
                f,
                "You have no rating yet and the minimum is {}. Type !iam <old nick> if you have one.",
                minimum
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementVerdict {
    Allowed,
    /// May stay connected but only as a spectator.
    Spectate(RequirementReason),
    /// Flagged, muted and eventually removed from the server.
    Remove(RequirementReason)
}

/// Checks a participant's rating against `limits`. A missing rating counts as 0.
pub fn check(rating: Option<i32>, limits: &RatingLimits) -> RequirementVerdict {
    if !limits.is_enabled() {
        return RequirementVerdict::Allowed;
    }

    let rating = rating.unwrap_or(0);

    let reason = if limits.maximum != 0 && rating > limits.maximum {
        RequirementReason::AboveMaximum {
            rating,
            maximum: limits.maximum
        }
    } else if limits.minimum != 0 && rating < limits.minimum {
        if rating == 0 {
            RequirementReason::Unrated {
                minimum: limits.minimum
            }
        } else {
            RequirementReason::BelowMinimum {
                rating,
                minimum: limits.minimum
            }
        }
    } else {
        return RequirementVerdict::Allowed;
    };

    // Unrated participants may always watch
    if limits.allow_spectators || rating == 0 {
        RequirementVerdict::Spectate(reason)
    } else {
        RequirementVerdict::Remove(reason)
    }
}
