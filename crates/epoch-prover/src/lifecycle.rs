use std::fmt;

use crate::errors::EpochProvingError;

/// Lifecycle of an epoch proving attempt.
///
/// ## State Transitions
///
/// - `Created` -> `Full`: When every block slot of the epoch is occupied.
/// - `Created` | `Full` -> `Resolved`: When the epoch result is settled.
/// - `Created` | `Full` -> `Rejected`: When proving fails or is cancelled.
///
/// `Resolved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvingStateLifecycle {
    /// Accepting blocks.
    #[default]
    Created,
    /// All blocks registered, proofs may still be in flight.
    Full,
    /// Settled with a result.
    Resolved,
    /// Settled with a rejection.
    Rejected,
}

impl ProvingStateLifecycle {
    /// Whether the epoch is still live, ie. not yet settled.
    pub fn verify_state(&self) -> bool {
        matches!(self, Self::Created | Self::Full)
    }

    pub fn is_accepting_blocks(&self) -> bool {
        matches!(self, Self::Created)
    }

    pub fn is_terminal(&self) -> bool {
        !self.verify_state()
    }

    /// Attempts to move to `target`, refusing anything that is not a forward step.
    pub fn transition(&mut self, target: ProvingStateLifecycle) -> Result<(), EpochProvingError> {
        let is_transition_valid = matches!(
            (*self, target),
            (Self::Created, Self::Full)
                | (Self::Created | Self::Full, Self::Resolved)
                | (Self::Created | Self::Full, Self::Rejected)
        );

        if is_transition_valid {
            *self = target;
            Ok(())
        } else {
            Err(EpochProvingError::InvalidTransition(*self, target))
        }
    }
}

impl fmt::Display for ProvingStateLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Full => "full",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ProvingStateLifecycle; 4] = [
        ProvingStateLifecycle::Created,
        ProvingStateLifecycle::Full,
        ProvingStateLifecycle::Resolved,
        ProvingStateLifecycle::Rejected,
    ];

    #[test]
    fn test_created_to_full() {
        let mut state = ProvingStateLifecycle::default();
        assert!(state.is_accepting_blocks());
        state.transition(ProvingStateLifecycle::Full).unwrap();
        assert_eq!(state, ProvingStateLifecycle::Full);
        assert!(!state.is_accepting_blocks());
        assert!(state.verify_state());
    }

    #[test]
    fn test_settlement_from_live_states() {
        for start in [ProvingStateLifecycle::Created, ProvingStateLifecycle::Full] {
            for target in [ProvingStateLifecycle::Resolved, ProvingStateLifecycle::Rejected] {
                let mut state = start;
                assert!(
                    state.transition(target).is_ok(),
                    "{start} -> {target} should be valid"
                );
                assert!(state.is_terminal());
            }
        }
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        for start in [ProvingStateLifecycle::Resolved, ProvingStateLifecycle::Rejected] {
            for target in ALL {
                let mut state = start;
                let result = state.transition(target);
                assert!(result.is_err(), "{start} -> {target} should be invalid");
                assert_eq!(state, start);
            }
        }
    }

    #[test]
    fn test_no_backwards_or_self_transitions() {
        let invalid = [
            (ProvingStateLifecycle::Full, ProvingStateLifecycle::Created),
            (ProvingStateLifecycle::Full, ProvingStateLifecycle::Full),
            (ProvingStateLifecycle::Created, ProvingStateLifecycle::Created),
        ];

        for (from, to) in invalid {
            let mut state = from;
            match state.transition(to) {
                Err(EpochProvingError::InvalidTransition(f, t)) => {
                    assert_eq!((f, t), (from, to));
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }
    }
}
