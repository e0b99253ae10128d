use serde::{Deserialize, Serialize};

/// Broker order lifecycle. Transitions are one-way; every transition is persisted by the
/// router before it acts on the new state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum OrderState {
    New,
    PartiallyFilled,
    Filled,
    Rejected,
    Cancelled,
    Expired,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Filled | OrderState::Rejected | OrderState::Cancelled | OrderState::Expired)
    }

    /// Whether moving from `self` to `next` is a legal one-way transition.
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        use OrderState::*;
        match (self, next) {
            (New, PartiallyFilled | Filled | Rejected | Cancelled | Expired) => true,
            (PartiallyFilled, Filled | Cancelled | Expired) => true,
            (state, Expired) if !state.is_terminal() => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_can_reach_any_next_state() {
        assert!(OrderState::New.can_transition_to(OrderState::PartiallyFilled));
        assert!(OrderState::New.can_transition_to(OrderState::Filled));
        assert!(OrderState::New.can_transition_to(OrderState::Rejected));
    }

    #[test]
    fn test_terminal_states_reject_further_transitions() {
        assert!(!OrderState::Filled.can_transition_to(OrderState::Cancelled));
        assert!(!OrderState::Rejected.can_transition_to(OrderState::New));
    }

    #[test]
    fn test_partially_filled_cannot_return_to_new() {
        assert!(!OrderState::PartiallyFilled.can_transition_to(OrderState::New));
        assert!(OrderState::PartiallyFilled.can_transition_to(OrderState::Filled));
    }
}
