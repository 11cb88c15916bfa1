//! Tier routing table (spec §4.6 "Tier routing rules"):
//! `LOW, MEDIUM → approved at RC`; `HIGH → RC forwards to GC, GC's decision
//! is final`; `EMERGENCY → LC may apply immediately`.

use pdsno_types::{RequestState, Sensitivity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Regional,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// Final approval happens right here, at this tier.
    ApproveHere,
    /// Forward upward; this tier's decision is not final.
    Forward(RequestState),
    /// Sensitivity is `Emergency` and the submitting LC may self-approve.
    SelfApprove,
}

/// Decide what a `tier` evaluating a request of the given `sensitivity`
/// should do next, assuming no lock conflict was found.
pub fn route(tier: Tier, sensitivity: Sensitivity) -> RoutingOutcome {
    match (tier, sensitivity) {
        (Tier::Local, Sensitivity::Emergency) => RoutingOutcome::SelfApprove,
        (Tier::Local, _) => RoutingOutcome::Forward(RequestState::PendingRegional),
        (Tier::Regional, Sensitivity::Low | Sensitivity::Medium) => RoutingOutcome::ApproveHere,
        (Tier::Regional, Sensitivity::High) => RoutingOutcome::Forward(RequestState::PendingGlobal),
        (Tier::Regional, Sensitivity::Emergency) => RoutingOutcome::ApproveHere,
        (Tier::Global, _) => RoutingOutcome::ApproveHere,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_and_medium_are_final_at_regional() {
        assert_eq!(route(Tier::Regional, Sensitivity::Low), RoutingOutcome::ApproveHere);
        assert_eq!(route(Tier::Regional, Sensitivity::Medium), RoutingOutcome::ApproveHere);
    }

    #[test]
    fn high_forwards_from_regional_to_global() {
        assert_eq!(
            route(Tier::Regional, Sensitivity::High),
            RoutingOutcome::Forward(RequestState::PendingGlobal)
        );
        assert_eq!(route(Tier::Global, Sensitivity::High), RoutingOutcome::ApproveHere);
    }

    #[test]
    fn emergency_self_approves_at_local() {
        assert_eq!(route(Tier::Local, Sensitivity::Emergency), RoutingOutcome::SelfApprove);
    }

    #[test]
    fn anything_non_emergency_at_local_goes_to_pending_regional_first() {
        assert_eq!(
            route(Tier::Local, Sensitivity::High),
            RoutingOutcome::Forward(RequestState::PendingRegional)
        );
    }
}
