//! Resolution states of a product
//!
//! ```text
//! Discovered -> StaticExtracted -> Resolved
//!      |                       \-> AwaitingFollowUp -> Resolved
//!      |                                           \-> Failed
//!      \-> Failed (follow-up arrived for a page never extracted)
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionState {
    /// Product URL is known but its page has not been processed
    Discovered,
    /// Static page fields have been extracted
    StaticExtracted,
    /// Partial product is stored, waiting for its follow-up response
    AwaitingFollowUp,
    /// Finished record was produced
    Resolved,
    /// Follow-up arrived without a stored partial product; nothing emitted
    Failed,
}

impl ResolutionState {
    /// Checks whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: ResolutionState) -> bool {
        use ResolutionState::*;
        matches!(
            (self, next),
            (Discovered, StaticExtracted)
                | (StaticExtracted, Resolved)
                | (StaticExtracted, AwaitingFollowUp)
                | (AwaitingFollowUp, Resolved)
                | (AwaitingFollowUp, Failed)
                | (Discovered, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovered => "discovered",
            Self::StaticExtracted => "static_extracted",
            Self::AwaitingFollowUp => "awaiting_follow_up",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
