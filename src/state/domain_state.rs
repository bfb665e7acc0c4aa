use std::time::{Duration, Instant};

/// Tracks the pacing state of one domain
///
/// Requests to a domain are spaced by reserving consecutive dispatch slots:
/// each reservation starts no earlier than the previous slot plus the
/// politeness gap chosen for it.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests dispatched to this domain
    pub request_count: u32,

    /// Earliest instant the next request may be dispatched
    pub next_slot: Option<Instant>,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next dispatch slot
    ///
    /// Returns the instant the caller may dispatch at. The following slot is
    /// pushed back by `gap`.
    pub fn reserve_slot(&mut self, now: Instant, gap: Duration) -> Instant {
        let slot = match self.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };

        self.request_count += 1;
        self.next_slot = Some(slot + gap);
        slot
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        match self.next_slot {
            Some(next) if next > now => Some(next - now),
            _ => None,
        }
    }
}
