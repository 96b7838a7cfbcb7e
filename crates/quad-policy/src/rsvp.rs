use quad_types::models::{EventCounters, RsvpChoice, RsvpState};

use crate::error::{Error, Result};

/// Resolves a request against the held state. Asking for what you already
/// hold clears it.
pub fn resolve(current: Option<RsvpState>, desired: RsvpChoice) -> Option<RsvpState> {
    match (current, desired.state()) {
        (Some(held), Some(wanted)) if held == wanted => None,
        (_, next) => next,
    }
}

/// Capacity rule for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub max_slots: Option<u32>,
    pub enforce: bool,
}

impl Capacity {
    /// Only a move *into* `going` can overflow; staying or leaving never fails.
    pub fn check(
        self,
        current: Option<RsvpState>,
        next: Option<RsvpState>,
        counters: EventCounters,
    ) -> Result<()> {
        let joining = next == Some(RsvpState::Going) && current != Some(RsvpState::Going);
        match self.max_slots {
            Some(max_slots) if self.enforce && joining && counters.going >= max_slots => {
                Err(Error::CapacityExceeded { max_slots })
            }
            _ => Ok(()),
        }
    }
}
