//! Cosmetic countdown shown while audio is being created.
//!
//! Seeded from the service's advisory estimate, decremented once per tick
//! and floored at zero. It never feeds back into the phase or the poll
//! cadence.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Countdown {
    remaining: u64,
}

impl Countdown {
    pub fn seeded(estimate_secs: u64) -> Self {
        Self {
            remaining: estimate_secs,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// One tick. Returns the new remaining value.
    pub fn tick(&mut self) -> u64 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.remaining > 0 {
            write!(f, "{} seconds", self.remaining)
        } else {
            f.write_str("any minute now!")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_down_to_zero_and_stays() {
        let mut c = Countdown::seeded(3);
        assert_eq!(c.tick(), 2);
        assert_eq!(c.tick(), 1);
        assert_eq!(c.tick(), 0);
        assert!(c.is_finished());
        assert_eq!(c.tick(), 0);
    }

    #[test]
    fn reaches_zero_after_exactly_estimate_ticks() {
        let mut c = Countdown::seeded(30);
        for _ in 0..29 {
            c.tick();
        }
        assert_eq!(c.remaining(), 1);
        c.tick();
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn display() {
        assert_eq!(Countdown::seeded(12).to_string(), "12 seconds");
        assert_eq!(Countdown::seeded(0).to_string(), "any minute now!");
    }
}
