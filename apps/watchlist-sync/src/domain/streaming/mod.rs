//! Feed Generations
//!
//! Every feed instance is tagged with an [`Epoch`] when it is started. Events
//! carry the epoch of the instance that produced them, and the owner only
//! applies events whose epoch is still current. Tearing a feed down advances
//! the counter, so late callbacks from the old instance are ignored.

use std::fmt;

/// Generation number of one feed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(u64);

impl Epoch {
    /// Raw generation number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues epochs and answers whether one is still current.
#[derive(Debug, Default)]
pub struct EpochCounter {
    current: u64,
}

impl EpochCounter {
    /// Create a counter. No epoch has been issued yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Invalidate every outstanding epoch and issue a new one.
    pub const fn advance(&mut self) -> Epoch {
        self.current += 1;
        Epoch(self.current)
    }

    /// The most recently issued epoch.
    #[must_use]
    pub const fn current(&self) -> Epoch {
        Epoch(self.current)
    }

    /// True if `epoch` is the most recently issued one.
    #[must_use]
    pub const fn is_current(&self, epoch: Epoch) -> bool {
        epoch.0 == self.current
    }
}
