//! Observer registry of a timer

use std::fmt;
use std::sync::Arc;

use super::Timer;

/// Callback invoked on every fire, with the timer that fired
pub type Observer = Arc<dyn Fn(&Timer) + Send + Sync>;

/// Token returned by [`Timer::observe`], used to remove the observer later
///
/// Tokens come from a per-timer counter that wraps to 0 on overflow. A
/// collision after 2^64 registrations on one timer is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverToken(u64);

impl ObserverToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Insertion-ordered table of observers
#[derive(Default)]
pub(crate) struct ObserverTable {
    last_token: u64,
    entries: Vec<(ObserverToken, Observer)>,
}

impl ObserverTable {
    pub fn insert(&mut self, observer: Observer) -> ObserverToken {
        self.last_token = self.last_token.wrapping_add(1);
        let token = ObserverToken(self.last_token);
        self.entries.push((token, observer));
        token
    }

    pub fn remove(&mut self, token: ObserverToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != token);
        self.entries.len() != before
    }

    pub fn contains(&self, token: ObserverToken) -> bool {
        self.entries.iter().any(|(existing, _)| *existing == token)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Copy of the current entries, for dispatch without holding the lock
    pub fn snapshot(&self) -> Vec<(ObserverToken, Observer)> {
        self.entries.clone()
    }
}
