//! Selection tokens and staleness guards.
//!
//! Every selection change issues a new [`SelectionToken`] from a shared
//! [`Generation`]. Asynchronous work captures a [`TokenWatch`] and wraps its
//! result in a [`Cancelable`], which only yields the value while the token is
//! still the current generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque, strictly increasing selection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionToken(u64);

impl SelectionToken {
    /// Token that predates every issued token.
    pub const INITIAL: Self = Self(0);

    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared generation counter. Clones observe the same counter.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token; it becomes the current generation.
    pub fn issue(&self) -> SelectionToken {
        SelectionToken(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn current(&self) -> SelectionToken {
        SelectionToken(self.0.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        self.current() == token
    }

    pub fn watch(&self, token: SelectionToken) -> TokenWatch {
        TokenWatch { token, generation: self.clone() }
    }
}

/// A token paired with the generation it must match.
#[derive(Debug, Clone)]
pub struct TokenWatch {
    token: SelectionToken,
    generation: Generation,
}

impl TokenWatch {
    pub fn token(&self) -> SelectionToken {
        self.token
    }

    pub fn is_current(&self) -> bool {
        self.generation.is_current(self.token)
    }

    /// Wrap a value produced under this token.
    pub fn guard<T>(&self, value: T) -> Cancelable<T> {
        Cancelable { value, watch: self.clone() }
    }
}

/// A value that can only be taken while its token is current.
#[derive(Debug)]
pub struct Cancelable<T> {
    value: T,
    watch: TokenWatch,
}

impl<T> Cancelable<T> {
    pub fn token(&self) -> SelectionToken {
        self.watch.token
    }

    pub fn is_current(&self) -> bool {
        self.watch.is_current()
    }

    /// Take the value, or drop it if a newer token has been issued.
    pub fn resume(self) -> Option<T> {
        if self.watch.is_current() {
            Some(self.value)
        } else {
            tracing::debug!(token = %self.watch.token, "discarding stale result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_increase() {
        let generation = Generation::new();
        assert_eq!(generation.current(), SelectionToken::INITIAL);
        let t1 = generation.issue();
        let t2 = generation.issue();
        assert!(t2 > t1);
        assert!(generation.is_current(t2));
        assert!(!generation.is_current(t1));
    }

    #[test]
    fn test_cancelable_resume() {
        let generation = Generation::new();
        let t1 = generation.issue();
        let fresh = generation.watch(t1).guard("mesh");
        assert!(fresh.is_current());
        assert_eq!(fresh.resume(), Some("mesh"));

        let stale = generation.watch(t1).guard(42);
        generation.issue();
        assert!(!stale.is_current());
        assert_eq!(stale.resume(), None);
    }

    #[test]
    fn test_clones_share_counter() {
        let a = Generation::new();
        let b = a.clone();
        let t = a.issue();
        assert!(b.is_current(t));
        let watch = b.watch(t);
        b.issue();
        assert!(!watch.is_current());
    }
}
