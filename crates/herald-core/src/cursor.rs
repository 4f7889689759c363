//! Acknowledging cursor for the pull-based update protocol.

use std::sync::atomic::{AtomicI64, Ordering};

/// Exclusive lower bound of the next update id to fetch.
///
/// The cursor only moves forward. A crash between fetch and advance
/// causes the platform to redeliver, which is the at-least-once contract.
#[derive(Debug, Default)]
pub struct Cursor {
    next: AtomicI64,
}

impl Cursor {
    /// Create a cursor starting at `next`.
    pub fn new(next: i64) -> Self {
        Self {
            next: AtomicI64::new(next),
        }
    }

    /// Move past `id`. Never decreases.
    pub fn advance(&self, id: i64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }

    /// The offset to request next.
    pub fn get(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Whether `id` has already been handed to the dispatcher.
    pub fn is_acknowledged(&self, id: i64) -> bool {
        id < self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        let cursor = Cursor::default();
        assert_eq!(cursor.get(), 0);
        assert!(!cursor.is_acknowledged(0));
    }

    #[test]
    fn test_advance_moves_past_id() {
        let cursor = Cursor::default();
        cursor.advance(41);
        assert_eq!(cursor.get(), 42);
        assert!(cursor.is_acknowledged(41));
        assert!(!cursor.is_acknowledged(42));
    }

    #[test]
    fn test_never_decreases() {
        let cursor = Cursor::default();
        let ids = [5, 9, 3, 9, 1, 12, 7];
        for id in ids {
            cursor.advance(id);
        }
        assert_eq!(cursor.get(), 13);

        cursor.advance(0);
        assert_eq!(cursor.get(), 13, "stale advance must not roll back");
    }

    #[test]
    fn test_get_is_at_least_max_seen_plus_one() {
        let cursor = Cursor::new(100);
        cursor.advance(50);
        assert_eq!(cursor.get(), 100);
        cursor.advance(100);
        assert_eq!(cursor.get(), 101);
    }

    #[test]
    fn test_advance_saturates_at_max() {
        let cursor = Cursor::default();
        cursor.advance(i64::MAX);
        assert_eq!(cursor.get(), i64::MAX);
    }
}
