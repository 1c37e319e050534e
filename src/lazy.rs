//! `LazyBinding<T>`: a once-initialized value with an access counter (spec
//! §9 design notes). Used for symbols and components whose construction is
//! expensive enough to defer until first lookup, without each caller having
//! to hand-roll its own `OnceCell` plus counter.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct LazyBinding<T> {
    cell: OnceCell<T>,
    accesses: AtomicU64,
}

impl<T> LazyBinding<T> {
    pub fn new() -> Self {
        LazyBinding { cell: OnceCell::new(), accesses: AtomicU64::new(0) }
    }

    /// Returns the value, initializing it via `init` on first access. `init`
    /// runs at most once even under concurrent callers.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        self.cell.get_or_init(init)
    }

    /// The value if already initialized, without counting as an access or
    /// triggering initialization.
    pub fn peek(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn access_count(&self) -> u64 {
        self.accesses.load(Ordering::Relaxed)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for LazyBinding<T> {
    fn default() -> Self {
        LazyBinding::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn get_or_init_runs_the_initializer_once() {
        let calls = AtomicU32::new(0);
        let lazy: LazyBinding<u32> = LazyBinding::new();

        let first = *lazy.get_or_init(|| {
            calls.fetch_add(1, Ordering::Relaxed);
            42
        });
        let second = *lazy.get_or_init(|| {
            calls.fetch_add(1, Ordering::Relaxed);
            99
        });

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn access_count_increments_on_every_get_but_not_peek() {
        let lazy: LazyBinding<u32> = LazyBinding::new();
        assert_eq!(lazy.access_count(), 0);
        assert!(lazy.peek().is_none());
        lazy.get_or_init(|| 1);
        lazy.get_or_init(|| 1);
        assert_eq!(lazy.access_count(), 2);
        assert!(lazy.peek().is_some());
    }

    #[test]
    fn is_initialized_reflects_state() {
        let lazy: LazyBinding<u32> = LazyBinding::new();
        assert!(!lazy.is_initialized());
        lazy.get_or_init(|| 7);
        assert!(lazy.is_initialized());
    }
}
