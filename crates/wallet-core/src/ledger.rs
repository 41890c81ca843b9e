//! Process-wide ledger of spent signing sessions
//!
//! A signing session must emit exactly one online message over its whole
//! lifetime, even if a caller serialises the session mid-protocol and
//! resurrects a copy. Every session gets a random identifier at
//! construction; the first online message registers it here and any replay
//! observes the existing entry. The set only grows for the lifetime of the
//! process.

use std::collections::HashSet;
use std::sync::{LazyLock, Mutex, MutexGuard};

use uuid::Uuid;

static SPENT: LazyLock<Mutex<HashSet<Uuid>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

fn guard() -> MutexGuard<'static, HashSet<Uuid>> {
    match SPENT.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Register a session as spent. Returns false if it was already spent.
pub(crate) fn mark_spent(id: Uuid) -> bool {
    guard().insert(id)
}

/// Whether a session id has already been spent
pub(crate) fn is_spent(id: &Uuid) -> bool {
    guard().contains(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_mark_is_rejected() {
        let id = Uuid::new_v4();
        assert!(!is_spent(&id));
        assert!(mark_spent(id));
        assert!(is_spent(&id));
        assert!(!mark_spent(id));
    }

    #[test]
    fn distinct_sessions_do_not_collide() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(mark_spent(a));
        assert!(mark_spent(b));
    }
}
