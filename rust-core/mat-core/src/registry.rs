//! # Handler Registry
//!
//! Diagnostic table from adapted-handler identity to the name of the
//! business function it wraps. Append-only.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Identity of an adapted handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Numeric value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handler id to business-function name lookup
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    names: RwLock<BTreeMap<HandlerId, &'static str>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new handler and record its business-function name
    pub fn register(&self, name: &'static str) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, name);
        debug!(handler = %id, name, "handler registered");
        id
    }

    /// Business-function name recorded for `id`
    #[must_use]
    pub fn name(&self, id: HandlerId) -> Option<&'static str> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    /// Number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records in registration order
    #[must_use]
    pub fn entries(&self) -> Vec<(HandlerId, &'static str)> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, name)| (*id, *name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_register_and_lookup() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        let a = registry.register("app::get_user");
        let b = registry.register("app::create_user");
        assert_ne!(a, b);
        assert_eq!(registry.name(a), Some("app::get_user"));
        assert_eq!(registry.name(b), Some("app::create_user"));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.entries(),
            vec![(a, "app::get_user"), (b, "app::create_user")]
        );
    }

    #[test]
    fn test_unknown_id() {
        let registry = HandlerRegistry::new();
        let other = HandlerRegistry::new();
        let id = other.register("elsewhere");
        assert_eq!(registry.name(HandlerId(id.get() + 10)), None);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(HandlerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register("worker"))
            })
            .collect();
        let mut ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(registry.len(), 8);
    }
}
