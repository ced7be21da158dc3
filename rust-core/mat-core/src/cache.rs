//! # Binding Descriptor Cache
//!
//! Process-wide cache of [`Descriptor`]s keyed by (request type, source kind).
//!
//! Discovery runs at most once per pair and is published under a write lock,
//! so a partially built descriptor is never observable. Concurrent first
//! lookups may build the descriptor redundantly; the first one inserted wins
//! and every caller gets that instance.

use crate::binding::{Bind, Descriptor};
use crate::source::SourceKind;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::trace;

type Entry = Option<Arc<dyn Any + Send + Sync>>;

/// Type-keyed descriptor storage
///
/// Uses `TypeId` plus `SourceKind` for O(1) lookups. Absent descriptors are
/// cached too, so a type without bindings for a source is never rescanned.
#[derive(Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<(TypeId, SourceKind), Entry>>,
}

impl DescriptorCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<DescriptorCache> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Descriptor of `T` for `kind`, discovering it on first use
    pub fn descriptor<T: Bind>(&self, kind: SourceKind) -> Option<Arc<Descriptor<T>>> {
        let key = (TypeId::of::<T>(), kind);

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&key) {
                return downcast(entry.as_ref());
            }
        }

        let discovered: Entry = Descriptor::new(kind, T::bindings(kind))
            .map(|d| Arc::new(d) as Arc<dyn Any + Send + Sync>);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key).or_insert_with(|| {
            trace!(
                request_type = std::any::type_name::<T>(),
                source = %kind,
                present = discovered.is_some(),
                "binding descriptor discovered"
            );
            discovered
        });
        downcast(entry.as_ref())
    }

    /// Number of cached (type, source) pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing has been discovered yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("entries", &self.len())
            .finish()
    }
}

fn downcast<T: Bind>(entry: Option<&Arc<dyn Any + Send + Sync>>) -> Option<Arc<Descriptor<T>>> {
    entry.and_then(|any| Arc::clone(any).downcast::<Descriptor<T>>().ok())
}

/// Descriptor of `T` for `kind` from the process-wide cache
pub fn descriptor<T: Bind>(kind: SourceKind) -> Option<Arc<Descriptor<T>>> {
    DescriptorCache::global().descriptor::<T>(kind)
}
