//! Slot storage.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::generator::Generator;
use crate::key::TypeKey;

/// Type-erased value as stored in a slot: an `Arc<dyn Any>` wrapping an `Arc<T>`.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Wraps a typed `Arc` into the storage format.
pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

/// Recovers the typed `Arc` from the storage format.
pub(crate) fn unerase<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> Option<Arc<T>> {
    value.downcast_ref::<Arc<T>>().cloned()
}

/// Lifecycle of a slot as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize))]
pub enum SlotStatus {
    /// Registered with a concrete value.
    DirectValue,
    /// Backed by a generator that has not produced a value yet.
    GeneratorPending,
    /// Backed by a generator whose value has been memoized.
    GeneratorResolved,
    /// Copied from an ancestor layer as a lookup cache.
    ImportedFromParent,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotStatus::DirectValue => "value",
            SlotStatus::GeneratorPending => "pending",
            SlotStatus::GeneratorResolved => "resolved",
            SlotStatus::ImportedFromParent => "imported",
        };
        f.write_str(s)
    }
}

/// One type's storage within a layer.
///
/// Values are write-once: `value` goes from empty to filled exactly once and
/// is never replaced. `lock` is taken only when the generator has to run.
pub(crate) struct Slot {
    pub(crate) key: TypeKey,
    pub(crate) value: OnceCell<AnyArc>,
    pub(crate) generator: Option<Arc<Generator>>,
    pub(crate) lock: Mutex<()>,
    pub(crate) eager: bool,
    /// Set at construction when the generator sits on a same-layer cycle.
    pub(crate) cyclic: bool,
}

impl Slot {
    pub(crate) fn with_value(key: TypeKey, value: AnyArc) -> Self {
        Self {
            key,
            value: OnceCell::with_value(value),
            generator: None,
            lock: Mutex::new(()),
            eager: false,
            cyclic: false,
        }
    }

    pub(crate) fn with_generator(key: TypeKey, generator: Arc<Generator>, eager: bool) -> Self {
        Self {
            key,
            value: OnceCell::new(),
            generator: Some(generator),
            lock: Mutex::new(()),
            eager,
            cyclic: false,
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self) -> Option<&AnyArc> {
        self.value.get()
    }

    pub(crate) fn status(&self) -> SlotStatus {
        match (&self.generator, self.value.get()) {
            (None, _) => SlotStatus::DirectValue,
            (Some(_), None) => SlotStatus::GeneratorPending,
            (Some(_), Some(_)) => SlotStatus::GeneratorResolved,
        }
    }

    /// True when `generator` is the one backing this slot.
    pub(crate) fn is_fed_by(&self, generator: &Arc<Generator>) -> bool {
        self.generator
            .as_ref()
            .is_some_and(|own| Arc::ptr_eq(own, generator))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key)
            .field("status", &self.status())
            .field("eager", &self.eager)
            .finish()
    }
}
