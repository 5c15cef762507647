//! Layers: one scope's slots plus a link to the enclosing scope.
//!
//! A [`Layer`] is built once through a [`LayerBuilder`], validated as a whole,
//! and then only ever changes by filling empty slots. Layers are cheap to
//! clone (an `Arc` bump) and safe to share between threads.
//!
//! ```
//! use stratum_di::{Layer, Resolver};
//! use std::sync::Arc;
//!
//! struct Db(&'static str);
//! struct User { db: Arc<Db>, name: String }
//!
//! let app = Layer::builder()
//!     .value(Db("primary"))
//!     .lock()
//!     .build()
//!     .unwrap();
//!
//! let request = app
//!     .child()
//!     .value(String::from("ada"))
//!     .generator(|db: Arc<Db>, name: Arc<String>| Arc::new(User { db, name: (*name).clone() }))
//!     .build()
//!     .unwrap();
//!
//! let user = request.resolve::<User>().unwrap();
//! assert_eq!(user.db.0, "primary");
//! assert_eq!(user.name, "ada");
//! assert!(app.try_resolve::<User>().is_none());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::debug::{GraphDump, InterfaceDump, LayerDump, SlotDump};
use crate::key::TypeKey;
use crate::observer::Observers;
use crate::slot::{AnyArc, Slot, SlotStatus};

mod builder;
mod resolve;

pub use builder::LayerBuilder;

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

fn next_layer_id() -> u64 {
    NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Casts a stored source value to the stored form of an interface.
pub(crate) type CastFn = Box<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// An interface declared by a slot of this layer.
pub(crate) struct InterfaceBinding {
    source: TypeKey,
    cast: CastFn,
    bound: OnceCell<AnyArc>,
}

/// A validated scope of slots.
#[derive(Clone)]
pub struct Layer {
    inner: Arc<LayerInner>,
}

struct LayerInner {
    id: u64,
    label: Option<String>,
    parent: Option<Layer>,
    slots: AHashMap<TypeKey, Slot>,
    /// Slot keys in first-registration order.
    order: Vec<TypeKey>,
    interfaces: AHashMap<TypeKey, InterfaceBinding>,
    imported: RwLock<AHashMap<TypeKey, AnyArc>>,
    overridable: AHashSet<TypeKey>,
    locked: bool,
    config: EngineConfig,
    observers: Observers,
    eager: Mutex<Vec<JoinHandle<()>>>,
}

impl Layer {
    /// Starts building a root layer.
    pub fn builder() -> LayerBuilder {
        LayerBuilder::new()
    }

    /// Starts building a child of this layer.
    ///
    /// The child inherits this layer's configuration and observers.
    pub fn child(&self) -> LayerBuilder {
        LayerBuilder::new().with_parent(self)
    }

    /// Process-unique id of this layer.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The label set with [`LayerBuilder::label`].
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// The enclosing layer, if any.
    pub fn parent(&self) -> Option<&Layer> {
        self.inner.parent.as_ref()
    }

    /// Whether this layer restricts overrides in its descendants.
    pub fn is_locked(&self) -> bool {
        self.inner.locked
    }

    /// The configuration this layer resolves with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Status of the local slot for `T`, if this layer has one.
    ///
    /// Values hoisted from an ancestor report
    /// [`SlotStatus::ImportedFromParent`]. An interface bound in this layer
    /// reports the status of the slot backing it.
    pub fn status_of<T: ?Sized + 'static>(&self) -> Option<SlotStatus> {
        let key = TypeKey::of::<T>();
        if let Some(slot) = self.inner.slots.get(&key) {
            return Some(slot.status());
        }
        if let Some(binding) = self.inner.interfaces.get(&key) {
            return self.inner.slots.get(&binding.source).map(Slot::status);
        }
        if self.inner.imported.read().contains_key(&key) {
            return Some(SlotStatus::ImportedFromParent);
        }
        None
    }

    /// This layer followed by each ancestor up to the root.
    pub fn ancestry(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(Some(self), |layer| layer.parent())
    }

    /// Deterministic listing of every slot from this layer up to the root.
    pub fn dump(&self) -> GraphDump {
        GraphDump {
            layers: self.ancestry().map(Layer::dump_local).collect(),
        }
    }

    fn dump_local(&self) -> LayerDump {
        let inner = &self.inner;
        let mut slots: Vec<SlotDump> = inner
            .order
            .iter()
            .filter_map(|key| inner.slots.get(key))
            .map(|slot| SlotDump {
                type_name: slot.key.name().to_string(),
                status: slot.status(),
                signature: slot.generator.as_ref().map(|g| g.signature().to_string()),
                eager: slot.eager,
            })
            .collect();
        slots.extend(inner.imported.read().keys().map(|key| SlotDump {
            type_name: key.name().to_string(),
            status: SlotStatus::ImportedFromParent,
            signature: None,
            eager: false,
        }));
        let interfaces = inner
            .interfaces
            .iter()
            .map(|(interface, binding)| InterfaceDump {
                interface: interface.name().to_string(),
                source: binding.source.name().to_string(),
                bound: binding.bound.get().is_some(),
            })
            .collect();

        let mut dump = LayerDump {
            id: inner.id,
            label: inner.label.clone(),
            locked: inner.locked,
            slots,
            interfaces,
        };
        dump.sort();
        dump
    }

    /// Waits for every eager task this layer launched at construction.
    ///
    /// Eager failures are only logged; call `resolve` afterwards to see them.
    pub fn join_eager(&self) {
        let handles = std::mem::take(&mut *self.inner.eager.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!(layer = self.inner.id, "eager task panicked outside resolution");
            }
        }
    }

    fn has_locked_ancestor(&self) -> bool {
        self.ancestry().any(Layer::is_locked)
    }

    fn overridable_in_ancestry(&self, key: &TypeKey) -> bool {
        self.ancestry().any(|layer| layer.inner.overridable.contains(key))
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("slots", &self.inner.slots.len())
            .field("observers", &self.inner.observers.len())
            .field("parent", &self.inner.parent.as_ref().map(Layer::id))
            .finish()
    }
}
