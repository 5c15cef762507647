//! Layer construction and validation.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use super::{next_layer_id, CastFn, InterfaceBinding, Layer, LayerInner};
use crate::config::EngineConfig;
use crate::eager;
use crate::error::ConstructionError;
use crate::generator::{Generator, IntoGenerator};
use crate::internal::cycles;
use crate::key::TypeKey;
use crate::observer::{Observers, ResolutionObserver};
use crate::slot::{erase, unerase, AnyArc, Slot};
use crate::traits::ResolverCore;

enum Entry {
    Value { key: TypeKey, value: AnyArc },
    Nil { key: TypeKey },
    Generator { generator: Arc<Generator>, eager: bool },
    Interface { interface: TypeKey, source: TypeKey, cast: CastFn },
}

/// Who occupies a slot after registration order has been applied.
enum Occupant {
    Value(AnyArc),
    Generator { generator: Arc<Generator>, eager: bool },
}

/// Collects entries for a new [`Layer`] and validates them in [`build`](Self::build).
///
/// Entries are applied in the order they were added. Nothing is checked until
/// `build`, which either returns a fully valid layer or the first problem
/// found.
#[must_use = "a LayerBuilder does nothing until `build` is called"]
pub struct LayerBuilder {
    parent: Option<Layer>,
    entries: Vec<Entry>,
    overridable: AHashSet<TypeKey>,
    allow_override: bool,
    permit_nil: bool,
    locked: bool,
    label: Option<String>,
    config: Option<EngineConfig>,
    observers: Observers,
}

impl Default for LayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerBuilder {
    /// A builder for a root layer.
    pub fn new() -> Self {
        Self {
            parent: None,
            entries: Vec::new(),
            overridable: AHashSet::new(),
            allow_override: false,
            permit_nil: false,
            locked: false,
            label: None,
            config: None,
            observers: Observers::default(),
        }
    }

    /// Makes the built layer a child of `parent`.
    pub fn with_parent(mut self, parent: &Layer) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Registers a concrete value.
    pub fn value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.shared(Arc::new(value))
    }

    /// Registers an already shared value, including trait objects.
    ///
    /// ```
    /// use stratum_di::{Layer, Resolver};
    /// use std::fmt::Display;
    /// use std::sync::Arc;
    ///
    /// let banner: Arc<dyn Display + Send + Sync> = Arc::new("welcome");
    /// let layer = Layer::builder().shared(banner).build().unwrap();
    /// let shown = layer.resolve::<dyn Display + Send + Sync>().unwrap();
    /// assert_eq!(shown.to_string(), "welcome");
    /// ```
    pub fn shared<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.entries.push(Entry::Value {
            key: TypeKey::of::<T>(),
            value: erase(value),
        });
        self
    }

    /// Registers a value that may be absent.
    ///
    /// `None` fails the build with [`ConstructionError::NilValue`] unless
    /// [`permit_nil`](Self::permit_nil) was called, in which case the entry is
    /// skipped and lookups for `T` fall through to the parent.
    pub fn maybe_value<T: Send + Sync + 'static>(mut self, value: Option<T>) -> Self {
        match value {
            Some(value) => self.value(value),
            None => {
                self.entries.push(Entry::Nil { key: TypeKey::of::<T>() });
                self
            }
        }
    }

    /// Allows `maybe_value(None)` entries.
    pub fn permit_nil(mut self) -> Self {
        self.permit_nil = true;
        self
    }

    /// Registers a generator for its outputs.
    pub fn generator<M>(self, generator: impl IntoGenerator<M>) -> Self {
        self.push_generator(generator.into_generator(), false)
    }

    /// Registers a generator that starts running as soon as the layer is built.
    pub fn eager_generator<M>(self, generator: impl IntoGenerator<M>) -> Self {
        self.push_generator(generator.into_generator(), true)
    }

    fn push_generator(mut self, generator: Generator, eager: bool) -> Self {
        self.entries.push(Entry::Generator {
            generator: Arc::new(generator),
            eager,
        });
        self
    }

    /// Declares that the slot for `T` also answers requests for the interface `I`.
    ///
    /// `cast` is applied once, the first time `I` is requested.
    pub fn implements<I, T>(mut self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        let cast: CastFn = Box::new(move |stored| unerase::<T>(stored).map(|value| erase(cast(value))));
        self.entries.push(Entry::Interface {
            interface: TypeKey::of::<I>(),
            source: TypeKey::of::<T>(),
            cast,
        });
        self
    }

    /// Marks `T` as replaceable in descendants even when this layer is locked.
    pub fn overridable<T: ?Sized + 'static>(mut self) -> Self {
        self.overridable.insert(TypeKey::of::<T>());
        self
    }

    /// Lets later registrations of a type replace earlier ones instead of
    /// failing the build.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    /// Forbids descendants from replacing registrations, except for types
    /// marked [`overridable`](Self::overridable).
    pub fn lock(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Sets a label shown in dumps and logs.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Overrides the configuration inherited from the parent.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds an observer. Observers are inherited by child layers.
    pub fn observe(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Validates every entry and builds the layer.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConstructionError`] found. Eager generators are
    /// only launched once the layer is known to be valid.
    pub fn build(self) -> Result<Layer, ConstructionError> {
        let LayerBuilder {
            parent,
            entries,
            overridable,
            allow_override,
            permit_nil,
            locked,
            label,
            config,
            observers: own_observers,
        } = self;

        let restricted = parent.as_ref().is_some_and(Layer::has_locked_ancestor);
        let may_replace = |key: &TypeKey| -> Result<(), ConstructionError> {
            if !allow_override {
                return Err(ConstructionError::DuplicateSlot { key: *key });
            }
            // A layer's own marks only loosen the lock for its descendants.
            let marked = parent.as_ref().is_some_and(|p| p.overridable_in_ancestry(key));
            if restricted && !marked {
                return Err(ConstructionError::LockedOverride { key: *key });
            }
            Ok(())
        };

        let mut occupants: AHashMap<TypeKey, Occupant> = AHashMap::new();
        let mut order: Vec<TypeKey> = Vec::new();
        let mut generators: Vec<Arc<Generator>> = Vec::new();
        let mut declared: Vec<(TypeKey, TypeKey, CastFn)> = Vec::new();

        for entry in entries {
            match entry {
                Entry::Value { key, value } => {
                    if occupants.contains_key(&key) {
                        may_replace(&key)?;
                    } else {
                        order.push(key);
                    }
                    occupants.insert(key, Occupant::Value(value));
                }
                Entry::Nil { key } => {
                    if !permit_nil {
                        return Err(ConstructionError::NilValue { key });
                    }
                    tracing::trace!(ty = key.name(), "skipping nil value");
                }
                Entry::Generator { generator, eager } => {
                    generator.check()?;
                    for key in generator.outputs() {
                        if occupants.contains_key(key) {
                            may_replace(key)?;
                        } else {
                            order.push(*key);
                        }
                        occupants.insert(
                            *key,
                            Occupant::Generator {
                                generator: Arc::clone(&generator),
                                eager,
                            },
                        );
                    }
                    generators.push(generator);
                }
                Entry::Interface { interface, source, cast } => {
                    declared.push((interface, source, cast));
                }
            }
        }

        let mut interfaces: AHashMap<TypeKey, InterfaceBinding> = AHashMap::new();
        for (interface, source, cast) in declared {
            if !occupants.contains_key(&source) {
                return Err(ConstructionError::MissingImplementation {
                    interface,
                    source_key: source,
                });
            }
            if let Some(previous) = interfaces.get(&interface) {
                if !allow_override {
                    return Err(ConstructionError::AmbiguousInterface {
                        interface,
                        first: previous.source,
                        second: source,
                    });
                }
            }
            interfaces.insert(
                interface,
                InterfaceBinding {
                    source,
                    cast,
                    bound: OnceCell::new(),
                },
            );
        }

        // Generators whose every output was replaced never run.
        generators.retain(|generator| {
            generator.outputs().iter().any(|key| {
                matches!(occupants.get(key), Some(Occupant::Generator { generator: g, .. }) if Arc::ptr_eq(g, generator))
            })
        });

        for generator in &generators {
            for param in generator.params() {
                let Some(key) = param.required_dependency() else {
                    continue;
                };
                let local = occupants.contains_key(&key) || interfaces.contains_key(&key);
                let inherited = parent.as_ref().is_some_and(|p| p.can_resolve_key(key));
                if !local && !inherited {
                    return Err(ConstructionError::UnresolvableParameter {
                        parameter: key,
                        generator: generator.signature().to_string(),
                    });
                }
            }
        }

        let cyclic = classify_cycles(&generators, &occupants, &interfaces);

        let mut slots: AHashMap<TypeKey, Slot> = AHashMap::with_capacity(occupants.len());
        for (key, occupant) in occupants {
            let slot = match occupant {
                Occupant::Value(value) => Slot::with_value(key, value),
                Occupant::Generator { generator, eager } => {
                    let on_cycle = generators
                        .iter()
                        .position(|g| Arc::ptr_eq(g, &generator))
                        .is_some_and(|index| cyclic[index]);
                    let mut slot = Slot::with_generator(key, generator, eager);
                    slot.cyclic = on_cycle;
                    slot
                }
            };
            slots.insert(key, slot);
        }

        let config = config
            .or_else(|| parent.as_ref().map(|p| p.config().clone()))
            .unwrap_or_default();
        let mut observers = Observers::default();
        if let Some(parent) = &parent {
            observers.extend(&parent.inner.observers);
        }
        observers.extend(&own_observers);

        let eager_keys: Vec<TypeKey> = order
            .iter()
            .copied()
            .filter(|key| slots.get(key).is_some_and(|slot| slot.eager))
            .collect();

        let layer = Layer {
            inner: Arc::new(LayerInner {
                id: next_layer_id(),
                label,
                parent,
                slots,
                order,
                interfaces,
                imported: RwLock::new(AHashMap::new()),
                overridable,
                locked,
                config,
                observers,
                eager: Mutex::new(Vec::new()),
            }),
        };

        tracing::debug!(
            layer = layer.id(),
            label = layer.label().unwrap_or(""),
            slots = layer.inner.slots.len(),
            parent = layer.parent().map(Layer::id),
            "layer built"
        );

        if !eager_keys.is_empty() {
            let handles = eager::schedule(&layer, eager_keys);
            layer.inner.eager.lock().extend(handles);
        }
        Ok(layer)
    }
}

/// Flags, per generator, whether it sits on a dependency cycle within this layer.
fn classify_cycles(
    generators: &[Arc<Generator>],
    occupants: &AHashMap<TypeKey, Occupant>,
    interfaces: &AHashMap<TypeKey, InterfaceBinding>,
) -> Vec<bool> {
    let producer = |key: TypeKey| -> Option<usize> {
        let slot_key = if occupants.contains_key(&key) {
            key
        } else {
            interfaces.get(&key)?.source
        };
        match occupants.get(&slot_key)? {
            Occupant::Generator { generator, .. } => generators.iter().position(|g| Arc::ptr_eq(g, generator)),
            Occupant::Value(_) => None,
        }
    };
    cycles::cyclic_nodes(generators.len(), |index| {
        generators[index]
            .params()
            .iter()
            .filter_map(|param| param.dependency())
            .filter_map(&producer)
            .collect()
    })
}
