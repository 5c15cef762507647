//! The resolution algorithm.
//!
//! A request walks: exact slot, interface binding, import cache, parent.
//! Only a slot whose generator has to run takes locks, and it takes every
//! output lock of that generator in [`TypeKey`] order so two requests needing
//! overlapping outputs can never wait on each other in a circle.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::MutexGuard;
use smallvec::SmallVec;

use super::Layer;
use crate::cancellation::CallContext;
use crate::error::{DiResult, ResolveError};
use crate::generator::{Generator, Invocation, InvokeError};
use crate::internal::{cycles, CycleChain};
use crate::key::TypeKey;
use crate::slot::{AnyArc, Slot};
use crate::traits::ResolverCore;

impl Layer {
    pub(crate) fn resolve_in(
        &self,
        key: TypeKey,
        chain: &CycleChain<'_>,
        context: &CallContext,
    ) -> DiResult<AnyArc> {
        let inner = &self.inner;

        if let Some(slot) = inner.slots.get(&key) {
            if let Some(value) = slot.get() {
                tracing::trace!(layer = inner.id, ty = key.name(), "slot hit");
                return Ok(Arc::clone(value));
            }
            return self.run_generator(slot, key, chain, context);
        }

        if let Some(binding) = inner.interfaces.get(&key) {
            if let Some(value) = binding.bound.get() {
                return Ok(Arc::clone(value));
            }
            let source = self.resolve_in(binding.source, chain, context)?;
            let cast = (binding.cast)(&source).ok_or_else(|| ResolveError::mismatch(key))?;
            tracing::trace!(layer = inner.id, ty = key.name(), source = binding.source.name(), "interface bound");
            return Ok(Arc::clone(binding.bound.get_or_init(|| cast)));
        }

        if let Some(value) = inner.imported.read().get(&key) {
            return Ok(Arc::clone(value));
        }

        let Some(parent) = &inner.parent else {
            return Err(ResolveError::not_found(key));
        };
        inner.observers.parent_delegated(inner.id, key, parent.id());
        tracing::trace!(layer = inner.id, ty = key.name(), parent = parent.id(), "delegating to parent");
        let value = parent.resolve_in(key, chain, context)?;
        if inner.config.hoist_parent_values {
            let mut imported = inner.imported.write();
            let hoisted = imported.entry(key).or_insert_with(|| Arc::clone(&value));
            return Ok(Arc::clone(hoisted));
        }
        Ok(value)
    }

    fn run_generator(
        &self,
        slot: &Slot,
        key: TypeKey,
        chain: &CycleChain<'_>,
        context: &CallContext,
    ) -> DiResult<AnyArc> {
        let inner = &self.inner;
        let Some(generator) = &slot.generator else {
            return Err(ResolveError::not_found(key));
        };

        if let Err(error) = self.precheck(slot, generator, key, chain, context) {
            inner.observers.generator_failed(inner.id, key, generator.signature(), &error);
            return Err(error);
        }

        // Outputs replaced by later registrations belong to other slots now.
        let mut owned: SmallVec<[TypeKey; 2]> = generator
            .outputs()
            .iter()
            .copied()
            .filter(|output| inner.slots.get(output).is_some_and(|s| s.is_fed_by(generator)))
            .collect();
        owned.sort_unstable();
        let _guards: SmallVec<[MutexGuard<'_, ()>; 2]> = owned
            .iter()
            .filter_map(|output| inner.slots.get(output))
            .map(|s| s.lock.lock())
            .collect();

        if let Some(value) = slot.get() {
            tracing::trace!(layer = inner.id, ty = key.name(), "filled while waiting for lock");
            return Ok(Arc::clone(value));
        }

        let frame = chain.push(inner.id, key, &owned);
        inner.observers.generator_started(inner.id, key, generator.signature());
        tracing::debug!(
            layer = inner.id,
            ty = key.name(),
            generator = generator.signature(),
            depth = frame.depth(),
            "running generator"
        );
        let started = Instant::now();
        let result = generator.invoke(&Invocation::new(self, &frame, context));

        let outcome = if context.is_cancelled() {
            Err(ResolveError::Canceled { key, snapshot: None })
        } else {
            match result {
                Ok(products) => {
                    for (output, value) in generator.outputs().iter().zip(products) {
                        if let Some(target) = inner.slots.get(output).filter(|s| s.is_fed_by(generator)) {
                            // Only ever set under the output locks held above.
                            let filled = target.value.set(value).is_ok();
                            debug_assert!(filled, "slot for {} filled twice", output.name());
                        }
                    }
                    slot.get().cloned().ok_or_else(|| ResolveError::mismatch(key))
                }
                Err(InvokeError::Resolve(error)) => Err(error),
                Err(InvokeError::Failed(source)) => Err(ResolveError::GeneratorError {
                    key,
                    generator: generator.signature().to_string(),
                    source: Arc::from(source),
                    snapshot: None,
                }),
                Err(InvokeError::Nil(output)) => Err(ResolveError::NilGeneratorResult {
                    key: output,
                    generator: generator.signature().to_string(),
                    snapshot: None,
                }),
            }
        };

        match &outcome {
            Ok(_) => {
                let took = started.elapsed();
                tracing::debug!(
                    layer = inner.id,
                    ty = key.name(),
                    took_us = took.as_micros() as u64,
                    "generator finished"
                );
                inner.observers.generator_finished(inner.id, key, generator.signature(), took);
            }
            Err(error) => {
                tracing::debug!(layer = inner.id, ty = key.name(), %error, "generator failed");
                inner.observers.generator_failed(inner.id, key, generator.signature(), error);
            }
        }
        outcome
    }

    /// Checks that must pass before any output lock is taken.
    fn precheck(
        &self,
        slot: &Slot,
        generator: &Arc<Generator>,
        key: TypeKey,
        chain: &CycleChain<'_>,
        context: &CallContext,
    ) -> DiResult<()> {
        let inner = &self.inner;
        if chain.contains(inner.id, key) {
            return Err(ResolveError::CyclicDependency {
                key,
                path: chain.path_to(inner.id, key),
                snapshot: None,
            });
        }
        if slot.cyclic {
            return Err(ResolveError::CyclicDependency {
                key,
                path: self.static_cycle_path(key, generator),
                snapshot: None,
            });
        }
        if chain.depth() >= inner.config.max_depth {
            return Err(ResolveError::DepthExceeded {
                key,
                depth: inner.config.max_depth,
                snapshot: None,
            });
        }
        if context.is_cancelled() {
            return Err(ResolveError::Canceled { key, snapshot: None });
        }
        Ok(())
    }

    /// A dependency path from `key` back to a slot fed by `generator`.
    fn static_cycle_path(&self, key: TypeKey, generator: &Arc<Generator>) -> Vec<TypeKey> {
        let inner = &self.inner;
        let backing = |dependency: TypeKey| -> Option<TypeKey> {
            let slot_key = if inner.slots.contains_key(&dependency) {
                dependency
            } else {
                inner.interfaces.get(&dependency)?.source
            };
            inner.slots.get(&slot_key).filter(|s| s.generator.is_some()).map(|_| dependency)
        };
        let deps = |from: TypeKey| -> Vec<TypeKey> {
            let from_slot = inner
                .slots
                .get(&from)
                .or_else(|| inner.interfaces.get(&from).and_then(|b| inner.slots.get(&b.source)));
            from_slot
                .and_then(|s| s.generator.as_ref())
                .map(|g| g.params().iter().filter_map(|p| p.dependency()).filter_map(backing).collect())
                .unwrap_or_default()
        };
        let closes = |candidate: TypeKey| {
            let target = inner
                .slots
                .get(&candidate)
                .or_else(|| inner.interfaces.get(&candidate).and_then(|b| inner.slots.get(&b.source)));
            target.is_some_and(|s| s.is_fed_by(generator))
        };
        cycles::find_path(key, deps, closes)
    }

    /// Resolves `T` on tokio's blocking pool.
    ///
    /// Generators run synchronously and slot locks block, so async callers
    /// should go through here rather than calling [`resolve`](crate::Resolver::resolve)
    /// on an executor thread.
    #[cfg(feature = "async")]
    pub async fn resolve_async<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve_async_with::<T>(CallContext::background()).await
    }

    /// [`resolve_async`](Self::resolve_async) with an explicit context.
    #[cfg(feature = "async")]
    pub async fn resolve_async_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        context: CallContext,
    ) -> DiResult<Arc<T>> {
        use crate::traits::Resolver;

        let layer = self.clone();
        match tokio::task::spawn_blocking(move || layer.resolve_with::<T>(&context)).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(_) => Err(ResolveError::Canceled {
                key: TypeKey::of::<T>(),
                snapshot: None,
            }),
        }
    }
}

impl ResolverCore for Layer {
    fn resolve_key(&self, key: TypeKey, context: &CallContext) -> DiResult<AnyArc> {
        let chain = CycleChain::root();
        self.resolve_in(key, &chain, context).map_err(|error| {
            tracing::debug!(layer = self.inner.id, ty = key.name(), %error, "resolution failed");
            if self.inner.config.snapshot_on_error {
                error.with_snapshot(self.dump())
            } else {
                error
            }
        })
    }

    fn can_resolve_key(&self, key: TypeKey) -> bool {
        self.ancestry().any(|layer| {
            let inner = &layer.inner;
            inner.slots.contains_key(&key)
                || inner.interfaces.contains_key(&key)
                || inner.imported.read().contains_key(&key)
        })
    }
}
