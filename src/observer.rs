//! Hooks for observing generator runs and parent delegation.
//!
//! Observers are registered on a [`LayerBuilder`](crate::LayerBuilder) and
//! inherited by every child layer built from it. Calls are made synchronously on
//! the resolving thread, so implementations should stay cheap.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ResolveError;
use crate::key::TypeKey;

/// Observer for resolution events.
///
/// Every hook has an empty default, so an observer only implements what it
/// cares about.
///
/// # Examples
///
/// ```
/// use stratum_di::{Layer, ResolutionObserver, Resolver, TypeKey};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct RunCounter(AtomicUsize);
///
/// impl ResolutionObserver for RunCounter {
///     fn generator_finished(&self, _layer: u64, _requested: TypeKey, _generator: &str, _took: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(RunCounter::default());
/// let layer = Layer::builder()
///     .generator(|| Arc::new(42u32))
///     .observe(counter.clone())
///     .build()
///     .unwrap();
///
/// layer.resolve::<u32>().unwrap();
/// layer.resolve::<u32>().unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// A generator is about to run to produce `requested`.
    fn generator_started(&self, layer: u64, requested: TypeKey, generator: &str) {
        let _ = (layer, requested, generator);
    }

    /// A generator ran and its outputs were stored.
    fn generator_finished(&self, layer: u64, requested: TypeKey, generator: &str, took: Duration) {
        let _ = (layer, requested, generator, took);
    }

    /// A generator ran (or could not be started) and nothing was stored.
    fn generator_failed(&self, layer: u64, requested: TypeKey, generator: &str, error: &ResolveError) {
        let _ = (layer, requested, generator, error);
    }

    /// `requested` had no local slot and was looked up in the parent layer.
    fn parent_delegated(&self, layer: u64, requested: TypeKey, parent: u64) {
        let _ = (layer, requested, parent);
    }
}

#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn extend(&mut self, other: &Observers) {
        self.observers.extend(other.observers.iter().cloned());
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn generator_started(&self, layer: u64, requested: TypeKey, generator: &str) {
        for observer in &self.observers {
            observer.generator_started(layer, requested, generator);
        }
    }

    #[inline]
    pub(crate) fn generator_finished(&self, layer: u64, requested: TypeKey, generator: &str, took: Duration) {
        for observer in &self.observers {
            observer.generator_finished(layer, requested, generator, took);
        }
    }

    #[inline]
    pub(crate) fn generator_failed(&self, layer: u64, requested: TypeKey, generator: &str, error: &ResolveError) {
        for observer in &self.observers {
            observer.generator_failed(layer, requested, generator, error);
        }
    }

    #[inline]
    pub(crate) fn parent_delegated(&self, layer: u64, requested: TypeKey, parent: u64) {
        for observer in &self.observers {
            observer.parent_delegated(layer, requested, parent);
        }
    }
}

/// Observer that forwards every event to `tracing` at `info`/`warn` level.
///
/// The engine already emits `debug`/`trace` events on its own; this observer
/// is for callers who want generator runs visible at a coarser filter.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    target_label: Option<String>,
}

impl TracingObserver {
    /// Creates an observer with no label.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observer that tags each event with `label`.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            target_label: Some(label.into()),
        }
    }

    fn label(&self) -> &str {
        self.target_label.as_deref().unwrap_or("stratum")
    }
}

impl ResolutionObserver for TracingObserver {
    fn generator_finished(&self, layer: u64, requested: TypeKey, generator: &str, took: Duration) {
        tracing::info!(
            label = self.label(),
            layer,
            ty = requested.name(),
            generator,
            took_us = took.as_micros() as u64,
            "generator finished"
        );
    }

    fn generator_failed(&self, layer: u64, requested: TypeKey, generator: &str, error: &ResolveError) {
        tracing::warn!(
            label = self.label(),
            layer,
            ty = requested.name(),
            generator,
            %error,
            "generator failed"
        );
    }

    fn parent_delegated(&self, layer: u64, requested: TypeKey, parent: u64) {
        tracing::info!(label = self.label(), layer, ty = requested.name(), parent, "delegated to parent");
    }
}
