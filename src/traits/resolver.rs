//! Resolver traits.
//!
//! [`ResolverCore`] is the object-safe, type-erased pair of primitives the
//! engine exposes: "resolve a value for a key" and "is this key resolvable".
//! [`Resolver`] layers the typed conveniences on top and is implemented for
//! every `ResolverCore`.

use std::sync::Arc;

use crate::cancellation::CallContext;
use crate::error::{DiResult, ResolveError};
use crate::key::TypeKey;
use crate::slot::{unerase, AnyArc};

/// Type-erased resolution primitives.
pub trait ResolverCore: Send + Sync {
    /// Resolves `key` under `context`, returning the stored value.
    fn resolve_key(&self, key: TypeKey, context: &CallContext) -> DiResult<AnyArc>;

    /// True when `key` has a slot or interface binding here or in an
    /// ancestor. Never runs a generator.
    fn can_resolve_key(&self, key: TypeKey) -> bool;
}

/// Typed resolution.
///
/// `T` may be a concrete type or a trait object:
///
/// ```
/// use stratum_di::{Layer, Resolver};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let layer = Layer::builder()
///     .value(English)
///     .implements::<dyn Greeter, English>(|english| english)
///     .build()
///     .unwrap();
///
/// let greeter: Arc<dyn Greeter> = layer.resolve::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T` with a background context.
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve_with::<T>(&CallContext::background())
    }

    /// Resolves `T`, handing `context` to any generator that asks for it.
    fn resolve_with<T: ?Sized + Send + Sync + 'static>(&self, context: &CallContext) -> DiResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let stored = self.resolve_key(key, context)?;
        unerase::<T>(&stored).ok_or_else(|| ResolveError::mismatch(key))
    }

    /// Resolves `T`, mapping every failure to `None`.
    fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self.resolve::<T>() {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(ty = std::any::type_name::<T>(), %error, "try_resolve found nothing");
                None
            }
        }
    }

    /// True when `T` is registered here or in an ancestor.
    fn can_resolve<T: ?Sized + 'static>(&self) -> bool {
        self.can_resolve_key(TypeKey::of::<T>())
    }

    /// Resolves every key in order, stopping at the first failure.
    fn resolve_batch(&self, keys: &[TypeKey]) -> DiResult<()> {
        let context = CallContext::background();
        for key in keys {
            self.resolve_key(*key, &context)?;
        }
        Ok(())
    }

    /// Resolves `T` or panics with the error message.
    fn must<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.resolve::<T>()
            .unwrap_or_else(|e| panic!("failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
