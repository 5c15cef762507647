//! Generator parameters.

use std::fmt;
use std::sync::Arc;

use crate::cancellation::CallContext;
use crate::error::{DiResult, ResolveError};
use crate::generator::Invocation;
use crate::key::TypeKey;
use crate::slot::unerase;

/// How a generator parameter is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSpec {
    /// Receives the caller's [`CallContext`].
    Context,
    /// Resolved from the layer the generator is registered in.
    Dependency {
        /// The type resolved for this parameter.
        key: TypeKey,
        /// Required parameters must be resolvable at construction time.
        required: bool,
    },
}

impl ParamSpec {
    /// The dependency key, if this parameter is one.
    pub fn dependency(&self) -> Option<TypeKey> {
        match self {
            ParamSpec::Context => None,
            ParamSpec::Dependency { key, .. } => Some(*key),
        }
    }

    pub(crate) fn required_dependency(&self) -> Option<TypeKey> {
        match self {
            ParamSpec::Dependency { key, required: true } => Some(*key),
            _ => None,
        }
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSpec::Context => f.write_str("CallContext"),
            ParamSpec::Dependency { key, required: true } => f.write_str(&key.short_name()),
            ParamSpec::Dependency { key, required: false } => {
                write!(f, "Option<{}>", key.short_name())
            }
        }
    }
}

/// A value a generator can take as an argument.
///
/// - `Arc<T>`: required dependency, resolved through the layer chain.
/// - `Option<Arc<T>>`: optional dependency, `None` when `T` has no slot anywhere.
/// - [`CallContext`]: the context the current request was made with.
pub trait Param: Sized + 'static {
    /// Describes the parameter for validation and diagnostics.
    fn spec() -> ParamSpec;

    /// Produces the argument for one invocation.
    fn fetch(invocation: &Invocation<'_>) -> DiResult<Self>;
}

impl<T: ?Sized + Send + Sync + 'static> Param for Arc<T> {
    fn spec() -> ParamSpec {
        ParamSpec::Dependency {
            key: TypeKey::of::<T>(),
            required: true,
        }
    }

    fn fetch(invocation: &Invocation<'_>) -> DiResult<Self> {
        let key = TypeKey::of::<T>();
        let stored = invocation.resolve_key(key)?;
        unerase::<T>(&stored).ok_or_else(|| ResolveError::mismatch(key))
    }
}

impl<T: ?Sized + Send + Sync + 'static> Param for Option<Arc<T>> {
    fn spec() -> ParamSpec {
        ParamSpec::Dependency {
            key: TypeKey::of::<T>(),
            required: false,
        }
    }

    fn fetch(invocation: &Invocation<'_>) -> DiResult<Self> {
        let key = TypeKey::of::<T>();
        match <Arc<T> as Param>::fetch(invocation) {
            Ok(value) => Ok(Some(value)),
            Err(ResolveError::SlotNotFound { key: missing, .. }) if missing == key => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Param for CallContext {
    fn spec() -> ParamSpec {
        ParamSpec::Context
    }

    fn fetch(invocation: &Invocation<'_>) -> DiResult<Self> {
        Ok(invocation.context().clone())
    }
}
