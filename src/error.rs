//! Error types for layer construction and resolution.

use std::error::Error;
use std::sync::Arc;

use crate::debug::GraphDump;
use crate::key::TypeKey;

/// Boxed error returned by fallible generators.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Shared generator failure, kept behind an `Arc` so [`ResolveError`] stays `Clone`.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Problems detected while building a [`Layer`](crate::Layer).
///
/// Construction errors are unrecoverable: a layer is never handed out in a
/// partially valid state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// Two entries occupy the same slot and the layer is strict.
    #[error("duplicate registration for {key}")]
    DuplicateSlot {
        /// The contested type.
        key: TypeKey,
    },
    /// Two slots in one layer declare the same interface.
    #[error("interface {interface} is satisfied by both {first} and {second}")]
    AmbiguousInterface {
        /// The interface type.
        interface: TypeKey,
        /// The slot that declared it first.
        first: TypeKey,
        /// The slot that declared it again.
        second: TypeKey,
    },
    /// An interface was declared for a type this layer has no slot for.
    #[error("interface {interface} declared for {source_key}, which has no slot in this layer")]
    MissingImplementation {
        /// The interface type.
        interface: TypeKey,
        /// The type expected to back it.
        source_key: TypeKey,
    },
    /// A locked ancestor forbids replacing this type.
    #[error("cannot override {key}: an ancestor layer is locked and the type is not overridable")]
    LockedOverride {
        /// The type that was registered twice.
        key: TypeKey,
    },
    /// `maybe_value(None)` without `permit_nil`.
    #[error("nil value registered for {key}")]
    NilValue {
        /// The type of the missing value.
        key: TypeKey,
    },
    /// The generator has no value outputs.
    #[error("generator {generator} declares no output values")]
    NoOutputs {
        /// Generator signature.
        generator: String,
    },
    /// The generator's signature is malformed.
    #[error("invalid generator {generator}: {reason}")]
    InvalidGenerator {
        /// Generator signature.
        generator: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A required parameter resolves neither here nor in any ancestor.
    #[error("cannot resolve parameter {parameter} of generator {generator}")]
    UnresolvableParameter {
        /// The missing parameter type.
        parameter: TypeKey,
        /// Generator signature.
        generator: String,
    },
}

/// Failure to resolve a value from a layer.
///
/// Every variant carries the offending type and, when
/// [`EngineConfig::snapshot_on_error`](crate::EngineConfig::snapshot_on_error)
/// is enabled, a [`GraphDump`] taken at the point of failure. The snapshot
/// never appears in the `Display` output.
///
/// # Examples
///
/// ```rust
/// use stratum_di::{Layer, Resolver, ResolveError, TypeKey};
///
/// let layer = Layer::builder().build().unwrap();
/// match layer.resolve::<String>() {
///     Err(ResolveError::SlotNotFound { key, .. }) => {
///         assert_eq!(key, TypeKey::of::<String>());
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// No local or ancestor slot matches.
    #[error("no slot for {key}")]
    SlotNotFound {
        /// The requested type.
        key: TypeKey,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
    /// The request re-enters a slot that is already being resolved.
    #[error("cyclic dependency on {key}: {}", render_path(.path))]
    CyclicDependency {
        /// The slot that closed the cycle.
        key: TypeKey,
        /// The dependency path from `key` to the request that re-entered the cycle.
        path: Vec<TypeKey>,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
    /// The generator reported its own failure.
    #[error("generator {generator} for {key} failed: {source}")]
    GeneratorError {
        /// The requested type.
        key: TypeKey,
        /// Generator signature.
        generator: String,
        /// The generator's error.
        #[source]
        source: SharedError,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
    /// The generator produced an empty output without reporting an error.
    #[error("generator {generator} returned nil for {key}")]
    NilGeneratorResult {
        /// The empty output type.
        key: TypeKey,
        /// Generator signature.
        generator: String,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
    /// The call context was cancelled or past its deadline when the generator returned.
    #[error("resolution of {key} canceled")]
    Canceled {
        /// The requested type.
        key: TypeKey,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
    /// The resolution chain grew past the configured depth.
    #[error("max depth {depth} exceeded resolving {key}")]
    DepthExceeded {
        /// The type being resolved when the limit hit.
        key: TypeKey,
        /// The configured limit.
        depth: usize,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
    /// A stored value did not downcast to the requested type.
    #[error("type mismatch for {key}")]
    TypeMismatch {
        /// The requested type.
        key: TypeKey,
        /// Graph state at failure time.
        snapshot: Option<Arc<GraphDump>>,
    },
}

impl ResolveError {
    pub(crate) fn not_found(key: TypeKey) -> Self {
        ResolveError::SlotNotFound { key, snapshot: None }
    }

    pub(crate) fn mismatch(key: TypeKey) -> Self {
        ResolveError::TypeMismatch { key, snapshot: None }
    }

    /// The type the error is about.
    pub fn key(&self) -> TypeKey {
        match self {
            ResolveError::SlotNotFound { key, .. }
            | ResolveError::CyclicDependency { key, .. }
            | ResolveError::GeneratorError { key, .. }
            | ResolveError::NilGeneratorResult { key, .. }
            | ResolveError::Canceled { key, .. }
            | ResolveError::DepthExceeded { key, .. }
            | ResolveError::TypeMismatch { key, .. } => *key,
        }
    }

    /// The graph snapshot captured with this error, if any.
    pub fn snapshot(&self) -> Option<&GraphDump> {
        self.snapshot_slot().as_deref()
    }

    /// Returns true for errors that only mean "nothing is registered".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::SlotNotFound { .. })
    }

    pub(crate) fn with_snapshot(mut self, dump: GraphDump) -> Self {
        let slot = self.snapshot_slot_mut();
        if slot.is_none() {
            *slot = Some(Arc::new(dump));
        }
        self
    }

    fn snapshot_slot(&self) -> &Option<Arc<GraphDump>> {
        match self {
            ResolveError::SlotNotFound { snapshot, .. }
            | ResolveError::CyclicDependency { snapshot, .. }
            | ResolveError::GeneratorError { snapshot, .. }
            | ResolveError::NilGeneratorResult { snapshot, .. }
            | ResolveError::Canceled { snapshot, .. }
            | ResolveError::DepthExceeded { snapshot, .. }
            | ResolveError::TypeMismatch { snapshot, .. } => snapshot,
        }
    }

    fn snapshot_slot_mut(&mut self) -> &mut Option<Arc<GraphDump>> {
        match self {
            ResolveError::SlotNotFound { snapshot, .. }
            | ResolveError::CyclicDependency { snapshot, .. }
            | ResolveError::GeneratorError { snapshot, .. }
            | ResolveError::NilGeneratorResult { snapshot, .. }
            | ResolveError::Canceled { snapshot, .. }
            | ResolveError::DepthExceeded { snapshot, .. }
            | ResolveError::TypeMismatch { snapshot, .. } => snapshot,
        }
    }
}

fn render_path(path: &[TypeKey]) -> String {
    path.iter()
        .map(TypeKey::name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for resolution.
///
/// ```rust
/// use stratum_di::{DiResult, Layer, Resolver};
/// use std::sync::Arc;
///
/// fn port(layer: &Layer) -> DiResult<u16> {
///     let port: Arc<u16> = layer.resolve()?;
///     Ok(*port)
/// }
///
/// let layer = Layer::builder().value(8080u16).build().unwrap();
/// assert_eq!(port(&layer).unwrap(), 8080);
/// ```
pub type DiResult<T> = Result<T, ResolveError>;
