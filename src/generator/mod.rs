//! Generators: functions that lazily produce one or more slot values.
//!
//! Any `Fn` of up to eight [`Param`]s returning a [`GeneratorReturn`] converts
//! into a [`Generator`] through [`IntoGenerator`]. The declared parameter and
//! output types are read off the function's signature, so the layer can
//! validate the wiring before anything runs.
//!
//! ```
//! use stratum_di::{Layer, Resolver};
//! use std::sync::Arc;
//!
//! struct Config { shards: usize }
//! struct Pool { size: usize }
//! struct Router { shards: usize }
//!
//! fn connect(config: Arc<Config>) -> (Arc<Pool>, Arc<Router>) {
//!     (Arc::new(Pool { size: config.shards * 4 }), Arc::new(Router { shards: config.shards }))
//! }
//!
//! let layer = Layer::builder()
//!     .value(Config { shards: 2 })
//!     .generator(connect)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(layer.resolve::<Router>().unwrap().shards, 2);
//! assert_eq!(layer.resolve::<Pool>().unwrap().size, 8);
//! ```

use std::fmt;

use smallvec::{smallvec, SmallVec};
use variadics_please::all_tuples;

use crate::cancellation::CallContext;
use crate::error::{BoxError, ConstructionError, DiResult, ResolveError};
use crate::internal::CycleChain;
use crate::key::TypeKey;
use crate::layer::Layer;
use crate::slot::AnyArc;

mod output;
mod param;

pub use output::{GeneratorReturn, Outputs, Product};
#[doc(hidden)]
pub use output::Products;
pub use param::{Param, ParamSpec};

/// Why an invocation produced no values.
pub(crate) enum InvokeError {
    /// A parameter failed to resolve.
    Resolve(ResolveError),
    /// The generator returned its error output.
    Failed(BoxError),
    /// The generator returned nil for this output.
    Nil(TypeKey),
}

type InvokeFn = Box<dyn Fn(&Invocation<'_>) -> Result<Products, InvokeError> + Send + Sync>;

fn boxed<F>(f: F) -> InvokeFn
where
    F: for<'a, 'b> Fn(&'a Invocation<'b>) -> Result<Products, InvokeError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// The arguments a generator is invoked with: the layer it belongs to, the
/// resolution chain so far, and the caller's [`CallContext`].
pub struct Invocation<'a> {
    layer: &'a Layer,
    chain: &'a CycleChain<'a>,
    context: &'a CallContext,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(layer: &'a Layer, chain: &'a CycleChain<'a>, context: &'a CallContext) -> Self {
        Self { layer, chain, context }
    }

    /// The context of the request that triggered this invocation.
    pub fn context(&self) -> &CallContext {
        self.context
    }

    /// Id of the layer the generator is registered in.
    pub fn layer_id(&self) -> u64 {
        self.layer.id()
    }

    pub(crate) fn resolve_key(&self, key: TypeKey) -> DiResult<AnyArc> {
        self.layer.resolve_in(key, self.chain, self.context)
    }
}

/// A type-erased generator with its declared signature.
pub struct Generator {
    name: &'static str,
    signature: String,
    params: SmallVec<[ParamSpec; 4]>,
    outputs: SmallVec<[TypeKey; 2]>,
    invoke: InvokeFn,
}

impl Generator {
    fn new(
        name: &'static str,
        params: SmallVec<[ParamSpec; 4]>,
        outputs: SmallVec<[TypeKey; 2]>,
        invoke: InvokeFn,
    ) -> Self {
        let signature = render_signature(name, &params, &outputs);
        Self {
            name,
            signature,
            params,
            outputs,
            invoke,
        }
    }

    /// The Rust type name of the underlying function.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable signature, e.g. `connect(Config) -> (Pool, Router)`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Declared parameters in order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Declared value outputs in order.
    pub fn outputs(&self) -> &[TypeKey] {
        &self.outputs
    }

    /// Checks the shape rules that the type system cannot express.
    pub(crate) fn check(&self) -> Result<(), ConstructionError> {
        if self.outputs.is_empty() {
            return Err(ConstructionError::NoOutputs {
                generator: self.signature.clone(),
            });
        }
        let contexts = self.params.iter().filter(|p| matches!(p, ParamSpec::Context)).count();
        if contexts > 1 {
            return Err(ConstructionError::InvalidGenerator {
                generator: self.signature.clone(),
                reason: "more than one CallContext parameter",
            });
        }
        for (i, key) in self.outputs.iter().enumerate() {
            if self.outputs[..i].contains(key) {
                return Err(ConstructionError::InvalidGenerator {
                    generator: self.signature.clone(),
                    reason: "the same type is produced twice",
                });
            }
        }
        Ok(())
    }

    pub(crate) fn invoke(&self, invocation: &Invocation<'_>) -> Result<Products, InvokeError> {
        (self.invoke)(invocation)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Short label for a function's type name: the last path segment, or the
/// enclosing function plus `{{closure}}` for closures.
fn function_label(name: &'static str) -> String {
    let head = name.split('<').next().unwrap_or(name);
    let mut segments = head.rsplit("::");
    match segments.next() {
        Some("{{closure}}") => match segments.next() {
            Some(outer) => format!("{outer}::{{{{closure}}}}"),
            None => "{{closure}}".to_string(),
        },
        Some(last) => last.to_string(),
        None => name.to_string(),
    }
}

fn render_signature(name: &'static str, params: &[ParamSpec], outputs: &[TypeKey]) -> String {
    let params = params.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    let rendered: Vec<String> = outputs.iter().map(TypeKey::short_name).collect();
    let outputs = match rendered.len() {
        0 => "()".to_string(),
        1 => rendered[0].clone(),
        _ => format!("({})", rendered.join(", ")),
    };
    format!("{}({}) -> {}", function_label(name), params, outputs)
}

/// Converts a function into a [`Generator`].
///
/// Implemented for every `Fn(P0, .., Pn) -> R` with `n <= 8`, where each
/// `Pi: Param` and `R: GeneratorReturn`. `Marker` only disambiguates arities.
pub trait IntoGenerator<Marker>: Send + Sync + 'static {
    /// Performs the conversion.
    fn into_generator(self) -> Generator;
}

macro_rules! impl_into_generator {
    ($($param:ident),*) => {
        impl<Func, Ret, $($param),*> IntoGenerator<fn($($param,)*) -> Ret> for Func
        where
            Func: Fn($($param),*) -> Ret + Send + Sync + 'static,
            Ret: GeneratorReturn,
            $($param: Param,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn into_generator(self) -> Generator {
                let params: SmallVec<[ParamSpec; 4]> = smallvec![$(<$param as Param>::spec()),*];
                Generator::new(
                    std::any::type_name::<Func>(),
                    params,
                    <Ret::Values as Outputs>::keys(),
                    boxed(move |invocation| {
                        $(let $param = <$param as Param>::fetch(invocation).map_err(InvokeError::Resolve)?;)*
                        let values = (self)($($param),*).into_result().map_err(InvokeError::Failed)?;
                        values.into_products().map_err(InvokeError::Nil)
                    }),
                )
            }
        }
    };
}

all_tuples!(impl_into_generator, 0, 8, P);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Widget;
    struct Doodad;

    fn make_pair(_w: Arc<Widget>) -> Result<(Arc<Doodad>, Arc<u8>), std::io::Error> {
        Ok((Arc::new(Doodad), Arc::new(1)))
    }

    #[test]
    fn signature_is_read_from_function_type() {
        let generator = make_pair.into_generator();
        assert_eq!(generator.signature(), "make_pair(Widget) -> (Doodad, u8)");
        assert_eq!(generator.outputs(), &[TypeKey::of::<Doodad>(), TypeKey::of::<u8>()]);
        assert!(generator.check().is_ok());
    }

    #[test]
    fn closure_label_names_enclosing_function() {
        let generator = (|| Arc::new(Widget)).into_generator();
        assert!(generator.signature().ends_with("{{closure}}() -> Widget"));
        assert!(generator.signature().starts_with("closure_label_names_enclosing_function"));
    }

    #[test]
    fn shape_rules_are_checked() {
        let no_outputs = (|_w: Arc<Widget>| ()).into_generator();
        assert!(matches!(no_outputs.check(), Err(ConstructionError::NoOutputs { .. })));

        let two_contexts = (|_a: CallContext, _b: CallContext| Arc::new(Widget)).into_generator();
        assert!(matches!(
            two_contexts.check(),
            Err(ConstructionError::InvalidGenerator { .. })
        ));

        let duplicate = (|| (Arc::new(Widget), Arc::new(Widget))).into_generator();
        assert!(matches!(duplicate.check(), Err(ConstructionError::InvalidGenerator { .. })));
    }
}
