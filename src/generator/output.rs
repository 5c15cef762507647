//! Generator outputs.

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};
use variadics_please::all_tuples;

use crate::error::BoxError;
use crate::key::TypeKey;
use crate::slot::{erase, AnyArc};

/// Type-erased output values in declaration order.
#[doc(hidden)]
pub type Products = SmallVec<[AnyArc; 2]>;

/// A single value a generator produces.
///
/// `Arc<T>` always yields a value. `Option<Arc<T>>` is the nil-able form:
/// returning `None` fails the resolution with
/// [`ResolveError::NilGeneratorResult`](crate::ResolveError::NilGeneratorResult)
/// instead of storing an empty value.
pub trait Product: Send + 'static {
    /// The slot this product fills.
    fn key() -> TypeKey;

    /// Converts into the storage format; `None` means nil.
    fn into_stored(self) -> Option<AnyArc>;
}

impl<T: ?Sized + Send + Sync + 'static> Product for Arc<T> {
    fn key() -> TypeKey {
        TypeKey::of::<T>()
    }

    fn into_stored(self) -> Option<AnyArc> {
        Some(erase(self))
    }
}

impl<T: ?Sized + Send + Sync + 'static> Product for Option<Arc<T>> {
    fn key() -> TypeKey {
        TypeKey::of::<T>()
    }

    fn into_stored(self) -> Option<AnyArc> {
        self.map(erase)
    }
}

/// The full set of values a generator produces: one [`Product`] or a tuple of them.
///
/// `()` implements `Outputs` with no keys so that a generator returning nothing
/// is rejected at construction rather than failing to type-check somewhere less
/// obvious.
pub trait Outputs: Send + 'static {
    /// Output slot keys in declaration order.
    fn keys() -> SmallVec<[TypeKey; 2]>;

    /// Splits into stored values; `Err` names the first nil output.
    #[doc(hidden)]
    fn into_products(self) -> Result<Products, TypeKey>;
}

impl<P: Product> Outputs for P {
    fn keys() -> SmallVec<[TypeKey; 2]> {
        smallvec![P::key()]
    }

    fn into_products(self) -> Result<Products, TypeKey> {
        let stored = self.into_stored().ok_or_else(P::key)?;
        Ok(smallvec![stored])
    }
}

impl Outputs for () {
    fn keys() -> SmallVec<[TypeKey; 2]> {
        SmallVec::new()
    }

    fn into_products(self) -> Result<Products, TypeKey> {
        Ok(Products::new())
    }
}

macro_rules! impl_outputs_tuple {
    ($($product:ident),*) => {
        impl<$($product: Product),*> Outputs for ($($product,)*) {
            fn keys() -> SmallVec<[TypeKey; 2]> {
                smallvec![$(<$product as Product>::key()),*]
            }

            #[allow(non_snake_case)]
            fn into_products(self) -> Result<Products, TypeKey> {
                let ($($product,)*) = self;
                let mut products = Products::new();
                $(products.push($product.into_stored().ok_or_else(<$product as Product>::key)?);)*
                Ok(products)
            }
        }
    };
}

all_tuples!(impl_outputs_tuple, 2, 8, P);

/// What a generator function returns: [`Outputs`], optionally wrapped in a
/// `Result` whose error is the generator's trailing error output.
pub trait GeneratorReturn: Send + 'static {
    /// The value outputs.
    type Values: Outputs;

    /// Separates the values from a reported failure.
    fn into_result(self) -> Result<Self::Values, BoxError>;
}

impl<O: Outputs> GeneratorReturn for O {
    type Values = O;

    fn into_result(self) -> Result<O, BoxError> {
        Ok(self)
    }
}

impl<O, E> GeneratorReturn for Result<O, E>
where
    O: Outputs,
    E: Into<BoxError> + Send + 'static,
{
    type Values = O;

    fn into_result(self) -> Result<O, BoxError> {
        self.map_err(Into::into)
    }
}
