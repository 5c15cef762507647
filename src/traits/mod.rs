//! Core resolution traits.

mod resolver;

pub use resolver::{Resolver, ResolverCore};
