//! # stratum-di
//!
//! Layered, lazily evaluated dependency graphs for request-scoped Rust code.
//!
//! A [`Layer`] holds one slot per type. A slot is filled either directly with a
//! value or on first demand by a *generator*: an ordinary function whose
//! parameters are the dependencies it needs. Layers nest, so a per-request
//! layer can add or shadow entries of the application layer it was created
//! from without ever touching the parent's slots.
//!
//! ## Features
//!
//! - **Single flight**: a generator runs at most once per layer, no matter how
//!   many threads ask for its outputs at the same time
//! - **Deadlock free**: multi-output generators lock their slots in a fixed
//!   order, and dependency cycles are rejected instead of hanging
//! - **Validated up front**: every generator parameter must be resolvable when
//!   the layer is built
//! - **Trait objects**: slots can be registered as `Arc<dyn Trait>` or bound to
//!   an interface with [`LayerBuilder::implements`]
//! - **Eager slots**: generators can be launched in the background as soon as a
//!   layer is built
//!
//! ## Quick Start
//!
//! ```rust
//! use stratum_di::{Layer, Resolver};
//! use std::sync::Arc;
//!
//! struct Settings { url: &'static str }
//! struct Database { url: &'static str }
//! struct Handler { db: Arc<Database>, request_id: u64 }
//!
//! let app = Layer::builder()
//!     .value(Settings { url: "postgres://localhost" })
//!     .generator(|settings: Arc<Settings>| Arc::new(Database { url: settings.url }))
//!     .build()
//!     .unwrap();
//!
//! let request = app
//!     .child()
//!     .value(7u64)
//!     .generator(|db: Arc<Database>, id: Arc<u64>| Arc::new(Handler { db, request_id: *id }))
//!     .build()
//!     .unwrap();
//!
//! let handler = request.resolve::<Handler>().unwrap();
//! assert_eq!(handler.db.url, "postgres://localhost");
//! assert_eq!(handler.request_id, 7);
//!
//! // The database was produced by the application layer and is shared.
//! assert!(Arc::ptr_eq(&handler.db, &app.resolve::<Database>().unwrap()));
//! ```
//!
//! ## Failures
//!
//! Wiring problems surface from [`LayerBuilder::build`] as a
//! [`ConstructionError`]. Everything that can only go wrong while resolving
//! (a generator returning an error, a cycle, cancellation) is a
//! [`ResolveError`]. Failed generators are never memoized, so a later request
//! runs them again.
//!
//! ## Feature flags
//!
//! - `async`: [`Layer::resolve_async`] on tokio's blocking pool
//! - `config`: serde support for [`EngineConfig`]
//! - `graph-export`: JSON export of [`GraphDump`]

pub mod cancellation;
pub mod config;
pub mod debug;
pub mod error;
pub mod generator;
pub mod key;
pub mod layer;
pub mod observer;
pub mod slot;
pub mod traits;

#[cfg(feature = "graph-export")]
pub mod graph_export;

mod eager;
mod internal;

pub use cancellation::{CallContext, CancellationToken};
pub use config::EngineConfig;
pub use debug::{GraphDump, InterfaceDump, LayerDump, SlotDump};
pub use error::{BoxError, ConstructionError, DiResult, ResolveError, SharedError};
pub use generator::{Generator, GeneratorReturn, IntoGenerator, Invocation, Outputs, Param, ParamSpec, Product};
pub use key::TypeKey;
pub use layer::{Layer, LayerBuilder};
pub use observer::{ResolutionObserver, TracingObserver};
pub use slot::{AnyArc, SlotStatus};
pub use traits::{Resolver, ResolverCore};
