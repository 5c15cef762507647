//! Launching eager slots right after construction.
//!
//! Each eager slot gets its own named thread that runs the ordinary
//! resolution path. Failures are logged and otherwise dropped: the slot stays
//! empty, so the next explicit request runs the generator again and reports
//! its error in-band.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crate::cancellation::CallContext;
use crate::key::TypeKey;
use crate::layer::Layer;
use crate::traits::ResolverCore;

pub(crate) fn schedule(layer: &Layer, keys: Vec<TypeKey>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(keys.len());
    for key in keys {
        let task = layer.clone();
        let spawned = thread::Builder::new()
            .name(layer.config().eager_thread_name.clone())
            .spawn(move || run(&task, key));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(error) => {
                tracing::warn!(layer = layer.id(), ty = key.name(), %error, "could not start eager task; slot stays lazy");
            }
        }
    }
    handles
}

fn run(layer: &Layer, key: TypeKey) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| layer.resolve_key(key, &CallContext::background())));
    match outcome {
        Ok(Ok(_)) => {
            tracing::trace!(layer = layer.id(), ty = key.name(), "eager slot resolved");
        }
        Ok(Err(error)) => {
            tracing::warn!(layer = layer.id(), ty = key.name(), %error, "eager resolution failed");
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(layer = layer.id(), ty = key.name(), panic = %message, "eager generator panicked");
        }
    }
}
