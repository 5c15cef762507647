#![no_main]

use libfuzzer_sys::fuzz_target;
use stratum_di::{Layer, LayerBuilder, Resolver};
use std::sync::Arc;

struct A(u8);
struct B(u8);
struct C(u8);

// Each byte picks one registration; the layer either builds or reports a
// construction error, and every resolution afterwards returns a value or an
// in-band error without panicking.
fn wire(mut builder: LayerBuilder, ops: &[u8]) -> LayerBuilder {
    for op in ops {
        builder = match op % 8 {
            0 => builder.value(A(*op)),
            1 => builder.value(B(*op)),
            2 => builder.generator(|a: Arc<A>| Arc::new(B(a.0.wrapping_add(1)))),
            3 => builder.generator(|b: Arc<B>| Arc::new(C(b.0.wrapping_add(1)))),
            4 => builder.generator(|c: Arc<C>| Arc::new(A(c.0))),
            5 => builder.generator(|b: Option<Arc<B>>| (Arc::new(C(b.map_or(0, |b| b.0))), None::<Arc<A>>)),
            6 => builder.allow_override(true),
            _ => builder.overridable::<A>(),
        };
    }
    builder
}

fn probe(layer: &Layer) {
    let a = layer.try_resolve::<A>();
    let b = layer.try_resolve::<B>();
    let c = layer.try_resolve::<C>();
    if let Some(a) = a {
        assert!(Arc::ptr_eq(&a, &layer.resolve::<A>().unwrap()));
    }
    if let Some(b) = b {
        assert!(Arc::ptr_eq(&b, &layer.resolve::<B>().unwrap()));
    }
    if let Some(c) = c {
        assert!(Arc::ptr_eq(&c, &layer.resolve::<C>().unwrap()));
    }
    let _ = layer.dump().to_string();
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = usize::from(data[0]) % data.len();
    let (parent_ops, child_ops) = data[1..].split_at(split.min(data.len() - 1));

    let Ok(parent) = wire(Layer::builder(), parent_ops).lock().build() else {
        return;
    };
    probe(&parent);

    if let Ok(child) = wire(parent.child(), child_ops).build() {
        probe(&child);
        probe(&parent);
    }
});
