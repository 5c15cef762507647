//! Resolution errors: causes, messages, snapshots and the convenience entry points.

use stratum_di::{EngineConfig, Layer, ResolveError, Resolver, SlotStatus, TypeKey};
use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Widget(u32);

#[derive(Debug)]
struct Doodad(u32);

fn open_disk() -> Result<Arc<Widget>, io::Error> {
    Err(io::Error::new(io::ErrorKind::Other, "disk full"))
}

#[test]
fn generator_error_carries_the_cause() {
    let layer = Layer::builder().generator(open_disk).build().unwrap();

    let err = layer.resolve::<Widget>().unwrap_err();
    match &err {
        ResolveError::GeneratorError { key, generator, .. } => {
            assert_eq!(*key, TypeKey::of::<Widget>());
            assert_eq!(generator, "open_disk() -> Widget");
        }
        other => panic!("expected generator error, got {other}"),
    }
    assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("disk full"));
    assert_eq!(
        err.to_string(),
        "generator open_disk() -> Widget for errors::Widget failed: disk full"
    );
}

#[test]
fn failed_generators_are_not_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let layer = Layer::builder()
        .generator(move || -> Result<Arc<Widget>, &'static str> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("flaky")
        })
        .build()
        .unwrap();

    assert!(layer.resolve::<Widget>().is_err());
    assert!(layer.resolve::<Widget>().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(layer.status_of::<Widget>(), Some(SlotStatus::GeneratorPending));
}

#[test]
fn dependency_failure_propagates_unchanged() {
    let layer = Layer::builder()
        .generator(open_disk)
        .generator(|w: Arc<Widget>| Arc::new(Doodad(w.0)))
        .build()
        .unwrap();

    let err = layer.resolve::<Doodad>().unwrap_err();
    assert!(matches!(err, ResolveError::GeneratorError { .. }));
    assert_eq!(err.key(), TypeKey::of::<Widget>());
}

#[test]
fn snapshot_is_attached_only_when_configured() {
    let plain = Layer::builder().build().unwrap();
    assert!(plain.resolve::<Widget>().unwrap_err().snapshot().is_none());

    let layer = Layer::builder()
        .config(EngineConfig::default().with_snapshot_on_error(true))
        .generator(open_disk)
        .value(Doodad(1))
        .build()
        .unwrap();

    let err = layer.resolve::<Widget>().unwrap_err();
    let snapshot = err.snapshot().expect("snapshot enabled");
    assert_eq!(snapshot.find("errors::Widget").map(|s| s.status), Some(SlotStatus::GeneratorPending));
    assert_eq!(snapshot.find("errors::Doodad").map(|s| s.status), Some(SlotStatus::DirectValue));

    let message = err.to_string();
    assert!(!message.contains("layer "), "{message}");
    assert!(!message.contains("errors::Doodad"), "{message}");
}

#[test]
fn not_found_message_and_helpers() {
    let layer = Layer::builder().build().unwrap();
    let err = layer.resolve::<Widget>().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "no slot for errors::Widget");
    assert!(err.source().is_none());

    let cloned = err.clone();
    assert_eq!(cloned.key(), err.key());
}

#[test]
fn try_resolve_maps_every_failure_to_none() {
    let layer = Layer::builder()
        .value(Doodad(1))
        .generator(open_disk)
        .build()
        .unwrap();

    assert!(layer.try_resolve::<Doodad>().is_some());
    assert!(layer.try_resolve::<Widget>().is_none());
    assert!(layer.try_resolve::<String>().is_none());
}

#[test]
fn can_resolve_never_runs_generators() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let layer = Layer::builder()
        .generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Widget(1))
        })
        .build()
        .unwrap();

    assert!(layer.can_resolve::<Widget>());
    assert!(!layer.can_resolve::<Doodad>());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn resolve_batch_stops_at_the_first_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let layer = Layer::builder()
        .value(Widget(1))
        .generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Doodad(2))
        })
        .build()
        .unwrap();

    assert!(layer
        .resolve_batch(&[TypeKey::of::<Widget>(), TypeKey::of::<Doodad>()])
        .is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let other = Layer::builder()
        .generator({
            let counter = Arc::clone(&calls);
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(Doodad(3))
            }
        })
        .build()
        .unwrap();
    let err = other
        .resolve_batch(&[TypeKey::of::<Widget>(), TypeKey::of::<Doodad>()])
        .unwrap_err();
    assert_eq!(err.key(), TypeKey::of::<Widget>());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn must_returns_the_value() {
    let layer = Layer::builder().value(Widget(5)).build().unwrap();
    assert_eq!(layer.must::<Widget>().0, 5);
}

#[test]
#[should_panic(expected = "failed to resolve errors::Doodad: no slot for errors::Doodad")]
fn must_panics_with_the_error_message() {
    let layer = Layer::builder().value(Widget(5)).build().unwrap();
    let _ = layer.must::<Doodad>();
}
