//! End-to-end behavior of a single layer and of parent/child layers.

use stratum_di::{Layer, ResolveError, Resolver, SlotStatus, TypeKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Widget(u32);

#[derive(Debug, PartialEq)]
struct Doodad(u32);

fn widget_from_doodad(_doodad: Arc<Doodad>) -> Arc<Widget> {
    Arc::new(Widget(1))
}

fn doodad_from_widget(_widget: Arc<Widget>) -> Arc<Doodad> {
    Arc::new(Doodad(2))
}

#[test]
fn multi_output_generator_runs_once_for_all_outputs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let layer = Layer::builder()
        .generator(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as u32;
            (Arc::new(Widget(100 + n)), Arc::new(Doodad(200 + n)))
        })
        .build()
        .unwrap();

    let doodad = layer.resolve::<Doodad>().unwrap();
    let widget = layer.resolve::<Widget>().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*doodad, Doodad(200));
    assert_eq!(*widget, Widget(100));
    assert!(Arc::ptr_eq(&doodad, &layer.resolve::<Doodad>().unwrap()));
}

#[test]
fn mutually_dependent_generators_report_a_cycle() {
    let layer = Layer::builder()
        .generator(widget_from_doodad)
        .generator(doodad_from_widget)
        .build()
        .unwrap();

    match layer.resolve::<Widget>() {
        Err(ResolveError::CyclicDependency { key, path, .. }) => {
            assert_eq!(key, TypeKey::of::<Widget>());
            assert_eq!(
                path,
                vec![TypeKey::of::<Widget>(), TypeKey::of::<Doodad>(), TypeKey::of::<Widget>()]
            );
        }
        other => panic!("expected a cycle, got {other:?}"),
    }

    match layer.resolve::<Doodad>() {
        Err(ResolveError::CyclicDependency { key, .. }) => assert_eq!(key, TypeKey::of::<Doodad>()),
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn nil_output_is_a_failure_not_a_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let layer = Layer::builder()
        .generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            None::<Arc<Widget>>
        })
        .build()
        .unwrap();

    for _ in 0..2 {
        match layer.resolve::<Widget>() {
            Err(ResolveError::NilGeneratorResult { key, generator, .. }) => {
                assert_eq!(key, TypeKey::of::<Widget>());
                assert!(generator.ends_with("() -> Widget"), "{generator}");
            }
            other => panic!("expected a nil result, got {other:?}"),
        }
    }
    // Never memoized, so every request runs the generator again.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(layer.status_of::<Widget>(), Some(SlotStatus::GeneratorPending));
}

#[test]
fn nil_in_second_output_stores_nothing() {
    let layer = Layer::builder()
        .generator(|| (Arc::new(Widget(1)), None::<Arc<Doodad>>))
        .build()
        .unwrap();

    assert!(matches!(
        layer.resolve::<Widget>(),
        Err(ResolveError::NilGeneratorResult { key, .. }) if key == TypeKey::of::<Doodad>()
    ));
    assert_eq!(layer.status_of::<Widget>(), Some(SlotStatus::GeneratorPending));
}

#[test]
fn child_shadow_does_not_leak_into_parent() {
    let parent = Layer::builder().value(Widget(1)).build().unwrap();
    let child = parent.child().value(Widget(2)).build().unwrap();
    let sibling = parent.child().build().unwrap();

    assert_eq!(*child.resolve::<Widget>().unwrap(), Widget(2));
    assert_eq!(*parent.resolve::<Widget>().unwrap(), Widget(1));
    assert_eq!(*sibling.resolve::<Widget>().unwrap(), Widget(1));
}

#[test]
fn child_generator_does_not_change_parent_value() {
    let parent = Layer::builder()
        .generator(|| Arc::new(Widget(1)))
        .build()
        .unwrap();
    let from_parent = parent.resolve::<Widget>().unwrap();

    let child = parent
        .child()
        .generator(|| Arc::new(Widget(2)))
        .build()
        .unwrap();

    assert_eq!(*child.resolve::<Widget>().unwrap(), Widget(2));
    assert!(Arc::ptr_eq(&from_parent, &parent.resolve::<Widget>().unwrap()));
}

#[test]
fn parent_generator_runs_in_parent_and_is_shared_by_children() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let parent = Layer::builder()
        .generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Widget(5))
        })
        .build()
        .unwrap();

    let first = parent.child().build().unwrap();
    let second = parent.child().build().unwrap();

    let a = first.resolve::<Widget>().unwrap();
    let b = second.resolve::<Widget>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(parent.status_of::<Widget>(), Some(SlotStatus::GeneratorResolved));
    assert_eq!(first.status_of::<Widget>(), Some(SlotStatus::ImportedFromParent));
}

#[test]
fn dependencies_resolve_through_several_layers() {
    struct Config(&'static str);
    struct Pool(String);
    struct Session(String, u32);

    let root = Layer::builder().value(Config("db://main")).build().unwrap();
    let app = root
        .child()
        .generator(|config: Arc<Config>| Arc::new(Pool(config.0.to_string())))
        .build()
        .unwrap();
    let request = app
        .child()
        .value(42u32)
        .generator(|pool: Arc<Pool>, id: Arc<u32>| Arc::new(Session(pool.0.clone(), *id)))
        .build()
        .unwrap();

    let session = request.resolve::<Session>().unwrap();
    assert_eq!(session.0, "db://main");
    assert_eq!(session.1, 42);
    assert!(request.can_resolve::<Config>());
    assert!(!app.can_resolve::<Session>());
}

#[test]
fn missing_type_is_slot_not_found() {
    let parent = Layer::builder().value(Widget(1)).build().unwrap();
    let child = parent.child().build().unwrap();

    let err = child.resolve::<Doodad>().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.key(), TypeKey::of::<Doodad>());
    assert!(child.try_resolve::<Doodad>().is_none());
    assert!(!child.can_resolve::<Doodad>());
}
