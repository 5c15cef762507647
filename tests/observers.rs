//! Resolution observers and tracing output.

use parking_lot::Mutex;
use stratum_di::{Layer, ResolutionObserver, ResolveError, Resolver, TracingObserver, TypeKey};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl ResolutionObserver for Recorder {
    fn generator_started(&self, _layer: u64, requested: TypeKey, _generator: &str) {
        self.events.lock().push(format!("start {}", requested.short_name()));
    }

    fn generator_finished(&self, _layer: u64, requested: TypeKey, _generator: &str, _took: Duration) {
        self.events.lock().push(format!("finish {}", requested.short_name()));
    }

    fn generator_failed(&self, _layer: u64, requested: TypeKey, _generator: &str, error: &ResolveError) {
        self.events
            .lock()
            .push(format!("fail {} ({})", requested.short_name(), error.key().short_name()));
    }

    fn parent_delegated(&self, layer: u64, requested: TypeKey, parent: u64) {
        assert_ne!(layer, parent);
        self.events.lock().push(format!("delegate {}", requested.short_name()));
    }
}

struct Engine(u32);
struct Car(u32);

#[test]
fn nested_generators_report_in_order() {
    let recorder = Arc::new(Recorder::default());
    let layer = Layer::builder()
        .observe(recorder.clone())
        .generator(|| Arc::new(Engine(4)))
        .generator(|engine: Arc<Engine>| Arc::new(Car(engine.0)))
        .build()
        .unwrap();

    layer.resolve::<Car>().unwrap();
    layer.resolve::<Car>().unwrap();
    assert_eq!(
        recorder.events(),
        vec!["start Car", "start Engine", "finish Engine", "finish Car"]
    );
}

#[test]
fn failures_are_reported() {
    let recorder = Arc::new(Recorder::default());
    let layer = Layer::builder()
        .observe(recorder.clone())
        .generator(|| Err::<Arc<Engine>, _>("no fuel"))
        .build()
        .unwrap();

    assert!(layer.resolve::<Engine>().is_err());
    assert_eq!(recorder.events(), vec!["start Engine", "fail Engine (Engine)"]);
}

#[test]
fn children_inherit_observers_and_report_delegation() {
    let recorder = Arc::new(Recorder::default());
    let parent = Layer::builder()
        .observe(recorder.clone())
        .value(Engine(2))
        .build()
        .unwrap();
    let child = parent
        .child()
        .generator(|engine: Arc<Engine>| Arc::new(Car(engine.0)))
        .build()
        .unwrap();

    child.resolve::<Car>().unwrap();
    assert_eq!(recorder.events(), vec!["start Car", "delegate Engine", "finish Car"]);
}

#[test]
fn tracing_observer_emits_through_a_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("stratum_di=trace"))
        .with_test_writer()
        .try_init();

    let parent = Layer::builder()
        .observe(Arc::new(TracingObserver::with_label("test")))
        .value(Engine(1))
        .build()
        .unwrap();
    let child = parent
        .child()
        .generator(|engine: Arc<Engine>| Arc::new(Car(engine.0)))
        .build()
        .unwrap();

    assert_eq!(child.resolve::<Car>().unwrap().0, 1);
    assert!(child.resolve::<String>().is_err());
}
