use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// An event recorded by [`capture`].
#[derive(Clone, Debug)]
pub(crate) struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn module(&self) -> Option<&str> {
        self.fields.get("module").map(String::as_str)
    }
}

#[derive(Clone, Default)]
pub(crate) struct Captured(Arc<Mutex<Vec<CapturedEvent>>>);

impl Captured {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, level: Level, module: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.level == level && e.module() == Some(module))
            .count()
    }
}

struct CaptureLayer(Captured);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;
        let message = fields.remove("message").unwrap_or_default();
        self.0
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *event.metadata().level(),
                message,
                fields,
            });
    }
}

#[derive(Default)]
struct FieldVisitor(HashMap<String, String>);

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_owned(), value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_owned(), format!("{value:?}"));
    }
}

/// Records every event on the current thread until the guard is dropped.
pub(crate) fn capture() -> (DefaultGuard, Captured) {
    let captured = Captured::default();
    let subscriber =
        tracing_subscriber::registry().with(CaptureLayer(captured.clone()));
    (tracing::subscriber::set_default(subscriber), captured)
}
