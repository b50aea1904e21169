//! Domain event recorder.

use async_trait::async_trait;
use parking_lot::Mutex;

use sinquerella_core::{CoreError, DomainEvent, WorkflowEventHandler};

/// Event handler that keeps the type of every event it sees
#[derive(Debug, Default)]
pub struct RecordingEventHandler {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingEventHandler {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Event types in publication order
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|(kind, _)| kind.clone()).collect()
    }

    /// How many events of `event_type` were published
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(kind, _)| kind == event_type)
            .count()
    }

    /// Whether an event of `event_type` was published for `session`
    pub fn saw(&self, event_type: &str, session: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|(kind, id)| kind == event_type && id == session)
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl WorkflowEventHandler for RecordingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        self.events
            .lock()
            .push((event.event_type().to_string(), event.session_id().to_string()));
        Ok(())
    }
}
