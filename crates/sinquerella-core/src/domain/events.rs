use crate::domain::stage::Stage;
use crate::types::{DriverRole, SessionId};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all workflow events
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the session this event belongs to
    fn session_id(&self) -> &SessionId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! domain_event {
    ($name:ident, $event_type:literal) => {
        impl DomainEvent for $name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn session_id(&self) -> &SessionId {
                &self.session_id
            }

            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        }
    };
}

/// Event: a stage was rendered
#[derive(Debug)]
pub struct StageEntered {
    /// Session
    pub session_id: SessionId,
    /// Rendered stage
    pub stage: Stage,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(StageEntered, "stage.entered");

/// Event: a stage was requested without its prerequisites
#[derive(Debug)]
pub struct StageRedirected {
    /// Session
    pub session_id: SessionId,
    /// Stage that was asked for
    pub requested: Stage,
    /// Stage the session was sent to instead
    pub redirected_to: Stage,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(StageRedirected, "stage.redirected");

/// Event: a submission passed validation and moved the session forward
#[derive(Debug)]
pub struct StageAdvanced {
    /// Session
    pub session_id: SessionId,
    /// Stage that accepted the input
    pub from: Stage,
    /// Next stage
    pub to: Stage,
    /// Whether the stored artifact changed
    pub changed: bool,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(StageAdvanced, "stage.advanced");

/// Event: a submission failed validation
#[derive(Debug)]
pub struct TransitionRejected {
    /// Session
    pub session_id: SessionId,
    /// Stage that rejected the input
    pub stage: Stage,
    /// Fields in error
    pub fields: Vec<String>,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(TransitionRejected, "stage.rejected");

/// Event: downstream artifacts were dropped after an earlier one changed
#[derive(Debug)]
pub struct ArtifactsInvalidated {
    /// Session
    pub session_id: SessionId,
    /// Stage whose artifact changed
    pub stage: Stage,
    /// Keys that were cleared
    pub keys: Vec<&'static str>,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(ArtifactsInvalidated, "artifacts.invalidated");

/// Event: the driver confirmed the identity lookup
#[derive(Debug)]
pub struct IdentityValidated {
    /// Session
    pub session_id: SessionId,
    /// Role of the driver
    pub role: DriverRole,
    /// Number of candidate vehicles
    pub candidate_count: usize,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(IdentityValidated, "identity.validated");

/// Event: an identity lookup answered after the session had moved on
#[derive(Debug)]
pub struct LookupDiscarded {
    /// Session
    pub session_id: SessionId,
    /// Stage that issued the lookup
    pub stage: Stage,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(LookupDiscarded, "identity.lookup_discarded");

/// Event: the driver picked a vehicle outside the registry
#[derive(Debug)]
pub struct TerminalBranchReached {
    /// Session
    pub session_id: SessionId,
    /// Out-of-band remedy shown to the driver
    pub remedy: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(TerminalBranchReached, "workflow.terminal");

/// Event: an invitation dispatch finished
#[derive(Debug)]
pub struct HandoffDispatched {
    /// Session
    pub session_id: SessionId,
    /// Whether the notifier acknowledged it
    pub delivered: bool,
    /// Attempts so far
    pub attempts: u32,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(HandoffDispatched, "handoff.dispatched");

/// Event: the other driver finished their half
#[derive(Debug)]
pub struct CounterpartyCompleted {
    /// Session
    pub session_id: SessionId,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(CounterpartyCompleted, "counterparty.completed");

/// Event: the session was dropped from the store
#[derive(Debug)]
pub struct SessionClosed {
    /// Session
    pub session_id: SessionId,
    /// Whether it was abandoned before completion
    pub abandoned: bool,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

domain_event!(SessionClosed, "session.closed");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_metadata() {
        let now = Utc::now();
        let events: Vec<Box<dyn DomainEvent>> = vec![
            Box::new(StageEntered {
                session_id: SessionId::from("s1"),
                stage: Stage::EvidenceCapture,
                timestamp: now,
            }),
            Box::new(TerminalBranchReached {
                session_id: SessionId::from("s1"),
                remedy: "Policía de Puerto Rico: 787.343.2020".to_string(),
                timestamp: now,
            }),
            Box::new(SessionClosed {
                session_id: SessionId::from("s1"),
                abandoned: true,
                timestamp: now,
            }),
        ];

        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["stage.entered", "workflow.terminal", "session.closed"]);
        assert!(events.iter().all(|e| e.session_id().as_str() == "s1"));
        assert!(events.iter().all(|e| e.timestamp() == now));
    }
}
