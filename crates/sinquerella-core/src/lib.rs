//!
//! Sin Querella Core - reporting workflow for minor traffic accidents
//!
//! This crate holds the stage state machine that walks a driver from the
//! accident-type diagram to the hand-off with the other driver: the session
//! store interface, the stage validators, the workflow controller and the
//! interfaces of the external collaborators it talks to.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - artifacts, stages, validators and interfaces
pub mod domain;

/// Application services - workflow controller and location lookup
pub mod application;

/// Configuration
pub mod config;

/// Core types
pub mod types;

/// Error types
pub mod error;

pub use config::{ValidationRules, WorkflowConfig};
pub use error::CoreError;
pub use types::{DriverRole, SessionId};

pub use domain::artifacts::{
    Artifact, ContactHandoff, CounterpartyCompletion, DiagramSelection, DispatchStatus,
    DriverIdentity, EvidenceBundle, HandoffRecord, IdentityRecord, ImageRef, InfractionResponse,
    Insurance, LocationFix, LocationSource, PendingIdentity, PersonalInfo, PositionReading,
    RoleSelection, Vehicle, VehicleCandidates, VehicleSelection,
};
pub use domain::catalog::{DiagramCatalog, DiagramEntry, DiagramSection};
pub use domain::collaborators::{
    GeoPoint, IdentityVerifier, InvitationPayload, Notifier, PositionProvider, ReportDocument,
    ReportRenderer, ReverseGeocoder, VehicleRegistry,
};
pub use domain::events::DomainEvent;
pub use domain::input::{
    ContactDraft, EvidenceDraft, IdentityCredentials, IdentityDraft, StageInput, VehicleChoice,
};
pub use domain::session_store::{SessionScope, SessionStore, SessionStoreFactory};
pub use domain::stage::{Requirement, Stage, StageCursor, TerminalBranch};
pub use domain::state::{ReportSummary, WorkflowState};
pub use domain::validation::{FieldError, FieldErrors, ValidationCode};

pub use application::location_service::{LocationOutcome, LocationService};
pub use application::session_store_factory::create_session_store_factory;
pub use application::workflow_controller::{
    AdvanceOutcome, EntryDecision, TracingEventHandler, WorkflowController, WorkflowEventHandler,
};
