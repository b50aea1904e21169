/// Artifacts written by the stages
pub mod artifacts;

/// Diagram catalog
pub mod catalog;

/// Collaborator interfaces
pub mod collaborators;

/// Domain events
pub mod events;

/// Stage inputs
pub mod input;

/// Session store interface
pub mod session_store;

/// Stages, prerequisites and the stage cursor
pub mod stage;

/// Session read model
pub mod state;

/// Stage validators
pub mod validation;
