/// Workflow state machine
pub mod workflow_controller;

/// Accident location lookup
pub mod location_service;

/// Session store construction from configuration
pub mod session_store_factory;
