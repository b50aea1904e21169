//! Testing utilities for the Sin Querella workflow.
//!
//! This crate provides deterministic fakes for every external collaborator,
//! `mockall` mocks of the collaborator traits, the CESCO fixture data, draft
//! builders, a controller harness and test tracing setup.

pub mod builders;
pub mod data_generators;
pub mod implementations;
#[cfg(feature = "mocks")]
pub mod mocks;
pub mod util;

/// Re-export commonly used types for convenience
#[cfg(feature = "mocks")]
pub use mockall;

pub use builders::{WorkflowHarness, WorkflowHarnessBuilder};
pub use implementations::{
    FakeGeocoder, FakeIdentityVerifier, FakePositionProvider, FakeReportRenderer,
    FakeVehicleRegistry, GatedIdentityVerifier, RecordingEventHandler, RecordingNotifier,
};
pub use util::init_test_tracing;
