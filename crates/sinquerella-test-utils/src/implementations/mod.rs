//! Deterministic fakes of the workflow collaborators.
//!
//! Unlike the `mockall` mocks these keep real behavior (recorded calls,
//! scripted failures) so integration tests can drive whole sessions.

pub mod events;
pub mod identity;
pub mod location;
pub mod notifier;
pub mod renderer;

pub use events::RecordingEventHandler;
pub use identity::{FakeIdentityVerifier, FakeVehicleRegistry, GatedIdentityVerifier};
pub use location::{FakeGeocoder, FakePositionProvider};
pub use notifier::RecordingNotifier;
pub use renderer::FakeReportRenderer;
