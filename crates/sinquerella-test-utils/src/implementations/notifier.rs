//! Invitation dispatch fake.

use async_trait::async_trait;
use parking_lot::Mutex;

use sinquerella_core::{CoreError, InvitationPayload, Notifier};

/// One dispatched invitation
#[derive(Debug, Clone, PartialEq)]
pub struct SentInvitation {
    /// Recipient email
    pub email: String,
    /// Recipient phone
    pub phone: String,
    /// What was sent
    pub payload: InvitationPayload,
}

/// Notifier that records deliveries and can fail the first attempts
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentInvitation>>,
    failures_left: Mutex<u32>,
    attempts: Mutex<u32>,
}

impl RecordingNotifier {
    /// Notifier that delivers every invitation
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose first `n` dispatches fail
    pub fn failing_first(n: u32) -> Self {
        Self {
            failures_left: Mutex::new(n),
            ..Self::default()
        }
    }

    /// Delivered invitations
    pub fn sent(&self) -> Vec<SentInvitation> {
        self.sent.lock().clone()
    }

    /// Dispatch attempts, successful or not
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, email: &str, phone: &str, payload: &InvitationPayload) -> Result<(), CoreError> {
        *self.attempts.lock() += 1;

        {
            let mut failures_left = self.failures_left.lock();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(CoreError::collaborator("mailer", "SMTP relay unavailable"));
            }
        }

        self.sent.lock().push(SentInvitation {
            email: email.to_string(),
            phone: phone.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}
