//! Outbound notifications (account approvals, password resets).
//!
//! Delivery is behind a trait so a mail transport can be plugged in; the
//! bundled implementation only logs.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell `recipients` that `actor` changed something.
    async fn notify_admins(&self, actor: &str, subject: &str, body: &str, recipients: &[String]);

    async fn send_password_reset(&self, email: &str);
}

/// Writes every notification to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_admins(&self, actor: &str, subject: &str, body: &str, recipients: &[String]) {
        info!(
            actor = %actor,
            recipients = recipients.len(),
            subject = %subject,
            body = %body,
            "📧 Admin notification"
        );
    }

    async fn send_password_reset(&self, email: &str) {
        info!(email = %email, "📧 Password reset requested");
    }
}

/// One delivered notification, as captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Admins {
        actor: String,
        subject: String,
        recipients: Vec<String>,
    },
    PasswordReset(String),
}

/// Keeps notifications in memory; used by tests to assert on side effects.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_admins(&self, actor: &str, subject: &str, _body: &str, recipients: &[String]) {
        self.sent.lock().push(Sent::Admins {
            actor: actor.to_string(),
            subject: subject.to_string(),
            recipients: recipients.to_vec(),
        });
    }

    async fn send_password_reset(&self, email: &str) {
        self.sent.lock().push(Sent::PasswordReset(email.to_string()));
    }
}
