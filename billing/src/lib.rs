//! Razorpay webhook processing: signature checks, idempotent delivery and the
//! subscription state machine.

pub mod events;
pub mod handler;
pub mod mailer;
pub mod signature;
pub mod state;

#[cfg(test)]
mod tests;

pub use events::{resolve_event_id, EventKind, WebhookPayload};
pub use handler::{WebhookOutcome, WebhookProcessor, WebhookRequest};
pub use mailer::{mailer_from_config, Email, HttpMailer, LogMailer, Mailer};
pub use signature::{sign, verify_signature, EVENT_ID_HEADER, SIGNATURE_HEADER};
pub use state::{next_status, Transition};
