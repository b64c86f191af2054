//! Delivery channels for outbound SMS and email

pub mod email;
pub mod outbox;
pub mod sms;

pub use email::{ConsoleEmail, EmailTransport, SmtpEmail, SmtpSettings};
pub use outbox::{OutgoingEmail, Outbox, append_booking_link};
pub use sms::{DryRunSms, SmsTransport, TwilioCredentials, TwilioSms, sms_transport};
