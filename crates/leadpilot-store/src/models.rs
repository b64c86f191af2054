//! Row types for leads and their message threads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A captured prospect plus whatever enrichment was applied at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub enriched: EnrichmentState,
    pub enriched_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a lead. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub enriched: EnrichmentState,
    pub enriched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentState {
    #[default]
    Pending,
    Success,
    Failed,
}

/// One entry in a lead's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub lead_id: i64,
    pub direction: Direction,
    pub channel: Channel,
    pub subject: Option<String>,
    pub body: String,
    pub provider_sid: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub lead_id: i64,
    pub direction: Direction,
    pub channel: Channel,
    pub subject: Option<String>,
    pub body: String,
    pub provider_sid: Option<String>,
    pub status: MessageStatus,
}

impl NewMessage {
    pub fn outbound(lead_id: i64, channel: Channel, body: impl Into<String>) -> Self {
        Self {
            lead_id,
            direction: Direction::Outbound,
            channel,
            subject: None,
            body: body.into(),
            provider_sid: None,
            status: MessageStatus::Queued,
        }
    }

    pub fn inbound(lead_id: i64, channel: Channel, body: impl Into<String>) -> Self {
        Self {
            lead_id,
            direction: Direction::Inbound,
            channel,
            subject: None,
            body: body.into(),
            provider_sid: None,
            status: MessageStatus::Received,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_provider_sid(mut self, sid: impl Into<String>) -> Self {
        self.provider_sid = Some(sid.into());
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Queued,
    Sent,
    Delivered,
    Received,
    Failed,
    Draft,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

string_enum!(EnrichmentState {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
});

string_enum!(Direction {
    Inbound => "inbound",
    Outbound => "outbound",
});

string_enum!(Channel {
    Sms => "sms",
    Email => "email",
    Note => "note",
});

string_enum!(MessageStatus {
    Queued => "queued",
    Sent => "sent",
    Delivered => "delivered",
    Received => "received",
    Failed => "failed",
    Draft => "draft",
});
