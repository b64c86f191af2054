//! Life-event retention presets
//!
//! Each event nudges the customer's policy health score and proposes one
//! concrete change, with matching SMS and email copy.

use serde::{Deserialize, Serialize};

use crate::error::OutreachError;
use crate::personalization::first_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPreset {
    pub key: &'static str,
    pub label: &'static str,
    pub blurb: &'static str,
    pub score_delta: i32,
    pub proposal: &'static str,
}

pub const PRESETS: &[RetentionPreset] = &[
    RetentionPreset {
        key: "new_baby",
        label: "New Baby",
        blurb: "Congratulate and suggest umbrella + life adjustments.",
        score_delta: 12,
        proposal: "Add $1M umbrella + update dependents",
    },
    RetentionPreset {
        key: "home_reno",
        label: "Home Renovation",
        blurb: "Recommend dwelling limit / scheduled property updates.",
        score_delta: -8,
        proposal: "Increase dwelling coverage; schedule high-value items",
    },
    RetentionPreset {
        key: "teen_driver",
        label: "Teen Driver",
        blurb: "Coach on telematics + safe-driver discounts.",
        score_delta: -15,
        proposal: "Add teen driver + enroll in telematics to save",
    },
    RetentionPreset {
        key: "job_change",
        label: "Job Change",
        blurb: "Review benefits overlap; adjust coverage + discounts.",
        score_delta: -5,
        proposal: "Rebalance coverages; check employer benefits",
    },
    RetentionPreset {
        key: "anniversary",
        label: "Policy Anniversary",
        blurb: "Delight + renew with perk/discount.",
        score_delta: 6,
        proposal: "Renewal perk: $50 off next bill",
    },
    RetentionPreset {
        key: "birthday",
        label: "Birthday",
        blurb: "Warm touch with a small gift.",
        score_delta: 4,
        proposal: "Gift: free roadside assist this month",
    },
    RetentionPreset {
        key: "low_mileage",
        label: "Low Mileage",
        blurb: "Upsell pay-per-mile to save $$$.",
        score_delta: 9,
        proposal: "Switch to pay-per-mile, save ~$340/yr",
    },
];

pub fn preset(key: &str) -> Option<&'static RetentionPreset> {
    PRESETS.iter().find(|p| p.key == key)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub current_carrier: Option<String>,
}

/// Body of `POST /api/retention/preview`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRequest {
    pub customer: RetentionCustomer,
    pub event: String,
    #[serde(default = "default_health_score")]
    pub health_score: i32,
}

fn default_health_score() -> i32 {
    72
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPreview {
    pub event: String,
    pub label: String,
    pub blurb: String,
    pub health_score: i32,
    pub suggested_score: i32,
    pub proposal: String,
    pub sms: String,
    pub email_subject: String,
    pub email_body: String,
    /// Steps the retention autopilot walks through for this event
    pub timeline: Vec<String>,
}

pub fn preview(
    request: &RetentionRequest,
    booking_url: Option<&str>,
    sender_name: &str,
    sender_company: &str,
) -> Result<RetentionPreview, OutreachError> {
    let preset = preset(&request.event).ok_or_else(|| {
        OutreachError::Validation(format!("unknown retention event '{}'", request.event))
    })?;

    let customer = &request.customer;
    let first = first_name(Some(&customer.name));
    let carrier = customer.current_carrier.as_deref().unwrap_or(sender_company);
    let suggested_score = request
        .health_score
        .saturating_add(preset.score_delta)
        .clamp(0, 100);

    let mut sms = format!(
        "Hi {first}! Congrats on the news \u{1F389} \u{2014} {}",
        sms_line(preset.key, carrier)
    );
    if let Some(url) = booking_url {
        sms.push_str(&format!("\n\nBook: {url}"));
    }

    let cta = match booking_url {
        Some(url) => format!("\n\nBook a quick tune-up:\n{url}"),
        None => "\n\nReply to this email and I\u{2019}ll set everything up in a few minutes."
            .to_string(),
    };
    let email_body = format!(
        "Hi {first},\n\nCatching a quick moment to keep your coverage perfectly matched to your \
         life right now. {}\n\nRecommended next step: {}.{cta}\n\nBest,\n{sender_name}\n{sender_company}\n",
        benefit_line(preset.key, carrier),
        preset.proposal,
    );

    let timeline = vec![
        format!("Detect event: {}", preset.label),
        format!("Update Policy Health Score \u{2192} {suggested_score}"),
        format!("Decide upsell: {}", preset.proposal),
        "Queue SMS (1st touch)".to_string(),
        "Queue Email (with booking link)".to_string(),
        "Await reply \u{2192} escalate if objection".to_string(),
    ];

    Ok(RetentionPreview {
        event: preset.key.to_string(),
        label: preset.label.to_string(),
        blurb: preset.blurb.to_string(),
        health_score: request.health_score,
        suggested_score,
        proposal: preset.proposal.to_string(),
        sms,
        email_subject: subject(preset.key, &first, carrier),
        email_body,
        timeline,
    })
}

fn sms_line(event: &str, carrier: &str) -> String {
    match event {
        "new_baby" => "quick win: add umbrella + update dependents.".to_string(),
        "home_reno" => "let\u{2019}s bump dwelling coverage + schedule new valuables.".to_string(),
        "teen_driver" => "we can add your teen + enroll telematics to lower rates.".to_string(),
        "job_change" => "let\u{2019}s rebalance coverage and check new benefits overlap.".to_string(),
        "anniversary" => format!("thanks for {carrier} loyalty! Perk inside."),
        "birthday" => "\u{1F381} gift inside: free roadside assist this month.".to_string(),
        _ => "driving less? Pay-per-mile could save you ~$340/yr.".to_string(),
    }
}

fn subject(event: &str, first: &str, carrier: &str) -> String {
    match event {
        "new_baby" => format!("Congrats, {first}! Quick coverage win"),
        "home_reno" => "Your renovation \u{2192} quick coverage tune-up".to_string(),
        "teen_driver" => "Adding a teen driver (and keeping costs sane)".to_string(),
        "job_change" => "Job change? Fast benefits & coverage check".to_string(),
        "anniversary" => format!("2 years with {carrier} \u{2014} perk inside"),
        "birthday" => format!("Happy Birthday, {first}! \u{1F381}"),
        "low_mileage" => "You drive less \u{2014} want to save more?".to_string(),
        _ => "Quick coverage improvement".to_string(),
    }
}

fn benefit_line(event: &str, carrier: &str) -> String {
    match event {
        "new_baby" => "We\u{2019}ll add a $1M umbrella, update dependents, and ensure life cover \
                       matches your new milestone."
            .to_string(),
        "home_reno" => "We\u{2019}ll update dwelling limits and schedule new high-value items so \
                        every upgrade is protected."
            .to_string(),
        "teen_driver" => "We\u{2019}ll add your teen and enable telematics + safe-driver discounts \
                          to soften the premium jump."
            .to_string(),
        "job_change" => "We\u{2019}ll rebalance coverages, check employer benefits overlap, and \
                         keep you fully protected."
            .to_string(),
        "anniversary" => format!("Thanks for being with {carrier}, enjoy $50 off your next bill."),
        "birthday" => "As a small thank-you, enjoy free roadside assistance this month, on us."
            .to_string(),
        _ => "Based on your low mileage, pay-per-mile could save you about $340/yr.".to_string(),
    }
}
