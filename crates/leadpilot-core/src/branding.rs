//! Sender identity stamped onto generated outreach

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub sender_name: String,
    pub sender_title: String,
    pub sender_company: String,
    pub sender_phone: String,
    pub sender_email: String,
    /// Envelope address used in `From:` headers
    pub from_address: String,
    /// Scheduling link appended to emails; empty disables it
    pub booking_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            sender_name: "Your Name".to_string(),
            sender_title: "Founder".to_string(),
            sender_company: "LeadPilot".to_string(),
            sender_phone: String::new(),
            sender_email: "hello@leadpilot.dev".to_string(),
            from_address: "noreply@leadpilot.dev".to_string(),
            booking_url: String::new(),
        }
    }
}

impl Branding {
    /// `\n\nBest regards,` followed by the non-empty sender lines
    pub fn signature_block(&self) -> String {
        let lines = [
            &self.sender_name,
            &self.sender_title,
            &self.sender_company,
            &self.sender_phone,
            &self.sender_email,
        ];
        let mut block = String::from("\n\nBest regards,");
        for line in lines.into_iter().filter(|l| !l.trim().is_empty()) {
            block.push('\n');
            block.push_str(line);
        }
        block
    }

    pub fn booking_url(&self) -> Option<&str> {
        let url = self.booking_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_skips_blank_phone() {
        let branding = Branding::default();
        let sig = branding.signature_block();
        assert!(sig.starts_with("\n\nBest regards,\nYour Name\nFounder\nLeadPilot\n"));
        assert!(!sig.contains("\n\n\n"));
        assert!(sig.ends_with("hello@leadpilot.dev"));
    }

    #[test]
    fn test_booking_url_empty_is_none() {
        let mut branding = Branding::default();
        assert!(branding.booking_url().is_none());
        branding.booking_url = " https://cal.example/intro ".to_string();
        assert_eq!(branding.booking_url(), Some("https://cal.example/intro"));
    }
}
