//! Lead enrichment applied at capture time
//!
//! Two modes: `fixed` stamps the demo firmographics onto every lead, `domain`
//! derives company and industry from the email domain and picks the rest
//! from stable per-address choices.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use leadpilot_store::{EnrichmentState, NewLead};

const JOB_TITLES: &[&str] = &[
    "Software Engineer",
    "Product Manager",
    "Marketing Director",
    "VP Sales",
    "CTO",
    "CEO",
    "Ops Manager",
    "Data Analyst",
];

const LOCATIONS: &[&str] = &[
    "San Francisco, CA",
    "New York, NY",
    "Austin, TX",
    "Seattle, WA",
    "Boston, MA",
    "Los Angeles, CA",
    "Chicago, IL",
];

const COMPANY_SIZES: &[&str] = &[
    "1-10 employees",
    "11-50 employees",
    "50-200 employees",
    "200-500 employees",
    "500-1000 employees",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    #[default]
    Fixed,
    Domain,
    Off,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Firmographics {
    pub company: String,
    pub job_title: String,
    pub location: String,
    pub linkedin_url: String,
    pub company_size: String,
    pub industry: String,
}

impl Firmographics {
    /// The profile every captured lead gets in `fixed` mode
    pub fn demo() -> Self {
        Self {
            company: "Example Inc.".to_string(),
            job_title: "Data Analyst".to_string(),
            location: "Austin, TX".to_string(),
            linkedin_url: "https://linkedin.com/in/demo".to_string(),
            company_size: "50-200 employees".to_string(),
            industry: "Business Services".to_string(),
        }
    }

    /// Copy onto a pending lead record and mark it enriched
    pub fn apply(self, lead: &mut NewLead) {
        lead.company = Some(self.company);
        lead.job_title = Some(self.job_title);
        lead.location = Some(self.location);
        lead.linkedin_url = Some(self.linkedin_url);
        lead.company_size = Some(self.company_size);
        lead.industry = Some(self.industry);
        lead.enriched = EnrichmentState::Success;
        lead.enriched_at = Some(Utc::now());
    }
}

/// Enrich a new lead according to `mode`
pub fn enrich(mode: EnrichmentMode, lead: &mut NewLead) {
    let data = match mode {
        EnrichmentMode::Off => return,
        EnrichmentMode::Fixed => Firmographics::demo(),
        EnrichmentMode::Domain => from_domain(&lead.name, &lead.email),
    };
    debug!("Enriched {} via {:?} mode", lead.email, mode);
    data.apply(lead);
}

pub fn from_domain(name: &str, email: &str) -> Firmographics {
    let domain = email
        .split_once('@')
        .map(|(_, d)| d)
        .filter(|d| !d.is_empty())
        .unwrap_or("unknown.com");
    let seed = stable_hash(&email.to_ascii_lowercase());

    Firmographics {
        company: format!("{} Inc.", title_case(domain.split('.').next().unwrap_or(domain))),
        job_title: pick(JOB_TITLES, seed).to_string(),
        location: pick(LOCATIONS, seed >> 8).to_string(),
        linkedin_url: format!(
            "https://linkedin.com/in/{}",
            name.trim().to_lowercase().replace(' ', "-")
        ),
        company_size: pick(COMPANY_SIZES, seed >> 16).to_string(),
        industry: infer_industry(domain).to_string(),
    }
}

pub fn infer_industry(domain: &str) -> &'static str {
    let d = domain.to_lowercase();
    let has_any = |keys: &[&str]| keys.iter().any(|k| d.contains(k));
    if has_any(&["tech", "software", "ai", "cloud"]) {
        "Technology"
    } else if has_any(&["bank", "fin", "pay", "card"]) {
        "Finance"
    } else if has_any(&["health", "med", "care", "bio"]) {
        "Healthcare"
    } else {
        "Business Services"
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn pick(items: &'static [&'static str], seed: u64) -> &'static str {
    items[(seed % items.len() as u64) as usize]
}

/// FNV-1a, stable across builds and platforms
fn stable_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(name: &str, email: &str) -> NewLead {
        NewLead {
            name: name.to_string(),
            email: email.to_string(),
            phone: "+15550000000".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_infer_industry() {
        assert_eq!(infer_industry("cloudco.io"), "Technology");
        assert_eq!(infer_industry("firstbank.com"), "Finance");
        assert_eq!(infer_industry("medcenter.org"), "Healthcare");
        assert_eq!(infer_industry("plumbing.com"), "Business Services");
    }

    #[test]
    fn test_from_domain_company_and_linkedin() {
        let f = from_domain("Dana Scully", "dana@acme.io");
        assert_eq!(f.company, "Acme Inc.");
        assert_eq!(f.linkedin_url, "https://linkedin.com/in/dana-scully");
        assert!(JOB_TITLES.contains(&f.job_title.as_str()));
        assert!(LOCATIONS.contains(&f.location.as_str()));
        assert!(COMPANY_SIZES.contains(&f.company_size.as_str()));
    }

    #[test]
    fn test_from_domain_is_stable_per_email() {
        assert_eq!(from_domain("A", "a@b.com"), from_domain("A", "A@B.COM"));
    }

    #[test]
    fn test_from_domain_without_at_sign() {
        let f = from_domain("X", "not-an-email");
        assert_eq!(f.company, "Unknown Inc.");
    }

    #[test]
    fn test_enrich_fixed_mode() {
        let mut lead = pending("Dana", "dana@acme.io");
        enrich(EnrichmentMode::Fixed, &mut lead);
        assert_eq!(lead.company.as_deref(), Some("Example Inc."));
        assert_eq!(lead.enriched, EnrichmentState::Success);
        assert!(lead.enriched_at.is_some());
    }

    #[test]
    fn test_enrich_off_mode_leaves_pending() {
        let mut lead = pending("Dana", "dana@acme.io");
        enrich(EnrichmentMode::Off, &mut lead);
        assert!(lead.company.is_none());
        assert_eq!(lead.enriched, EnrichmentState::Pending);
    }
}
