//! Follow-up context pasted in by the user, keyed by lead

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

/// Latest ingested free-text context per lead. Process-local; the same text
/// is also persisted as a note in the lead's thread.
#[derive(Debug, Clone, Default)]
pub struct FollowupContextStore {
    entries: Arc<RwLock<HashMap<i64, String>>>,
}

impl FollowupContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the context for `lead_id`, returning the stored byte count
    pub async fn put(&self, lead_id: i64, text: &str) -> usize {
        let text = text.trim().to_string();
        let len = text.len();
        self.entries.write().await.insert(lead_id, text);
        debug!("Stored {} bytes of follow-up context for lead {}", len, lead_id);
        len
    }

    pub async fn get(&self, lead_id: i64) -> Option<String> {
        self.entries
            .read()
            .await
            .get(&lead_id)
            .filter(|t| !t.is_empty())
            .cloned()
    }
}
