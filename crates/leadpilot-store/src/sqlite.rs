//! SQLite database layer for leads and message threads

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Lead, Message, NewLead, NewMessage};

const LEAD_COLUMNS: &str = "id, name, email, phone, status, created_at, company, job_title, \
     location, linkedin_url, company_size, industry, enriched, enriched_at";

const MESSAGE_COLUMNS: &str =
    "id, lead_id, direction, channel, subject, body, provider_sid, status, created_at";

/// SQLite-backed lead store (thread-safe via Arc<Mutex>)
#[derive(Clone)]
pub struct LeadStore {
    conn: Arc<Mutex<Connection>>,
}

impl LeadStore {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        info!("Opening lead database at {:?}", path.as_ref());
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new',
                created_at TEXT NOT NULL,
                company TEXT,
                job_title TEXT,
                location TEXT,
                linkedin_url TEXT,
                company_size TEXT,
                industry TEXT,
                enriched TEXT NOT NULL DEFAULT 'pending',
                enriched_at TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lead_id INTEGER NOT NULL,
                direction TEXT NOT NULL,
                channel TEXT NOT NULL,
                subject TEXT,
                body TEXT NOT NULL,
                provider_sid TEXT,
                status TEXT NOT NULL DEFAULT 'queued',
                created_at TEXT NOT NULL,
                FOREIGN KEY(lead_id) REFERENCES leads(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute("CREATE INDEX IF NOT EXISTS idx_leads_email ON leads(email)", [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_leads_phone ON leads(phone)", [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_lead ON messages(lead_id, created_at)",
            [],
        )?;

        debug!("Lead schema initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| {
                warn!("Database mutex was poisoned, recovering");
                poisoned.into_inner()
            });
            f(&conn)
        })
        .await?
    }

    /// Insert a lead. Emails are unique; a second capture of the same address fails.
    pub async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        self.with_conn(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM leads WHERE email = ?1",
                    params![&lead.email],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(StoreError::DuplicateEmail(lead.email));
            }

            let now = timestamp(&Utc::now());
            conn.execute(
                "INSERT INTO leads (name, email, phone, status, created_at, company, job_title,
                     location, linkedin_url, company_size, industry, enriched, enriched_at)
                 VALUES (?1, ?2, ?3, 'new', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    &lead.name,
                    &lead.email,
                    &lead.phone,
                    &now,
                    lead.company,
                    lead.job_title,
                    lead.location,
                    lead.linkedin_url,
                    lead.company_size,
                    lead.industry,
                    lead.enriched.as_str(),
                    lead.enriched_at.as_ref().map(timestamp),
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Inserted lead {} ({})", lead.email, id);
            fetch_lead(conn, id)?.ok_or(StoreError::LeadNotFound(id))
        })
        .await
    }

    /// All leads, newest first
    pub async fn list_leads(&self) -> Result<Vec<Lead>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let leads = stmt
                .query_map([], row_to_lead)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(leads)
        })
        .await
    }

    pub async fn get_lead(&self, id: i64) -> Result<Option<Lead>, StoreError> {
        self.with_conn(move |conn| fetch_lead(conn, id)).await
    }

    pub async fn find_lead_by_email(&self, email: &str) -> Result<Option<Lead>, StoreError> {
        let email = email.to_owned();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE email = ?1");
            Ok(conn
                .query_row(&sql, params![&email], row_to_lead)
                .optional()?)
        })
        .await
    }

    pub async fn find_lead_by_phone(&self, phone: &str) -> Result<Option<Lead>, StoreError> {
        let phone = phone.to_owned();
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1 ORDER BY id LIMIT 1");
            Ok(conn
                .query_row(&sql, params![&phone], row_to_lead)
                .optional()?)
        })
        .await
    }

    /// Append a message to a lead's thread
    pub async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        self.with_conn(move |conn| {
            let id = insert_message_row(conn, &message)?;
            fetch_message(conn, id)
        })
        .await
    }

    /// Append several messages in one transaction
    pub async fn insert_messages(
        &self,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<Message>, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let mut ids = Vec::with_capacity(messages.len());
            for message in &messages {
                ids.push(insert_message_row(&tx, message)?);
            }
            tx.commit()?;
            ids.into_iter().map(|id| fetch_message(conn, id)).collect()
        })
        .await
    }

    /// Full thread for a lead in chronological order
    pub async fn thread(&self, lead_id: i64) -> Result<Vec<Message>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE lead_id = ?1
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(params![lead_id], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
    }

    /// The last `limit` messages of a thread, still in chronological order
    pub async fn recent_thread(
        &self,
        lead_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE lead_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut messages = stmt
                .query_map(params![lead_id, limit as i64], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
    }
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|_| Utc::now())
}

fn fetch_lead(conn: &Connection, id: i64) -> Result<Option<Lead>, StoreError> {
    let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_lead).optional()?)
}

fn fetch_message(conn: &Connection, id: i64) -> Result<Message, StoreError> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_message)?)
}

fn insert_message_row(conn: &Connection, message: &NewMessage) -> Result<i64, StoreError> {
    let now = timestamp(&Utc::now());
    let inserted = conn.execute(
        "INSERT INTO messages (lead_id, direction, channel, subject, body, provider_sid, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            message.lead_id,
            message.direction.as_str(),
            message.channel.as_str(),
            message.subject,
            &message.body,
            message.provider_sid,
            message.status.as_str(),
            &now,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(StoreError::LeadNotFound(message.lead_id));
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();
    debug!(
        "Inserted {} {} message {} for lead {}",
        message.direction, message.channel, id, message.lead_id
    );
    Ok(id)
}

fn text_enum<T: std::str::FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}

fn row_to_lead(row: &Row) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        status: row.get(4)?,
        created_at: parse_timestamp(&row.get::<_, String>(5)?),
        company: row.get(6)?,
        job_title: row.get(7)?,
        location: row.get(8)?,
        linkedin_url: row.get(9)?,
        company_size: row.get(10)?,
        industry: row.get(11)?,
        enriched: text_enum(row, 12)?,
        enriched_at: row
            .get::<_, Option<String>>(13)?
            .map(|s| parse_timestamp(&s)),
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        direction: text_enum(row, 2)?,
        channel: text_enum(row, 3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        provider_sid: row.get(6)?,
        status: text_enum(row, 7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Direction, EnrichmentState, MessageStatus};

    fn new_lead(name: &str, email: &str, phone: &str) -> NewLead {
        NewLead {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            company: Some("Example Inc.".to_string()),
            enriched: EnrichmentState::Success,
            enriched_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_lead() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let lead = store
            .insert_lead(new_lead("Dana Scully", "dana@fbi.gov", "+15551234567"))
            .await?;
        assert!(lead.id > 0);
        assert_eq!(lead.status, "new");
        assert_eq!(lead.enriched, EnrichmentState::Success);
        assert!(lead.enriched_at.is_some());

        let fetched = store.get_lead(lead.id).await?.unwrap();
        assert_eq!(fetched, lead);
        assert!(store.get_lead(9999).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        store.insert_lead(new_lead("A", "a@x.io", "+1")).await?;
        let err = store.insert_lead(new_lead("B", "a@x.io", "+2")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(ref e) if e == "a@x.io"));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_leads_newest_first() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let first = store.insert_lead(new_lead("A", "a@x.io", "+1")).await?;
        let second = store.insert_lead(new_lead("B", "b@x.io", "+2")).await?;
        let leads = store.list_leads().await?;
        assert_eq!(
            leads.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_email_and_phone() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let lead = store.insert_lead(new_lead("A", "a@x.io", "+15550001111")).await?;
        assert_eq!(store.find_lead_by_email("a@x.io").await?.unwrap().id, lead.id);
        assert_eq!(store.find_lead_by_phone("+15550001111").await?.unwrap().id, lead.id);
        assert!(store.find_lead_by_phone("+19999999999").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_thread_is_chronological() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let lead = store.insert_lead(new_lead("A", "a@x.io", "+1")).await?;
        store
            .insert_message(NewMessage::outbound(lead.id, Channel::Sms, "first"))
            .await?;
        store
            .insert_message(NewMessage::inbound(lead.id, Channel::Sms, "second"))
            .await?;
        store
            .insert_message(
                NewMessage::outbound(lead.id, Channel::Email, "third").with_subject("Hi"),
            )
            .await?;

        let thread = store.thread(lead.id).await?;
        let bodies: Vec<_> = thread.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert_eq!(thread[1].direction, Direction::Inbound);
        assert_eq!(thread[1].status, MessageStatus::Received);
        assert_eq!(thread[2].subject.as_deref(), Some("Hi"));
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_thread_keeps_tail_in_order() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let lead = store.insert_lead(new_lead("A", "a@x.io", "+1")).await?;
        for i in 0..5 {
            store
                .insert_message(NewMessage::outbound(lead.id, Channel::Sms, format!("m{i}")))
                .await?;
        }
        let recent = store.recent_thread(lead.id, 2).await?;
        let bodies: Vec<_> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m3", "m4"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_messages_batch() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let lead = store.insert_lead(new_lead("A", "a@x.io", "+1")).await?;
        let saved = store
            .insert_messages(vec![
                NewMessage::outbound(lead.id, Channel::Sms, "draft sms")
                    .with_status(MessageStatus::Draft),
                NewMessage::outbound(lead.id, Channel::Email, "draft email")
                    .with_subject("S")
                    .with_status(MessageStatus::Draft),
            ])
            .await?;
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|m| m.status == MessageStatus::Draft));
        assert_eq!(store.thread(lead.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_message_for_missing_lead_fails() -> Result<(), StoreError> {
        let store = LeadStore::open_in_memory()?;
        let err = store
            .insert_message(NewMessage::outbound(42, Channel::Sms, "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LeadNotFound(42)));
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_file_database_keeps_rows() -> Result<(), StoreError> {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("leads.db");
        {
            let store = LeadStore::open(&path)?;
            store.insert_lead(new_lead("A", "a@x.io", "+1")).await?;
        }
        let store = LeadStore::open(&path)?;
        assert_eq!(store.list_leads().await?.len(), 1);
        Ok(())
    }
}
