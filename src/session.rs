//! Per-tenant session records with idle-timeout rotation.

use crate::db::models::SessionRecord;
use crate::db::Database;
use crate::error::{RagError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Seconds of inactivity after which a session id is rotated.
pub const IDLE_TIMEOUT_SECS: i64 = 600;

/// `tenant:user`, the key a session record is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantIdentity(String);

impl TenantIdentity {
    pub fn new(tenant: &str, user: &str) -> Result<Self> {
        if tenant.trim().is_empty() || user.trim().is_empty() {
            return Err(RagError::Validation(
                "tenant and user must both be non-empty".into(),
            ));
        }
        Ok(Self(format!("{}:{}", tenant, user)))
    }

    pub fn from_key(key: &str) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(RagError::Validation("tenant_session_id is empty".into()));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of the conversation log for one session of one identity.
pub fn conversation_key(record: &SessionRecord) -> String {
    format!("{}:{}", record.tenant_identity, record.session_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Created,
    Touched,
    Rotated,
}

pub struct SessionStore {
    db: Arc<Database>,
}

impl SessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether the sessions table is provisioned and holds a record for `identity`.
    pub fn exists(&self, identity: &TenantIdentity) -> Result<bool> {
        if !self.db.table_exists("sessions")? {
            return Ok(false);
        }
        Ok(self.get(identity)?.is_some())
    }

    pub fn get(&self, identity: &TenantIdentity) -> Result<Option<SessionRecord>> {
        Ok(self.db.get_session(identity.as_str())?)
    }

    pub fn create(&self, identity: &TenantIdentity, now: i64) -> Result<SessionRecord> {
        let session_id = uuid::Uuid::new_v4().to_string();
        Ok(self.db.insert_session(identity.as_str(), &session_id, now)?)
    }

    pub fn touch(&self, identity: &TenantIdentity, now: i64) -> Result<SessionRecord> {
        match self.db.touch_session(identity.as_str(), now)? {
            Some(record) => Ok(record),
            // A concurrent request already stored a later timestamp.
            None => self.current(identity),
        }
    }

    pub fn rotate(&self, identity: &TenantIdentity, now: i64) -> Result<SessionRecord> {
        let session_id = uuid::Uuid::new_v4().to_string();
        match self
            .db
            .rotate_session(identity.as_str(), &session_id, now, IDLE_TIMEOUT_SECS)?
        {
            Some(record) => Ok(record),
            // Someone else rotated or touched it first; their record wins.
            None => self.current(identity),
        }
    }

    /// Applies the idle policy: create, touch within the window, rotate after it.
    pub fn resolve(
        &self,
        identity: &TenantIdentity,
        now: i64,
    ) -> Result<(SessionRecord, SessionTransition)> {
        let resolved = match self.get(identity)? {
            None => (self.create(identity, now)?, SessionTransition::Created),
            Some(record) if now - record.last_interaction < IDLE_TIMEOUT_SECS => {
                (self.touch(identity, now)?, SessionTransition::Touched)
            }
            Some(_) => (self.rotate(identity, now)?, SessionTransition::Rotated),
        };
        debug!(identity = %identity, transition = ?resolved.1, "session resolved");
        Ok(resolved)
    }

    fn current(&self, identity: &TenantIdentity) -> Result<SessionRecord> {
        self.get(identity)?
            .ok_or_else(|| RagError::NotFound(format!("session for {}", identity)))
    }
}
