use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use helmcrm_core::{RecordId, UserId};

/// Opaque HTTP metadata passed through for auditing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

/// One immutable audit record.
///
/// Never updated or deleted by application logic; retention is an operational
/// concern outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<UserId>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<RecordId>,
    pub details: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: None,
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            details: None,
            ip_address: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }

    pub fn by(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn on(mut self, resource_id: RecordId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_meta(mut self, meta: &RequestMeta) -> Self {
        self.ip_address = meta.ip_address.clone();
        self.user_agent = meta.user_agent.clone();
        self
    }
}
