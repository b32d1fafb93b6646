use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{IntegrationError, NotificationKind};

/// Notification collaborator. Dispatch is fire-and-forget from the caller's
/// point of view; delivery (email worker) is out of scope here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        kind: NotificationKind,
        consultation_id: Uuid,
        extra: Value,
    ) -> Result<(), IntegrationError>;
}

/// Writes notification rows to the `notifications` table; an out-of-band
/// worker turns them into emails.
pub struct SupabaseNotifier {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl Notifier for SupabaseNotifier {
    async fn notify(
        &self,
        kind: NotificationKind,
        consultation_id: Uuid,
        extra: Value,
    ) -> Result<(), IntegrationError> {
        debug!("Queueing {} notification for consultation {}", kind, consultation_id);

        let body = json!({
            "consultation_id": consultation_id,
            "kind": kind.to_string(),
            "payload": extra,
            "queued_at": Utc::now().to_rfc3339(),
        });

        self.supabase
            .request_returning::<Vec<Value>>(Method::POST, "/rest/v1/notifications", None, Some(body))
            .await
            .map_err(|e| IntegrationError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
