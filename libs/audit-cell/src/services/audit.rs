// libs/audit-cell/src/services/audit.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AuditError, AuditLog};

pub struct AuditService {
    supabase: Arc<SupabaseClient>,
}

impl AuditService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn log_entity_access(
        &self,
        user_id: Uuid,
        entity_type: &str,
        entity_id: Option<Uuid>,
        action: &str,
        description: &str,
        ip_address: Option<&str>,
        auth_token: &str,
    ) -> Result<(), AuditError> {
        let body = json!({
            "user_id": user_id,
            "entity_type": entity_type,
            "entity_id": entity_id,
            "action": action,
            "description": description,
            "ip_address": ip_address,
            "timestamp": Utc::now().to_rfc3339(),
        });

        self.supabase
            .request::<Value>(Method::POST, "/rest/v1/audit_logs", Some(auth_token), Some(body))
            .await
            .map_err(|e| AuditError::PersistenceFailure(e.to_string()))?;

        info!(
            "Audit log created: {} on {} {:?} by {}",
            action, entity_type, entity_id, user_id
        );
        Ok(())
    }

    pub async fn list_recent(
        &self,
        limit: usize,
        auth_token: &str,
    ) -> Result<Vec<AuditLog>, AuditError> {
        let path = format!("/rest/v1/audit_logs?order=timestamp.desc&limit={}", limit);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AuditError::PersistenceFailure(e.to_string()))
    }
}
