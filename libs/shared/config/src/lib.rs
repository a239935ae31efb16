use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub mailer_base_url: String,
    pub mailer_api_token: String,
    pub mailer_from: String,
    pub scheduler_tick_seconds: u64,
    pub dispatch_batch_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            mailer_base_url: env::var("MAILER_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("MAILER_BASE_URL not set, using empty value");
                    String::new()
                }),
            mailer_api_token: env::var("MAILER_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("MAILER_API_TOKEN not set, using empty value");
                    String::new()
                }),
            mailer_from: env::var("MAILER_FROM")
                .unwrap_or_else(|_| "no-reply@mindwell.clinic".to_string()),
            scheduler_tick_seconds: env::var("SCHEDULER_TICK_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            dispatch_batch_size: env::var("DISPATCH_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_mailer_configured(&self) -> bool {
        !self.mailer_base_url.is_empty() && !self.mailer_api_token.is_empty()
    }

    /// Token for background jobs that run outside any user session.
    /// Falls back to the anon key so a partially configured environment
    /// degrades to restricted access instead of panicking.
    pub fn service_token(&self) -> &str {
        if self.supabase_service_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_key
        }
    }
}
