use std::env;
use tracing::warn;

/// Notice hours applied when a professor has not created a profile yet.
pub const DEFAULT_CANCELLATION_NOTICE_HOURS: i64 = 4;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub google_calendar_base_url: String,
    pub google_calendar_api_token: String,
    pub google_calendar_id: String,
    pub default_cancellation_notice_hours: i64,
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
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            google_calendar_base_url: env::var("GOOGLE_CALENDAR_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_CALENDAR_BASE_URL not set, using default");
                    "https://www.googleapis.com/calendar/v3".to_string()
                }),
            google_calendar_api_token: env::var("GOOGLE_CALENDAR_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_CALENDAR_API_TOKEN not set, calendar sync disabled");
                    String::new()
                }),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            default_cancellation_notice_hours: env::var("DEFAULT_CANCELLATION_NOTICE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CANCELLATION_NOTICE_HOURS),
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

    pub fn is_calendar_sync_configured(&self) -> bool {
        !self.google_calendar_base_url.is_empty()
            && !self.google_calendar_api_token.is_empty()
    }
}
