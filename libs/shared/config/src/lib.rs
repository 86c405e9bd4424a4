use std::env;
use tracing::warn;

pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";
pub const DEFAULT_MAX_TRANSITION_RETRIES: u32 = 5;
pub const DEFAULT_PORT: u16 = 3000;

/// Which backend holds consultation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStoreBackend {
    Supabase,
    Memory,
}

impl RequestStoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" => Some(Self::Supabase),
            "memory" | "in-memory" | "in_memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub expo_push_url: String,
    pub expo_access_token: Option<String>,
    pub notifications_enabled: bool,
    pub request_store: RequestStoreBackend,
    pub max_transition_retries: u32,
    pub port: u16,
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
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            expo_push_url: env::var("EXPO_PUSH_URL")
                .unwrap_or_else(|_| DEFAULT_EXPO_PUSH_URL.to_string()),
            expo_access_token: env::var("EXPO_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
            notifications_enabled: parse_flag("NOTIFICATIONS_ENABLED", true),
            request_store: env::var("REQUEST_STORE")
                .ok()
                .map(|value| {
                    RequestStoreBackend::parse(&value).unwrap_or_else(|| {
                        warn!("Unknown REQUEST_STORE '{}', using supabase", value);
                        RequestStoreBackend::Supabase
                    })
                })
                .unwrap_or(RequestStoreBackend::Supabase),
            max_transition_retries: parse_number("MAX_TRANSITION_RETRIES", DEFAULT_MAX_TRANSITION_RETRIES),
            port: parse_number("PORT", DEFAULT_PORT),
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

    /// Key used for server-side reads and writes that span several users' rows.
    /// Falls back to the anon key when no service role key is configured.
    pub fn service_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!("{} has invalid value '{}', using {}", name, value, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_number<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", name, value, default);
            default
        }),
        Err(_) => default,
    }
}
