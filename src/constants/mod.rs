use std::time::Duration;

use uuid::Uuid;

/// Sender identity stamped on scripted assistant messages.
pub const ASSISTANT_SENDER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_7000_8000_0000_0000_a551);

const DEFAULT_ASSISTANT_CONVERSATION_ID: &str = "00000000-0000-7000-8000-00000000a550";

pub const WELCOME_DELAY: Duration = Duration::from_millis(6_000);
pub const INFO_DELAY: Duration = Duration::from_millis(1_500);
pub const REPLY_DELAY: Duration = Duration::from_millis(2_000);

/// One year, the lifetime of signed attachment URLs.
pub const DEFAULT_SIGNED_URL_TTL: u64 = 365 * 24 * 60 * 60;

pub struct Env {
    pub database_url: String,
    pub redis_url: String,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub log_level: String,
    pub storage_dir: String,
    pub storage_base_url: String,
    pub storage_secret: String,
    pub signed_url_ttl: u64,
    pub max_upload_bytes: usize,
    pub assistant_conversation_id: Uuid,
    pub link_preview_timeout: Duration,
    pub max_realtime_channels: usize,
    pub chat_cache_ttl: usize,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Env {
    fn new() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variable");
        let redis_url = std::env::var("REDIS_URL")
            .expect("REDIS_URL must be set in .env file or environment variable");
        let storage_secret = std::env::var("STORAGE_SECRET")
            .expect("STORAGE_SECRET must be set in .env file or environment variable");

        let frontend_url = var_or("FRONTEND_URL", "http://localhost:5173");
        let ip = var_or("IP", "127.0.0.1");
        let port = var_or("PORT", "8080").parse::<u16>().expect("PORT must be a valid u16 integer");
        let log_level = var_or("LOG_LEVEL", "info");

        let storage_dir = var_or("STORAGE_DIR", "./storage");
        let storage_base_url =
            var_or("STORAGE_BASE_URL", &format!("http://{}:{}/storage", ip, port));
        let signed_url_ttl = var_or("SIGNED_URL_TTL_SECS", &DEFAULT_SIGNED_URL_TTL.to_string())
            .parse::<u64>()
            .expect("SIGNED_URL_TTL_SECS must be a valid u64 integer");
        let max_upload_bytes = var_or("MAX_UPLOAD_BYTES", "26214400")
            .parse::<usize>()
            .expect("MAX_UPLOAD_BYTES must be a valid usize integer");

        let assistant_conversation_id =
            Uuid::parse_str(&var_or("ASSISTANT_CONVERSATION_ID", DEFAULT_ASSISTANT_CONVERSATION_ID))
                .expect("ASSISTANT_CONVERSATION_ID must be a valid UUID");

        let link_preview_timeout = Duration::from_millis(
            var_or("LINK_PREVIEW_TIMEOUT_MS", "5000")
                .parse::<u64>()
                .expect("LINK_PREVIEW_TIMEOUT_MS must be a valid u64 integer"),
        );
        let max_realtime_channels = var_or("MAX_REALTIME_CHANNELS", "10000")
            .parse::<usize>()
            .expect("MAX_REALTIME_CHANNELS must be a valid usize integer");
        let chat_cache_ttl = var_or("CHAT_CACHE_TTL_SECS", "3600")
            .parse::<usize>()
            .expect("CHAT_CACHE_TTL_SECS must be a valid usize integer");

        Env {
            database_url,
            redis_url,
            frontend_url,
            ip,
            port,
            log_level,
            storage_dir,
            storage_base_url,
            storage_secret,
            signed_url_ttl,
            max_upload_bytes,
            assistant_conversation_id,
            link_preview_timeout,
            max_realtime_channels,
            chat_cache_ttl,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
