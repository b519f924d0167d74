//! Environment-driven configuration
//!
//! All settings have defaults so the server starts without any env vars;
//! the ranking provider key is the one value that has no useful default.

use std::env;

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub matcher: MatcherConfig,
    pub upload: UploadConfig,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Page cache lifecycle settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Minutes before a cache entry expires
    pub ttl_minutes: i64,
    /// Maximum number of live cache entries; oldest is evicted beyond this
    pub max_entries: usize,
}

/// External question-ranking provider settings
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// API key for the provider; empty disables real searches
    pub api_key: String,
    /// Base URL of the generateContent endpoint family
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Timeout for a single ranking call
    pub timeout_secs: u64,
    /// Whether to attach rendered page images to the prompt
    pub send_page_images: bool,
    /// Refuse to send prompts estimated above this many tokens
    pub max_prompt_tokens: usize,
}

/// Upload limits
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum total multipart body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: 8000 },
            cache: CacheConfig {
                ttl_minutes: 120,
                max_entries: 64,
            },
            matcher: MatcherConfig {
                api_key: String::new(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-flash-latest".to_string(),
                timeout_secs: 60,
                send_page_images: true,
                max_prompt_tokens: 800_000,
            },
            upload: UploadConfig {
                max_upload_bytes: 100 * 1024 * 1024,
            },
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            server: ServerConfig {
                port: parse_var("EXAMFORGE_PORT", defaults.server.port),
            },
            cache: CacheConfig {
                ttl_minutes: parse_var("EXAMFORGE_CACHE_TTL_MINUTES", defaults.cache.ttl_minutes),
                max_entries: parse_var("EXAMFORGE_CACHE_MAX_ENTRIES", defaults.cache.max_entries),
            },
            matcher: MatcherConfig {
                api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
                base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.matcher.base_url),
                model: env::var("GEMINI_MODEL").unwrap_or(defaults.matcher.model),
                timeout_secs: parse_var(
                    "EXAMFORGE_SEARCH_TIMEOUT_SECS",
                    defaults.matcher.timeout_secs,
                ),
                send_page_images: parse_var(
                    "EXAMFORGE_SEND_PAGE_IMAGES",
                    defaults.matcher.send_page_images,
                ),
                max_prompt_tokens: parse_var(
                    "EXAMFORGE_MAX_PROMPT_TOKENS",
                    defaults.matcher.max_prompt_tokens,
                ),
            },
            upload: UploadConfig {
                max_upload_bytes: parse_var(
                    "EXAMFORGE_MAX_UPLOAD_BYTES",
                    defaults.upload.max_upload_bytes,
                ),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Unparseable env var, using default");
            default
        }),
        Err(_) => default,
    }
}
