use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

pub const DEFAULT_SERPER_API_URL: &str = "https://google.serper.dev/search";
pub const DEFAULT_GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
// one of the cheapest models groq serves
pub const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

pub const DEFAULT_SCRAPE_COUNT: usize = 2;
pub const DEFAULT_SCRAPE_MAX_CHARS: usize = 4000;
pub const DEFAULT_FOLLOWUP_CONTEXT_CHARS: usize = 1000;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config::from_env()
});

#[derive(Debug, Clone)]
pub struct Config {
    pub serper_api_key: Option<String>,
    pub serper_api_url: String,
    pub groq_api_key: Option<String>,
    pub groq_api_url: String,
    pub groq_model: String,
    pub bind_addr: String,
    /// How many organic results get their page text scraped in pro mode.
    pub scrape_count: usize,
    pub scrape_max_chars: usize,
    pub followup_context_chars: usize,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            serper_api_key: get_env_opt("SERPER_API_KEY"),
            serper_api_url: get_env_or_default("SERPER_API_URL", DEFAULT_SERPER_API_URL),
            groq_api_key: get_env_opt("GROQ_API_KEY"),
            groq_api_url: get_env_or_default("GROQ_API_URL", DEFAULT_GROQ_API_URL),
            groq_model: get_env_or_default("GROQ_MODEL", DEFAULT_GROQ_MODEL),
            bind_addr: get_env_or_default("BIND_ADDR", DEFAULT_BIND_ADDR),
            scrape_count: get_env_parsed("SCRAPE_COUNT", DEFAULT_SCRAPE_COUNT),
            scrape_max_chars: get_env_parsed("SCRAPE_MAX_CHARS", DEFAULT_SCRAPE_MAX_CHARS),
            followup_context_chars: get_env_parsed(
                "FOLLOWUP_CONTEXT_CHARS",
                DEFAULT_FOLLOWUP_CONTEXT_CHARS,
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            serper_api_key: None,
            serper_api_url: DEFAULT_SERPER_API_URL.to_string(),
            groq_api_key: None,
            groq_api_url: DEFAULT_GROQ_API_URL.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            scrape_count: DEFAULT_SCRAPE_COUNT,
            scrape_max_chars: DEFAULT_SCRAPE_MAX_CHARS,
            followup_context_chars: DEFAULT_FOLLOWUP_CONTEXT_CHARS,
        }
    }
}

// blank values count as missing so an empty `KEY=` line in .env degrades the same way
fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_env_opt(key).unwrap_or_else(|| default.to_string())
}

fn get_env_parsed(key: &str, default: usize) -> usize {
    match get_env_opt(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("ignoring invalid {key}={raw}, using {default}");
            default
        }),
        None => default,
    }
}
