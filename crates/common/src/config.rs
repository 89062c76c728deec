use crate::Timeframe;

/// Pairs monitored when a chat starts signals without building its own list.
pub const DEFAULT_PAIRS: &[&str] = &[
    "BTC_USDT", "ETH_USDT", "SOL_USDT", "BNB_USDT", "XRP_USDT", "ADA_USDT", "DOGE_USDT",
    "TRX_USDT", "AVAX_USDT", "MATIC_USDT", "DOT_USDT", "LTC_USDT", "SHIB_USDT", "UNI_USDT",
    "LINK_USDT", "XLM_USDT", "ATOM_USDT", "ETC_USDT", "APT_USDT", "NEAR_USDT",
];

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    /// Empty list = no restriction (any chat may run the bot).
    pub allowed_user_ids: Vec<i64>,

    // Keep-alive HTTP server
    pub health_port: u16,

    // Monitoring
    pub poll_interval_secs: u64,
    pub default_deviation: f64,
    pub default_pairs: Vec<String>,
    pub default_timeframe: Timeframe,

    /// Optional TOML file with signal parameter defaults.
    pub signals_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing or malformed variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let allowed_user_ids = optional_env("TELEGRAM_ALLOWED_USER_IDS")
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| {
                        s.trim().parse::<i64>().unwrap_or_else(|_| {
                            panic!(
                                "TELEGRAM_ALLOWED_USER_IDS contains non-numeric ID: '{}'",
                                s.trim()
                            )
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let default_timeframe = optional_env("INTERVAL")
            .unwrap_or_else(|| "15m".to_string())
            .parse::<Timeframe>()
            .unwrap_or_else(|e| panic!("INTERVAL is invalid: {e}"));

        let default_pairs = optional_env("PAIRS")
            .map(|raw| {
                raw.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_PAIRS.iter().map(|p| p.to_string()).collect());

        Config {
            telegram_token: required_env("TELEGRAM_TOKEN"),
            allowed_user_ids,
            health_port: optional_env("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            poll_interval_secs: optional_env("POLLING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60)
                .max(1),
            default_deviation: optional_env("DEV")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.004),
            default_pairs,
            default_timeframe,
            signals_config_path: optional_env("SIGNALS_CONFIG_PATH"),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
