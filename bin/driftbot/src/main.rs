use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, MarketDataGateway, NotificationSink};
use signal::{SignalFileConfig, SignalParameters};
use telegram_alerts::{start_bot, BotDeps, SessionDefaults, TelegramNotifier};
use watch::{GateClient, SessionRegistry};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        interval = cfg.poll_interval_secs,
        timeframe = %cfg.default_timeframe,
        "driftbot starting"
    );

    // Signal defaults: optional TOML file, otherwise env-derived values.
    let (params, default_pairs) = match &cfg.signals_config_path {
        Some(path) => {
            let file = SignalFileConfig::load(path);
            info!(path = %path, "Loaded signal defaults from file");
            let pairs = if file.watchlist.is_empty() {
                cfg.default_pairs.clone()
            } else {
                file.watchlist
            };
            (file.parameters, pairs)
        }
        None => (
            SignalParameters {
                deviation_threshold: cfg.default_deviation,
                ..Default::default()
            },
            cfg.default_pairs.clone(),
        ),
    };
    params
        .validate()
        .unwrap_or_else(|e| panic!("Invalid default signal parameters: {e}"));

    // ── Collaborators ─────────────────────────────────────────────────────────
    let gateway: Arc<dyn MarketDataGateway> = Arc::new(GateClient::new());
    let sink: Arc<dyn NotificationSink> =
        Arc::new(TelegramNotifier::new(cfg.telegram_token.clone()));

    // ── Session registry ──────────────────────────────────────────────────────
    let registry = SessionRegistry::new();

    // ── Telegram bot ──────────────────────────────────────────────────────────
    let deps = BotDeps {
        registry: registry.clone(),
        gateway,
        sink,
        defaults: SessionDefaults {
            pairs: default_pairs,
            timeframe: cfg.default_timeframe,
            params,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
        },
        allowed_user_ids: Arc::new(cfg.allowed_user_ids.clone()),
    };

    // ── Keep-alive server ─────────────────────────────────────────────────────
    let api_state = api::AppState {
        registry: registry.clone(),
        started_at: chrono::Utc::now(),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    tokio::spawn(api::serve(api_state, cfg.health_port));
    tokio::spawn(start_bot(cfg.telegram_token.clone(), deps));

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Exiting.");
}
