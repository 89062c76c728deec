use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::{MarketDataGateway, NotificationSink, SubscriberId, Timeframe, WatchKey};
use signal::{readout, SignalParameters};
use watch::{SessionHandle, SessionRegistry, CANDLE_FETCH_LIMIT};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Pairs a fresh session starts with, taken from the front of the
/// configured default list.
const DEFAULT_WATCHLIST_SIZE: usize = 10;

const NO_SESSION: &str = "No signals running. Use /startsignals first.";

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub registry: SessionRegistry,
    pub gateway: Arc<dyn MarketDataGateway>,
    pub sink: Arc<dyn NotificationSink>,
    pub defaults: SessionDefaults,
    pub allowed_user_ids: Arc<Vec<i64>>,
}

/// Startup configuration a new session is seeded with.
#[derive(Clone)]
pub struct SessionDefaults {
    pub pairs: Vec<String>,
    pub timeframe: Timeframe,
    pub params: SignalParameters,
    pub poll_interval: Duration,
}

/// Telegram commands exposed to subscribers.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Signal bot commands:")]
pub enum Command {
    #[command(description = "Show available commands")]
    Start,
    #[command(description = "Start signal monitoring for this chat")]
    StartSignals,
    #[command(description = "Stop signal monitoring")]
    StopSignals,
    #[command(description = "Add a pair to the watchlist: /add ETH_USDT [1h]")]
    Add(String),
    #[command(description = "Remove a pair from the watchlist")]
    Remove(String),
    #[command(description = "Show the current watchlist")]
    Watchlist,
    #[command(description = "Set the deviation threshold: /setdev 0.004")]
    SetDev(String),
    #[command(description = "Enable or disable the RSI filter: /togglersi on|off")]
    ToggleRsi(String),
    #[command(description = "Set the RSI bounds: /setrsi 35 65")]
    SetRsi(String),
    #[command(description = "Enable or disable the trend filter: /toggleema on|off")]
    ToggleEma(String),
    #[command(description = "Set the trend EMA length: /setema 50")]
    SetEma(String),
    #[command(description = "Indicator readout for a pair: /debug BTC_USDT")]
    Debug(String),
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(token: String, deps: BotDeps) {
    let bot = Bot::new(token);
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::StartSignals].endpoint(handle_start_signals))
        .branch(case![Command::StopSignals].endpoint(handle_stop_signals))
        .branch(case![Command::Add(arg)].endpoint(handle_add))
        .branch(case![Command::Remove(arg)].endpoint(handle_remove))
        .branch(case![Command::Watchlist].endpoint(handle_watchlist))
        .branch(case![Command::SetDev(arg)].endpoint(handle_set_dev))
        .branch(case![Command::ToggleRsi(arg)].endpoint(handle_toggle_rsi))
        .branch(case![Command::SetRsi(arg)].endpoint(handle_set_rsi))
        .branch(case![Command::ToggleEma(arg)].endpoint(handle_toggle_ema))
        .branch(case![Command::SetEma(arg)].endpoint(handle_set_ema))
        .branch(case![Command::Debug(arg)].endpoint(handle_debug));

    Update::filter_message()
        .filter_map(|msg: Message| msg.from().map(|u| u.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

/// Silently drop messages from users outside the allowed list.
/// An empty list means the bot is open to everyone.
async fn auth_filter(user_id: UserId, deps: Arc<BotDeps>) -> bool {
    if deps.allowed_user_ids.is_empty() {
        return true;
    }
    let uid = user_id.0 as i64;
    let allowed = deps.allowed_user_ids.contains(&uid);
    if !allowed {
        warn!(user_id = uid, "Unauthorized Telegram access attempt");
    }
    allowed
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = format!(
        "🤖 Mean-reversion signal bot (Gate.io, {})\n\
         /startsignals • /stopsignals\n\
         /add PAIR • /remove PAIR • /watchlist\n\
         /setdev 0.002 • /togglersi on/off • /setrsi 35 65\n\
         /toggleema on/off • /setema 50 • /debug BTC_USDT",
        deps.defaults.timeframe
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_start_signals(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let subscriber: SubscriberId = msg.chat.id.0;

    let watchlist: BTreeSet<WatchKey> = deps
        .defaults
        .pairs
        .iter()
        .filter_map(|pair| WatchKey::parse(pair, deps.defaults.timeframe))
        .take(DEFAULT_WATCHLIST_SIZE)
        .collect();

    let started = deps
        .registry
        .start(
            subscriber,
            watchlist.clone(),
            deps.defaults.params.clone(),
            deps.gateway.clone(),
            deps.sink.clone(),
            deps.defaults.poll_interval,
        )
        .await;

    if started {
        let listing = watchlist
            .iter()
            .map(|k| k.label())
            .collect::<Vec<_>>()
            .join(", ");
        bot.send_message(
            msg.chat.id,
            format!("🟢 Signals started.\nWatchlist: {listing}"),
        )
        .await?;
    } else {
        bot.send_message(msg.chat.id, "Signals are already running.")
            .await?;
    }
    Ok(())
}

async fn handle_stop_signals(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let stopped = deps.registry.stop(msg.chat.id.0).await;
    let text = if stopped {
        "🔴 Signals stopped."
    } else {
        "No signals were running."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_add(bot: Bot, msg: Message, arg: String, deps: Arc<BotDeps>) -> HandlerResult {
    let Some(key) = parse_key_arg(&arg, &deps) else {
        bot.send_message(msg.chat.id, "Usage: /add ETH_USDT [1h]").await?;
        return Ok(());
    };
    let Some(handle) = deps.registry.handle(msg.chat.id.0).await else {
        bot.send_message(msg.chat.id, NO_SESSION).await?;
        return Ok(());
    };
    if handle.add(key.clone()).await {
        bot.send_message(msg.chat.id, format!("✅ Added {}", key.label()))
            .await?;
    } else {
        bot.send_message(msg.chat.id, NO_SESSION).await?;
    }
    Ok(())
}

async fn handle_remove(bot: Bot, msg: Message, arg: String, deps: Arc<BotDeps>) -> HandlerResult {
    let Some(key) = parse_key_arg(&arg, &deps) else {
        bot.send_message(msg.chat.id, "Usage: /remove ETH_USDT [1h]").await?;
        return Ok(());
    };
    let Some(handle) = deps.registry.handle(msg.chat.id.0).await else {
        bot.send_message(msg.chat.id, NO_SESSION).await?;
        return Ok(());
    };
    let watched = handle
        .report()
        .await
        .map(|r| r.watchlist.contains(&key))
        .unwrap_or(false);
    if watched && handle.remove(key.clone()).await {
        bot.send_message(msg.chat.id, format!("🗑️ Removed {}", key.label()))
            .await?;
    } else {
        bot.send_message(msg.chat.id, "Pair is not on the watchlist.")
            .await?;
    }
    Ok(())
}

async fn handle_watchlist(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let report = match deps.registry.handle(msg.chat.id.0).await {
        Some(handle) => handle.report().await,
        None => None,
    };
    let text = match report {
        None => NO_SESSION.to_string(),
        Some(r) if r.watchlist.is_empty() => {
            "Watchlist is empty. Use /add BTC_USDT".to_string()
        }
        Some(r) => {
            let listing = r
                .watchlist
                .iter()
                .map(|k| k.label())
                .collect::<Vec<_>>()
                .join(", ");
            format!("👀 Watchlist: {listing}")
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_set_dev(bot: Bot, msg: Message, arg: String, deps: Arc<BotDeps>) -> HandlerResult {
    let Ok(value) = arg.trim().parse::<f64>() else {
        bot.send_message(msg.chat.id, "Usage: /setdev 0.004").await?;
        return Ok(());
    };
    let reply = apply_params(&deps, msg.chat.id.0, |p| p.deviation_threshold = value).await;
    let text = match reply {
        ParamUpdate::Applied => format!("✅ Deviation threshold set to {:.2}%", value * 100.0),
        other => other.text(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_toggle_rsi(
    bot: Bot,
    msg: Message,
    arg: String,
    deps: Arc<BotDeps>,
) -> HandlerResult {
    let Some(enabled) = parse_on_off(&arg) else {
        bot.send_message(msg.chat.id, "Usage: /togglersi on|off").await?;
        return Ok(());
    };
    let reply = apply_params(&deps, msg.chat.id.0, |p| p.use_rsi_filter = enabled).await;
    let text = match reply {
        ParamUpdate::Applied => format!("RSI filter: {}", if enabled { "ON" } else { "OFF" }),
        other => other.text(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_set_rsi(bot: Bot, msg: Message, arg: String, deps: Arc<BotDeps>) -> HandlerResult {
    let mut tokens = arg.split_whitespace();
    let bounds = match (
        tokens.next().and_then(|t| t.parse::<f64>().ok()),
        tokens.next().and_then(|t| t.parse::<f64>().ok()),
    ) {
        (Some(long_max), Some(short_min)) => Some((long_max, short_min)),
        _ => None,
    };
    let Some((long_max, short_min)) = bounds else {
        bot.send_message(msg.chat.id, "Usage: /setrsi 35 65").await?;
        return Ok(());
    };
    let reply = apply_params(&deps, msg.chat.id.0, |p| {
        p.rsi_long_max = long_max;
        p.rsi_short_min = short_min;
    })
    .await;
    let text = match reply {
        ParamUpdate::Applied => format!("✅ RSI bounds: long≤{long_max} / short≥{short_min}"),
        other => other.text(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_toggle_ema(
    bot: Bot,
    msg: Message,
    arg: String,
    deps: Arc<BotDeps>,
) -> HandlerResult {
    let Some(enabled) = parse_on_off(&arg) else {
        bot.send_message(msg.chat.id, "Usage: /toggleema on|off").await?;
        return Ok(());
    };
    let reply = apply_params(&deps, msg.chat.id.0, |p| p.use_trend_filter = enabled).await;
    let text = match reply {
        ParamUpdate::Applied => format!("Trend EMA filter: {}", if enabled { "ON" } else { "OFF" }),
        other => other.text(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_set_ema(bot: Bot, msg: Message, arg: String, deps: Arc<BotDeps>) -> HandlerResult {
    let Ok(length) = arg.trim().parse::<usize>() else {
        bot.send_message(msg.chat.id, "Usage: /setema 50").await?;
        return Ok(());
    };
    let reply = apply_params(&deps, msg.chat.id.0, |p| p.trend_ema_length = length).await;
    let text = match reply {
        ParamUpdate::Applied => format!("✅ Trend EMA length: {length}"),
        other => other.text(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_debug(bot: Bot, msg: Message, arg: String, deps: Arc<BotDeps>) -> HandlerResult {
    let Some(key) = parse_key_arg(&arg, &deps) else {
        bot.send_message(msg.chat.id, "Usage: /debug BTC_USDT").await?;
        return Ok(());
    };

    // Use the chat's live parameters when a session is running, otherwise
    // the configured defaults.
    let params = match deps.registry.handle(msg.chat.id.0).await {
        Some(handle) => handle
            .report()
            .await
            .map(|r| r.params)
            .unwrap_or_else(|| deps.defaults.params.clone()),
        None => deps.defaults.params.clone(),
    };

    let series = match deps.gateway.candles(&key, CANDLE_FETCH_LIMIT).await {
        Ok(series) => series,
        Err(e) => {
            warn!(key = %key, error = %e, "Debug fetch failed");
            bot.send_message(msg.chat.id, format!("No data for {}.", key.label()))
                .await?;
            return Ok(());
        }
    };

    let text = match readout(&series, &params) {
        None => format!("Not enough history for {}.", key.label()),
        Some(r) => format!(
            "DEBUG {}\n\
             Price: {:.6}\n\
             SMA20: {:.6}\n\
             RSI{}: {:.2}\n\
             EMA{}: {:.6}\n\
             Deviation: {:.3}% vs {:.2}%",
            key.label(),
            r.last,
            r.mean,
            params.rsi_length,
            r.rsi,
            params.trend_ema_length,
            r.trend_ema,
            r.deviation * 100.0,
            params.deviation_threshold * 100.0,
        ),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

enum ParamUpdate {
    Applied,
    Invalid(String),
    NotRunning,
}

impl ParamUpdate {
    fn text(self) -> String {
        match self {
            ParamUpdate::Applied => "✅ Updated.".to_string(),
            ParamUpdate::Invalid(reason) => format!("⛔ {reason}"),
            ParamUpdate::NotRunning => NO_SESSION.to_string(),
        }
    }
}

/// Read the session's current parameters, apply a mutation, validate, and
/// push the result back. An invalid mutation never reaches the session.
async fn apply_params<F>(deps: &BotDeps, subscriber: SubscriberId, mutate: F) -> ParamUpdate
where
    F: FnOnce(&mut SignalParameters),
{
    let Some((handle, mut params)) = session_params(deps, subscriber).await else {
        return ParamUpdate::NotRunning;
    };
    mutate(&mut params);
    if let Err(e) = params.validate() {
        return ParamUpdate::Invalid(e.to_string());
    }
    if handle.set_params(params).await {
        ParamUpdate::Applied
    } else {
        ParamUpdate::NotRunning
    }
}

async fn session_params(
    deps: &BotDeps,
    subscriber: SubscriberId,
) -> Option<(SessionHandle, SignalParameters)> {
    let handle = deps.registry.handle(subscriber).await?;
    let params = handle.report().await?.params;
    Some((handle, params))
}

fn parse_on_off(arg: &str) -> Option<bool> {
    match arg.trim().to_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Parse "PAIR [TIMEFRAME]" into a key, defaulting to the configured
/// timeframe.
fn parse_key_arg(arg: &str, deps: &BotDeps) -> Option<WatchKey> {
    let mut tokens = arg.split_whitespace();
    let raw_pair = tokens.next()?;
    let timeframe = match tokens.next() {
        Some(token) => token.parse::<Timeframe>().ok()?,
        None => deps.defaults.timeframe,
    };
    WatchKey::parse(raw_pair, timeframe)
}
