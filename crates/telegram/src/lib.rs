pub mod commands;
pub mod notifier;

pub use commands::{start_bot, BotDeps, Command, SessionDefaults};
pub use notifier::TelegramNotifier;
