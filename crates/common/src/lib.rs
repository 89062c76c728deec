pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::MarketDataGateway;
pub use notify::{NotificationSink, SubscriberId};
pub use types::*;
