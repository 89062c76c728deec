pub mod gateio;
pub mod messages;
pub mod registry;
pub mod session;

pub use gateio::GateClient;
pub use registry::SessionRegistry;
pub use session::{Session, SessionCommand, SessionHandle, SessionReport, CANDLE_FETCH_LIMIT};
