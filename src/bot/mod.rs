/// Delivery of replies to Telegram
pub mod delivery;
/// Command and message handlers
pub mod handlers;
/// Dispatcher setup and startup
pub mod runner;

pub use runner::run_bot;
