//! Masked email bot service.
//!
//! Wires the token exchange coordinator, the JMAP client and the state store
//! into [`MaskedEmailService`], and exposes it over two entry points: the
//! Telegram polling loop ([`TelegramBot`]) and the HTTP endpoint receiving
//! the provider redirect ([`router`]).

pub mod bot;
pub mod config;
pub mod http;
pub mod messages;
pub mod notifier;
pub mod service;

pub use bot::TelegramBot;
pub use config::Config;
pub use http::router;
pub use messages::Messages;
pub use notifier::TelegramNotifier;
pub use service::MaskedEmailService;
