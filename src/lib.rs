pub mod cache;
pub mod client;
pub mod config;
pub mod i18n;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod security;
pub mod server;
pub mod wire;
