//! Discord side of the stitch bridge: REST client implementing the
//! `ChatPlatform` capabilities, gateway payload normalization, and a thin
//! gateway websocket listener.

pub mod discord_client;
pub mod gateway;
pub mod gateway_event;

pub use discord_client::DiscordClient;
pub use gateway::{run_discord_gateway, DiscordGatewayConfig, DEFAULT_GATEWAY_INTENTS};
pub use gateway_event::normalize_dispatch;
