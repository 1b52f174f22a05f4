pub mod bot_guilds;
pub mod commands;
pub mod config;
pub mod db;
pub mod discord;
pub mod error;
pub mod events;
pub mod governor;
pub mod greetings;
pub mod web;

use std::sync::Arc;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    /// Filled with the gateway cache once the bot is ready.
    pub bot_guilds: Arc<bot_guilds::CacheGuildSource>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
