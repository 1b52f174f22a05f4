//! Outbound Discord REST governor.
//!
//! Every call made with a user's OAuth2 token goes through one serial queue
//! (fixed pacing, retry with backoff), guild list lookups are coalesced per
//! user, and results are cross-checked against the bot's own guilds.

pub mod access;
pub mod backoff;
pub mod dedup;
pub mod executor;
pub mod filter;
pub mod queue;

use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::bot_guilds::BotGuildSource;
use crate::discord::{
    ApiRequest, ApiResponse, ApiTransport, DiscordUser, UserGuild, CURRENT_USER_ENDPOINT,
    CURRENT_USER_GUILDS_ENDPOINT,
};
use crate::error::ApiError;

pub use access::AccessDecision;
use backoff::Backoff;
use dedup::Deduplicator;
use executor::RetryingExecutor;
use queue::RequestQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Pause before every queued dispatch.
    pub request_delay: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub retry_max_delay: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1000),
            max_retries: 3,
            retry_base: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}

pub struct DiscordGovernor {
    queue: RequestQueue,
    guild_lookups: Deduplicator<UserId, Vec<UserGuild>>,
    bot_guilds: Arc<dyn BotGuildSource>,
}

impl DiscordGovernor {
    /// Must be called from within a tokio runtime; spawns the queue worker.
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        bot_guilds: Arc<dyn BotGuildSource>,
        config: GovernorConfig,
    ) -> Self {
        let executor = Arc::new(RetryingExecutor::new(
            transport,
            Backoff::new(config.retry_base, config.retry_max_delay),
            config.max_retries,
        ));
        Self {
            queue: RequestQueue::spawn(executor, config.request_delay),
            guild_lookups: Deduplicator::new(),
            bot_guilds,
        }
    }

    pub async fn queue_request(
        &self,
        endpoint: &str,
        access_token: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.queue
            .enqueue(ApiRequest::bearer(endpoint, access_token))
            .await
    }

    pub async fn current_user(&self, access_token: &str) -> Result<DiscordUser, ApiError> {
        self.queue_request(CURRENT_USER_ENDPOINT, access_token)
            .await?
            .json()
    }

    pub async fn user_guilds(&self, access_token: &str) -> Result<Vec<UserGuild>, ApiError> {
        self.queue_request(CURRENT_USER_GUILDS_ENDPOINT, access_token)
            .await?
            .json()
    }

    /// Guilds the user can manage where the bot is present. Concurrent calls
    /// for the same user share one Discord round trip.
    pub async fn guilds_with_dedup(
        self: &Arc<Self>,
        user_id: UserId,
        access_token: &str,
    ) -> Result<Vec<UserGuild>, ApiError> {
        let governor = Arc::clone(self);
        let access_token = access_token.to_string();
        self.guild_lookups
            .run(user_id, move || async move {
                governor.manageable_guilds(&access_token).await
            })
            .await
    }

    /// Filtered guild list without deduplication.
    pub async fn manageable_guilds(&self, access_token: &str) -> Result<Vec<UserGuild>, ApiError> {
        let user_guilds = self.user_guilds(access_token).await?;
        let bot_guilds = self.bot_guilds.bot_guilds().await;
        let filtered = filter::filter_manageable(user_guilds, &bot_guilds);
        debug!(
            "Governor: {} manageable guilds (bot is in {})",
            filtered.len(),
            bot_guilds.len()
        );
        Ok(filtered)
    }

    /// Live check against Discord; never trusts a cached guild list because
    /// permissions can change after login.
    pub async fn validate_guild_access(
        &self,
        access_token: &str,
        guild_id: GuildId,
    ) -> Result<AccessDecision, ApiError> {
        let user_guilds = self.user_guilds(access_token).await?;
        let bot_guilds = self.bot_guilds.bot_guilds().await;
        Ok(access::decide_access(user_guilds, &bot_guilds, guild_id))
    }
}
