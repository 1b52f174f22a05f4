use async_trait::async_trait;
use serenity::cache::Cache;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::discord::BotGuild;

/// Where the governor learns which guilds the bot itself is in.
#[async_trait]
pub trait BotGuildSource: Send + Sync {
    async fn bot_guilds(&self) -> Vec<BotGuild>;
}

/// Reads the gateway cache of the running bot. Reports no guilds until the
/// bot is ready and the cache is attached.
#[derive(Default)]
pub struct CacheGuildSource {
    cache: OnceLock<Arc<Cache>>,
}

impl CacheGuildSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, cache: Arc<Cache>) {
        if self.cache.set(cache).is_ok() {
            info!("Bot guild source: gateway cache attached");
        } else {
            warn!("Bot guild source: cache already attached, ignoring");
        }
    }

    pub fn cache(&self) -> Option<&Arc<Cache>> {
        self.cache.get()
    }
}

#[async_trait]
impl BotGuildSource for CacheGuildSource {
    async fn bot_guilds(&self) -> Vec<BotGuild> {
        let Some(cache) = self.cache.get() else {
            return Vec::new();
        };

        cache
            .guilds()
            .into_iter()
            .filter_map(|id| {
                // Unavailable guilds have no cached body yet.
                let guild = cache.guild(id)?;
                Some(BotGuild {
                    id,
                    name: guild.name.clone(),
                    icon: guild.icon.map(|hash| hash.to_string()),
                })
            })
            .collect()
    }
}

/// Fixed guild list for tests.
#[cfg(test)]
pub struct StaticGuildSource(pub Vec<BotGuild>);

#[cfg(test)]
#[async_trait]
impl BotGuildSource for StaticGuildSource {
    async fn bot_guilds(&self) -> Vec<BotGuild> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_before_ready() {
        let source = CacheGuildSource::new();
        assert!(source.cache().is_none());
        assert!(source.bot_guilds().await.is_empty());

        source.attach(Arc::new(Cache::new()));
        assert!(source.cache().is_some());
        assert!(source.bot_guilds().await.is_empty());
    }
}
